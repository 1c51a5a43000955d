use crate::client::{Client, WeakClient};
use crate::plugin::{Capability, Plugin};
use crate::stopwatch::Stopwatch;

use protocol::CommandType;
use protocol::payloads::{BenchmarkReportPayload, BenchmarkStep};

/// Rough timing of a sequence of steps, reported as one `benchmark.report`.
#[derive(Debug)]
pub struct Benchmark {
    client: WeakClient,
}

impl Benchmark {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.downgrade(),
        }
    }

    pub fn start(&self, title: impl Into<String>) -> BenchmarkRun {
        let title = title.into();
        BenchmarkRun {
            client: self.client.clone(),
            stopwatch: Stopwatch::start(),
            steps: vec![BenchmarkStep {
                title: title.clone(),
                time: 0.0,
                delta: 0.0,
            }],
            title,
        }
    }
}

impl Plugin for Benchmark {
    fn features(&self) -> &'static [&'static str] {
        &["benchmark"]
    }
}

impl Capability for Benchmark {
    const NAME: &'static str = "benchmark";
}

#[derive(Debug)]
pub struct BenchmarkRun {
    client: WeakClient,
    stopwatch: Stopwatch,
    title: String,
    steps: Vec<BenchmarkStep>,
}

impl BenchmarkRun {
    pub fn step(&mut self, title: impl Into<String>) {
        let previous = self.steps.last().map_or(0.0, |step| step.time);
        let time = self.stopwatch.elapsed_ms();
        self.steps.push(BenchmarkStep {
            title: title.into(),
            time,
            delta: time - previous,
        });
    }

    /// Records a final step and sends the report.
    pub fn stop(mut self, title: impl Into<String>) {
        self.step(title);
        let report = BenchmarkReportPayload {
            title: self.title,
            steps: self.steps,
        };
        self.client
            .send_serialized(CommandType::Benchmark, &report, false);
    }

    pub fn steps(&self) -> &[BenchmarkStep] {
        &self.steps
    }
}
