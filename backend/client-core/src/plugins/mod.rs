//! Feature plugins every client gets unless its options say otherwise.

pub mod api_response;
pub mod benchmark;
pub mod clear;
pub mod image;
pub mod issue;
pub mod logger;
pub mod state_responses;

pub use api_response::ApiResponse;
pub use benchmark::{Benchmark, BenchmarkRun};
pub use clear::Clear;
pub use image::Image;
pub use issue::Issue;
pub use logger::Logger;
pub use state_responses::StateResponses;

use crate::plugin::PluginCreator;

/// The default plugin list, in installation order.
pub fn core_plugins() -> Vec<PluginCreator> {
    vec![
        PluginCreator::new(Image::new),
        PluginCreator::new(Logger::new),
        PluginCreator::new(Benchmark::new),
        PluginCreator::new(StateResponses::new),
        PluginCreator::new(ApiResponse::new),
        PluginCreator::new(Clear::new),
        PluginCreator::new(Issue::new),
    ]
}
