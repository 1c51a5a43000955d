use crate::client::{Client, WeakClient};
use crate::plugin::{Capability, Plugin};

use protocol::CommandType;
use protocol::payloads::ReportIssuePayload;

#[derive(Debug)]
pub struct Issue {
    client: WeakClient,
}

impl Issue {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.downgrade(),
        }
    }

    /// Always flagged important.
    pub fn report_issue(&self, id: &str, name: Option<&str>, description: Option<&str>) {
        let payload = ReportIssuePayload {
            id: id.to_string(),
            name: name.map(str::to_string),
            description: description.map(str::to_string),
        };
        self.client
            .send_serialized(CommandType::ReportIssue, &payload, true);
    }
}

impl Plugin for Issue {
    fn features(&self) -> &'static [&'static str] {
        &["report_issue"]
    }
}

impl Capability for Issue {
    const NAME: &'static str = "issue";
}
