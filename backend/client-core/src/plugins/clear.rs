use crate::client::{Client, WeakClient};
use crate::plugin::{Capability, Plugin};

use protocol::{CommandType, Payload};

/// Asks the inspector to clear its timeline.
#[derive(Debug)]
pub struct Clear {
    client: WeakClient,
}

impl Clear {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.downgrade(),
        }
    }

    pub fn clear(&self) {
        self.client.send(CommandType::Clear, Payload::Undefined, false);
    }
}

impl Plugin for Clear {
    fn features(&self) -> &'static [&'static str] {
        &["clear"]
    }
}

impl Capability for Clear {
    const NAME: &'static str = "clear";
}
