use crate::client::{Client, WeakClient};
use crate::plugin::{Capability, Plugin};

use protocol::CommandType;
use protocol::payloads::ImagePayload;

#[derive(Debug)]
pub struct Image {
    client: WeakClient,
}

impl Image {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.downgrade(),
        }
    }

    pub fn image(&self, image: &ImagePayload) {
        self.client.send_serialized(CommandType::Image, image, false);
    }
}

impl Plugin for Image {
    fn features(&self) -> &'static [&'static str] {
        &["image"]
    }
}

impl Capability for Image {
    const NAME: &'static str = "image";
}
