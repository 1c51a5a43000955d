use crate::client::{Client, WeakClient};
use crate::plugin::{Capability, Plugin};

use protocol::CommandType;
use protocol::network::{ApiRequestPayload, ApiResponsePayload, NetworkRequest, NetworkResponse};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Id pairing an `api.request` with its `api.response`.
pub fn generate_request_id() -> String {
    let count = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis());
    let random = Uuid::new_v4().simple().to_string();
    format!("{millis}-{count}-{}", &random[..7])
}

/// Network traces. Non-2xx responses are flagged important.
#[derive(Debug)]
pub struct ApiResponse {
    client: WeakClient,
}

impl ApiResponse {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.downgrade(),
        }
    }

    pub fn api_request(&self, request_id: &str, request: &NetworkRequest) {
        let payload = ApiRequestPayload {
            request_id: request_id.to_string(),
            request: request.clone(),
        };
        self.client
            .send_serialized(CommandType::ApiRequest, &payload, false);
    }

    pub fn api_response(
        &self,
        request_id: &str,
        request: &NetworkRequest,
        response: &NetworkResponse,
        duration_ms: f64,
    ) {
        let important = !response.is_success();
        let payload = ApiResponsePayload {
            request_id: request_id.to_string(),
            request: request.clone(),
            response: response.clone(),
            duration: duration_ms,
        };
        self.client
            .send_serialized(CommandType::ApiResponse, &payload, important);
    }
}

impl Plugin for ApiResponse {
    fn features(&self) -> &'static [&'static str] {
        &["api_request", "api_response"]
    }
}

impl Capability for ApiResponse {
    const NAME: &'static str = "api response";
}
