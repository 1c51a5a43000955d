//! Text codec for envelopes.
//!
//! Encoding runs payloads through [`Payload::to_json`](crate::Payload::to_json)
//! first, so values JSON cannot represent degrade to placeholders rather than
//! failing. Decoding accepts text and binary frames alike and always produces
//! plain structured data.

use crate::command_type::CommandType;
use crate::envelope::Envelope;
use crate::error::ProtocolError;
use crate::payload::Payload;

use std::time::SystemTime;

use humantime::{format_rfc3339_millis, parse_rfc3339_weak};
use serde::Serialize;
use serde::de::DeserializeOwned;

impl Envelope {
    /// Builds an outgoing envelope stamped with the sender's clock.
    pub fn new(
        command_type: impl Into<CommandType>,
        payload: &Payload,
        important: bool,
        date: SystemTime,
        delta_time: u64,
    ) -> Self {
        Self {
            command_type: command_type.into(),
            payload: payload.to_json(),
            important,
            date: Some(format_date(date)),
            delta_time,
        }
    }
}

/// Serializes any wire type to a UTF-8 text frame.
pub fn encode<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|e| ProtocolError::encode(e.to_string()))
}

/// Parses a text or binary frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] if the frame is not valid JSON for `T`.
pub fn decode<T: DeserializeOwned>(frame: impl AsRef<[u8]>) -> Result<T, ProtocolError> {
    serde_json::from_slice(frame.as_ref()).map_err(|e| ProtocolError::decode(e.to_string()))
}

pub fn format_date(date: SystemTime) -> String {
    format_rfc3339_millis(date).to_string()
}

/// Parses an RFC 3339 timestamp; `None` when it is not one.
pub fn parse_date(text: &str) -> Option<SystemTime> {
    parse_rfc3339_weak(text).ok()
}

pub(crate) mod rfc3339 {
    use super::{format_date, parse_date};

    use std::time::SystemTime;

    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_date(&text).ok_or_else(|| D::Error::custom(format!("invalid RFC 3339 date: {text}")))
    }
}
