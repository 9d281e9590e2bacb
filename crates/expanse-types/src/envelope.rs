use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire envelope wrapped around every JSON response.
///
/// Success bodies carry a `data` payload; error bodies carry a `details`
/// object instead. Both always carry the server-side UTC timestamp.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: Status,
    pub message: String,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub status: Status,
    pub message: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            details,
            timestamp: Utc::now(),
        }
    }
}
