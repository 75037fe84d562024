use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a saved stream on the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub String);

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A sampled trace attached to a stream's time series. Only the span id is
/// forwarded downstream; other remote fields are ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemplar {
    pub span_guid: String,
}

impl Exemplar {
    pub fn new(span_guid: impl Into<String>) -> Self {
        Self {
            span_guid: span_guid.into(),
        }
    }
}

/// Acknowledgement returned by the work channel for one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishAck {
    /// Subscribers that received the message.
    pub receivers: u64,
}
