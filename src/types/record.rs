//! Normalized per-item outcomes.

use serde::Serialize;
use serde_json::Value;

/// Outcome of one dispatched request, as persisted in batch files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub url: String,
    pub response: Payload,
}

/// What came back for an item.
///
/// Serialized untagged so batch files read as `{"url": ..., "response": <payload>}`
/// where the payload is the decoded JSON body, the raw text body, the bare
/// status code, or a `{"error": ..., "detail": ...}` failure object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Json(Value),
    Text(String),
    Status(u16),
    Failure(Failure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub error: FailureKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// DNS, connect, timeout, reset or body read failure.
    Transport,
    /// URL template referenced a field the item does not have.
    Template,
    /// JSON content type with a body that does not parse.
    Decode,
}

impl ResultRecord {
    pub fn new(url: impl Into<String>, response: Payload) -> Self {
        Self {
            url: url.into(),
            response,
        }
    }

    pub fn failure(url: impl Into<String>, error: FailureKind, detail: impl Into<String>) -> Self {
        Self::new(
            url,
            Payload::Failure(Failure {
                error,
                detail: detail.into(),
            }),
        )
    }

    /// Only a decoded JSON object counts as success; status codes, plain
    /// text and recorded failures do not.
    pub fn is_success(&self) -> bool {
        matches!(self.response, Payload::Json(Value::Object(_)))
    }

    pub fn status(&self) -> Option<u16> {
        match self.response {
            Payload::Status(code) => Some(code),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.response {
            Payload::Failure(f) => Some(f.error),
            _ => None,
        }
    }
}
