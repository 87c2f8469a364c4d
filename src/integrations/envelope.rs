//! Uniform result envelope returned by every hub operation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::traits::IntegrationError;

/// Outcome of a hub operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Error,
    /// The request was understood but deliberately not acted on
    Ignored,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::Error => write!(f, "error"),
            SyncStatus::Ignored => write!(f, "ignored"),
        }
    }
}

/// `{status, message, ...payload}` envelope
///
/// Operation-specific fields are flattened next to `status` and `message`
/// when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub status: SyncStatus,
    pub message: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl SyncResult {
    pub fn new(status: SyncStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            payload: Map::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(SyncStatus::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(SyncStatus::Error, message)
    }

    pub fn ignored(message: impl Into<String>) -> Self {
        Self::new(SyncStatus::Ignored, message)
    }

    /// Attach an operation-specific field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == SyncStatus::Error
    }
}

impl From<IntegrationError> for SyncResult {
    fn from(err: IntegrationError) -> Self {
        let created = err.created();
        let result = SyncResult::error(err.to_string());
        match created {
            Some(created) => result.with("created", created),
            None => result,
        }
    }
}
