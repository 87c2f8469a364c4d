//! Sentry alert webhooks
//!
//! Translates Sentry issue-alert payloads into issue drafts and verifies the
//! `Sentry-Hook-Signature` header (hex HMAC-SHA256 of the raw body).

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use tracing::info;

use crate::integrations::traits::{IntegrationError, IntegrationResult};

/// Header carrying the payload signature
pub const SIGNATURE_HEADER: &str = "Sentry-Hook-Signature";

/// Only alerts with this action are translated
pub const TRIGGERED_ACTION: &str = "triggered";

type HmacSha256 = Hmac<Sha256>;

/// Issue derived from a triggered alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertIssue {
    pub title: String,
    pub description: String,
}

/// Receives translated alerts.
///
/// This is where alerts would be filed in the issue tracker. The hub does
/// not keep tracker credentials, so the default sink only logs.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn file_alert(&self, alert: &AlertIssue) -> IntegrationResult<()>;
}

/// Default sink: writes the alert to the log
#[derive(Debug, Clone, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn file_alert(&self, alert: &AlertIssue) -> IntegrationResult<()> {
        info!(title = %alert.title, description = %alert.description, "Sentry alert received");
        Ok(())
    }
}

/// Look up `key` in `parent`, requiring an object when present
fn nested_object<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
) -> IntegrationResult<Option<&'a Map<String, Value>>> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(IntegrationError::MalformedPayload(format!(
            "'{}' is not an object",
            key
        ))),
    }
}

fn text_field(event: Option<&Map<String, Value>>, key: &str, default: &str) -> String {
    match event.and_then(|e| e.get(key)) {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => default.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Translate a Sentry alert payload.
///
/// Returns `Ok(None)` for any action other than `triggered`.
pub fn translate_alert(payload: &Value) -> IntegrationResult<Option<AlertIssue>> {
    let root = payload.as_object().ok_or_else(|| {
        IntegrationError::MalformedPayload("alert payload is not an object".to_string())
    })?;

    if root.get("action").and_then(Value::as_str) != Some(TRIGGERED_ACTION) {
        return Ok(None);
    }

    let event = match nested_object(root, "data")? {
        Some(data) => nested_object(data, "event")?,
        None => None,
    };

    let title = text_field(event, "title", "Sentry Alert");
    let culprit = text_field(event, "culprit", "Unknown culprit");
    let web_url = text_field(event, "web_url", "");

    Ok(Some(AlertIssue {
        title,
        description: format!("Sentry Alert: {}\n\nLink: {}", culprit, web_url),
    }))
}

/// Verifies Sentry webhook signatures
#[derive(Debug, Clone)]
pub struct SentrySignatureVerifier {
    secret: String,
}

impl SentrySignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Check a hex-encoded HMAC-SHA256 signature in constant time
    pub fn verify_signature(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else {
            return false;
        };
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    }

    /// Signature Sentry would send for `payload`
    pub fn compute_signature(&self, payload: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC can take any key size");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}
