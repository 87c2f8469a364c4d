//! Webhooks module
//!
//! Inbound webhook handling: the endpoint → handler table used for generic
//! dispatch, and the Sentry alert translator.

pub mod sentry;
pub mod table;

pub use sentry::{
    translate_alert, AlertIssue, AlertSink, LogAlertSink, SentrySignatureVerifier,
    SIGNATURE_HEADER,
};
pub use table::{LoggingHandler, WebhookHandler, WebhookPayload, WebhookTable};
