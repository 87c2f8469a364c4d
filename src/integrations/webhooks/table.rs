//! Webhook handler table
//!
//! Maps endpoint names to async handlers. Lookups are exact string matches;
//! registering an endpoint twice replaces the earlier handler.

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::integrations::envelope::SyncResult;
use crate::integrations::traits::IntegrationError;

/// Inbound webhook body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub data: Map<String, Value>,
    /// ISO-8601; set to the receive time when the sender omits it
    #[serde(default = "now_iso8601")]
    pub timestamp: String,
}

fn now_iso8601() -> String {
    Local::now().to_rfc3339()
}

impl WebhookPayload {
    pub fn new(event: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: now_iso8601(),
        }
    }
}

/// Handler for one webhook endpoint
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle(&self, payload: WebhookPayload) -> SyncResult;
}

/// Acknowledges events and records them in the log
#[derive(Debug, Clone)]
pub struct LoggingHandler {
    endpoint: String,
}

impl LoggingHandler {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl WebhookHandler for LoggingHandler {
    async fn handle(&self, payload: WebhookPayload) -> SyncResult {
        info!(
            endpoint = %self.endpoint,
            event = %payload.event,
            timestamp = %payload.timestamp,
            "Webhook received"
        );
        SyncResult::success("Webhook received")
            .with("endpoint", self.endpoint.clone())
            .with("event", payload.event)
    }
}

/// Endpoint name → handler
#[derive(Default)]
pub struct WebhookTable {
    handlers: RwLock<HashMap<String, Arc<dyn WebhookHandler>>>,
}

impl WebhookTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, endpoint: impl Into<String>, handler: Arc<dyn WebhookHandler>) {
        self.handlers.write().await.insert(endpoint.into(), handler);
    }

    /// Registered endpoint names, sorted
    pub async fn endpoints(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run the handler registered for `endpoint`.
    ///
    /// The table lock is released before the handler runs, so handlers may
    /// register further endpoints.
    pub async fn dispatch(&self, endpoint: &str, payload: WebhookPayload) -> SyncResult {
        let handler = self.handlers.read().await.get(endpoint).cloned();

        match handler {
            Some(handler) => handler.handle(payload).await,
            None => {
                warn!(endpoint, event = %payload.event, "No handler for webhook endpoint");
                IntegrationError::EndpointNotFound(endpoint.to_string()).into()
            }
        }
    }
}
