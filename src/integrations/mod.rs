//! Integrations module
//!
//! This module contains the provider adapters (Linear, GitHub, Slack,
//! Discord, Airtable, Notion, Supabase), the capability traits they
//! implement, the hub that runs them, and its HTTP front door.

pub mod airtable;
pub mod chat;
pub mod envelope;
pub mod github;
pub mod linear;
pub mod notion;
pub mod registry;
pub mod server;
pub mod supabase;
pub mod traits;
pub mod webhooks;
pub mod workflow;

pub use envelope::{SyncResult, SyncStatus};
pub use registry::{HubStatus, IntegrationHub};
pub use server::{create_router, serve, AppState};
pub use traits::{
    HealthProbe, HealthReport, IntegrationError, IntegrationResult, IssueRecord, IssueTracker,
    Notifier, RecordSink,
};
pub use webhooks::{AlertIssue, AlertSink, LoggingHandler, WebhookHandler, WebhookPayload};
pub use workflow::WorkflowRecord;
