//! Provider capability traits
//!
//! This module defines the error type shared by every provider adapter and
//! one trait per operation family (issue fetch, record sync, notify, health).
//! Each concrete adapter implements the subset its provider supports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::workflow::WorkflowRecord;

/// Error type for provider adapter operations
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// The provider could not be reached
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// GitHub API failure (transport or rejection)
    #[error("GitHub API error: {0}")]
    GitHub(#[from] octocrab::Error),

    /// The provider answered with a non-success status or an error body
    #[error("{0}")]
    Rejected(String),

    /// A required parameter is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// No handler is registered for the webhook endpoint
    #[error("Webhook endpoint not found")]
    EndpointNotFound(String),

    /// An inbound payload does not have the expected structure
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// A multi-call export stopped part way; earlier calls are not undone
    #[error("{source}")]
    PartialBatch {
        /// Records written before the failing call
        created: usize,
        /// Failure of the call that stopped the export
        source: Box<IntegrationError>,
    },
}

impl IntegrationError {
    /// Wrap an error raised after `created` records were already written
    pub fn partial(created: usize, source: IntegrationError) -> Self {
        IntegrationError::PartialBatch {
            created,
            source: Box::new(source),
        }
    }

    /// Number of records written before the failure, for batch operations
    pub fn created(&self) -> Option<usize> {
        match self {
            IntegrationError::PartialBatch { created, .. } => Some(*created),
            _ => None,
        }
    }
}

/// Result type for provider adapter operations
pub type IntegrationResult<T> = Result<T, IntegrationError>;

/// Reject an empty credential or identifier before any request is built
pub(crate) fn require(value: &str, name: &str) -> IntegrationResult<()> {
    if value.trim().is_empty() {
        return Err(IntegrationError::Config(format!("Missing {}", name)));
    }
    Ok(())
}

/// Workflow state of an issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueState {
    pub name: String,
    #[serde(rename = "type")]
    pub state_type: String,
}

/// Person an issue is assigned to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueAssignee {
    pub display_name: String,
}

/// Team owning an issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueTeam {
    pub key: String,
}

/// An issue fetched from an issue tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    /// Provider ID
    pub id: String,
    /// Human-readable identifier (e.g., "ENG-123")
    #[serde(default)]
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub state: Option<IssueState>,
    #[serde(default)]
    pub assignee: Option<IssueAssignee>,
    #[serde(default)]
    pub team: Option<IssueTeam>,
}

impl IssueRecord {
    /// Key of the owning team, if the issue has one
    pub fn team_key(&self) -> Option<&str> {
        self.team.as_ref().map(|t| t.key.as_str())
    }
}

/// Result of a project database health probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub slow_queries_count: usize,
}

/// Issue trackers that can list in-flight issues
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Returns the name of this provider (e.g., "linear")
    fn name(&self) -> &str;

    /// Fetch active issues, keeping only those owned by `team_key` when given
    async fn active_issues(&self, team_key: Option<&str>) -> IntegrationResult<Vec<IssueRecord>>;
}

/// Destinations that accept workflow records
#[async_trait]
pub trait RecordSink: Send + Sync {
    fn name(&self) -> &str;

    /// Write all records, returning how many were created.
    ///
    /// Stops at the first failed call and reports the records created
    /// before it through [`IntegrationError::PartialBatch`].
    async fn push(&self, records: &[WorkflowRecord]) -> IntegrationResult<usize>;
}

/// Chat channels reachable through an incoming webhook
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Post a plain text message
    async fn notify(&self, message: &str) -> IntegrationResult<()>;
}

/// Backing services that can report their health
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> IntegrationResult<HealthReport>;
}
