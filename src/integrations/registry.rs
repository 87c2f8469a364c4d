//! Integration hub
//!
//! The hub keeps the registry of named integrations and the webhook table,
//! and runs the per-provider operations. Every operation builds a fresh
//! adapter from the caller's credentials, runs it, and folds the outcome into
//! a [`SyncResult`]; none of them fail.

use chrono::Local;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::airtable::AirtableExporter;
use super::chat::{DiscordNotifier, SlackNotifier};
use super::envelope::SyncResult;
use super::github::{self, FileChange, GitHubClient, PullRequestDraft, RepoRef};
use super::linear::LinearClient;
use super::notion::NotionSync;
use super::supabase::SupabaseClient;
use super::traits::{HealthProbe, IntegrationResult, IssueTracker, Notifier, RecordSink};
use super::webhooks::{
    translate_alert, AlertSink, LogAlertSink, WebhookHandler, WebhookPayload, WebhookTable,
};
use super::workflow::WorkflowRecord;
use crate::config::{IntegrationConfig, ProviderEndpoints};

/// Value of `status` in [`HubStatus`] while the hub is serving
pub const OPERATIONAL: &str = "operational";

/// Snapshot of what is registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubStatus {
    pub integrations: Vec<String>,
    pub webhook_endpoints: Vec<String>,
    pub status: String,
}

/// Name of the branch a pull request is committed to
fn update_branch_name() -> String {
    format!("agent/update-{}", Local::now().format("%Y%m%d%H%M%S"))
}

/// Turn an operation outcome into its envelope, logging failures
fn settle(operation: &str, result: IntegrationResult<SyncResult>) -> SyncResult {
    match result {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(operation, error = %e, "Integration operation failed");
            e.into()
        }
    }
}

async fn notify(
    notifier: &dyn Notifier,
    message: &str,
    channel: &str,
) -> IntegrationResult<SyncResult> {
    notifier.notify(message).await?;
    info!(notifier = notifier.name(), "Notification sent");
    Ok(SyncResult::success(format!("Notification sent to {}", channel)))
}

async fn push_records(
    sink: &dyn RecordSink,
    workflows: &[WorkflowRecord],
    message: impl FnOnce(usize) -> String,
) -> IntegrationResult<SyncResult> {
    let created = sink.push(workflows).await?;
    info!(sink = sink.name(), created, "Workflow records pushed");
    Ok(SyncResult::success(message(created)).with("created", created))
}

/// Registry of integrations and webhook handlers plus the provider operations
pub struct IntegrationHub {
    integrations: RwLock<HashMap<String, IntegrationConfig>>,
    webhooks: WebhookTable,
    endpoints: ProviderEndpoints,
    http: Client,
    alert_sink: Arc<dyn AlertSink>,
}

impl Default for IntegrationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationHub {
    /// Create an empty hub talking to the public provider APIs
    pub fn new() -> Self {
        Self {
            integrations: RwLock::new(HashMap::new()),
            webhooks: WebhookTable::new(),
            endpoints: ProviderEndpoints::default(),
            http: Client::new(),
            alert_sink: Arc::new(LogAlertSink),
        }
    }

    /// Use other API roots for the adapters
    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Send translated Sentry alerts somewhere other than the log
    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sink = sink;
        self
    }

    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Store `config` under its name, replacing any earlier entry
    pub async fn register(&self, config: IntegrationConfig) {
        info!(name = %config.name, enabled = config.enabled, "Integration registered");
        self.integrations
            .write()
            .await
            .insert(config.name.clone(), config);
    }

    pub async fn integration(&self, name: &str) -> Option<IntegrationConfig> {
        self.integrations.read().await.get(name).cloned()
    }

    /// Registered integration names, sorted
    pub async fn integration_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.integrations.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn register_webhook(
        &self,
        endpoint: impl Into<String>,
        handler: Arc<dyn WebhookHandler>,
    ) {
        let endpoint = endpoint.into();
        info!(endpoint = %endpoint, "Webhook endpoint registered");
        self.webhooks.register(endpoint, handler).await;
    }

    pub async fn webhook_endpoints(&self) -> Vec<String> {
        self.webhooks.endpoints().await
    }

    /// Route an inbound webhook to its handler
    pub async fn dispatch(&self, endpoint: &str, payload: WebhookPayload) -> SyncResult {
        self.webhooks.dispatch(endpoint, payload).await
    }

    pub async fn status(&self) -> HubStatus {
        HubStatus {
            integrations: self.integration_names().await,
            webhook_endpoints: self.webhook_endpoints().await,
            status: OPERATIONAL.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Issue tracker
    // ------------------------------------------------------------------

    /// Fetch started issues, optionally only those of one team
    pub async fn sync_with_linear(&self, api_key: &str, team_key: Option<&str>) -> SyncResult {
        settle("linear_sync", self.try_sync_with_linear(api_key, team_key).await)
    }

    async fn try_sync_with_linear(
        &self,
        api_key: &str,
        team_key: Option<&str>,
    ) -> IntegrationResult<SyncResult> {
        let client =
            LinearClient::new(self.http.clone(), api_key)?.with_endpoint(&self.endpoints.linear);
        let issues = client.active_issues(team_key).await?;
        let count = issues.len();

        Ok(SyncResult::success(format!(
            "Successfully fetched {} active issues from Linear",
            count
        ))
        .with("issues", serde_json::to_value(&issues).unwrap_or_default())
        .with("count", count))
    }

    // ------------------------------------------------------------------
    // Source control
    // ------------------------------------------------------------------

    /// List the workflow files in `repo` ("owner/name")
    pub async fn sync_with_github(&self, repo: &str, token: &str) -> SyncResult {
        settle("github_sync", self.try_sync_with_github(repo, token).await)
    }

    async fn try_sync_with_github(&self, repo: &str, token: &str) -> IntegrationResult<SyncResult> {
        let repo_ref = RepoRef::parse(repo)?;
        let client = GitHubClient::with_base_uri(token, self.endpoints.github_override())?;
        let files = github::workflow_files(&client, &repo_ref).await?;

        Ok(SyncResult::success(format!(
            "Found {} workflow files in {}",
            files.len(),
            repo_ref
        ))
        .with("repository", repo)
        .with("workflow_files", files.len())
        .with("files", files))
    }

    /// Commit `files` to a new `agent/update-*` branch and open a pull request
    pub async fn create_github_pr(
        &self,
        token: &str,
        repo: &str,
        title: &str,
        description: Option<&str>,
        files: Vec<FileChange>,
    ) -> SyncResult {
        settle(
            "github_pr",
            self.try_create_github_pr(token, repo, title, description, files)
                .await,
        )
    }

    async fn try_create_github_pr(
        &self,
        token: &str,
        repo: &str,
        title: &str,
        description: Option<&str>,
        files: Vec<FileChange>,
    ) -> IntegrationResult<SyncResult> {
        let repo_ref = RepoRef::parse(repo)?;
        let client = GitHubClient::with_base_uri(token, self.endpoints.github_override())?;

        let draft = PullRequestDraft {
            title: title.to_string(),
            body: description.unwrap_or_default().to_string(),
            branch: update_branch_name(),
            files,
        };
        let pr_url = github::create_pull_request(&client, &repo_ref, &draft).await?;

        Ok(SyncResult::success("Successfully created PR")
            .with("pr_url", pr_url)
            .with("branch", draft.branch))
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    pub async fn notify_slack(&self, webhook_url: &str, message: &str) -> SyncResult {
        let result = match SlackNotifier::new(self.http.clone(), webhook_url) {
            Ok(notifier) => notify(&notifier, message, "Slack").await,
            Err(e) => Err(e),
        };
        settle("slack_notify", result)
    }

    pub async fn notify_discord(&self, webhook_url: &str, message: &str) -> SyncResult {
        let result = match DiscordNotifier::new(self.http.clone(), webhook_url) {
            Ok(notifier) => notify(&notifier, message, "Discord").await,
            Err(e) => Err(e),
        };
        settle("discord_notify", result)
    }

    // ------------------------------------------------------------------
    // Record stores
    // ------------------------------------------------------------------

    /// Create one Airtable record per workflow, ten per request
    pub async fn export_to_airtable(
        &self,
        base_id: &str,
        table_name: &str,
        api_key: &str,
        workflows: &[WorkflowRecord],
    ) -> SyncResult {
        let result = match AirtableExporter::new(self.http.clone(), base_id, table_name, api_key) {
            Ok(exporter) => {
                let exporter = exporter.with_api_url(&self.endpoints.airtable);
                push_records(&exporter, workflows, |created| {
                    format!("Exported {} workflows to Airtable", created)
                })
                .await
            }
            Err(e) => Err(e),
        };
        settle("airtable_export", result)
    }

    /// Create one Notion page per workflow
    pub async fn sync_with_notion(
        &self,
        database_id: &str,
        token: &str,
        workflows: &[WorkflowRecord],
    ) -> SyncResult {
        let result = match NotionSync::new(self.http.clone(), database_id, token) {
            Ok(sync) => {
                let sync = sync.with_api_url(&self.endpoints.notion);
                push_records(&sync, workflows, |created| {
                    format!("Synced {} workflows to Notion", created)
                })
                .await
            }
            Err(e) => Err(e),
        };
        settle("notion_sync", result)
    }

    // ------------------------------------------------------------------
    // Database health
    // ------------------------------------------------------------------

    pub async fn check_supabase_health(&self, access_token: &str, project_ref: &str) -> SyncResult {
        settle(
            "supabase_health",
            self.try_check_supabase_health(access_token, project_ref)
                .await,
        )
    }

    async fn try_check_supabase_health(
        &self,
        access_token: &str,
        project_ref: &str,
    ) -> IntegrationResult<SyncResult> {
        let probe = SupabaseClient::new(self.http.clone(), access_token, project_ref)?
            .with_api_url(&self.endpoints.supabase);
        let report = probe.check().await?;

        Ok(SyncResult::success("Supabase Connection Established")
            .with("health", "healthy")
            .with(
                "metrics",
                json!({ "slow_queries_count": report.slow_queries_count }),
            ))
    }

    // ------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------

    /// Translate a Sentry alert and hand triggered ones to the alert sink
    pub async fn handle_sentry_alert(&self, payload: &Value) -> SyncResult {
        let alert = match translate_alert(payload) {
            Ok(Some(alert)) => alert,
            Ok(None) => return SyncResult::ignored("Not a trigger event"),
            Err(e) => return settle("sentry_alert", Err(e)),
        };

        let filed = self.alert_sink.file_alert(&alert).await;
        settle(
            "sentry_alert",
            filed.map(|()| SyncResult::success("Alert received").with("title", alert.title)),
        )
    }
}
