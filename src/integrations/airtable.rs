//! Airtable export
//!
//! Workflow records are written to an Airtable table in batches of
//! [`BATCH_SIZE`], one POST per batch. The export stops at the first failed
//! batch; batches created before it stay in the table.

use async_trait::async_trait;
use chrono::Local;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Value};
use tracing::debug;

use super::traits::{require, IntegrationError, IntegrationResult, RecordSink};
use super::workflow::WorkflowRecord;

/// Airtable REST API base
pub const AIRTABLE_API_URL: &str = "https://api.airtable.com/v0";

/// Airtable accepts at most ten records per create call
pub const BATCH_SIZE: usize = 10;

/// Exporter for one Airtable table
pub struct AirtableExporter {
    client: Client,
    api_key: String,
    base_id: String,
    table_name: String,
    api_url: String,
}

impl AirtableExporter {
    pub fn new(
        client: Client,
        base_id: impl Into<String>,
        table_name: impl Into<String>,
        api_key: impl Into<String>,
    ) -> IntegrationResult<Self> {
        let (base_id, table_name, api_key) = (base_id.into(), table_name.into(), api_key.into());
        require(&base_id, "base_id")?;
        require(&table_name, "table_name")?;
        require(&api_key, "api_key")?;

        Ok(Self {
            client,
            api_key,
            base_id,
            table_name,
            api_url: AIRTABLE_API_URL.to_string(),
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// `{api}/{base}/{table}` with both segments percent-encoded
    fn table_url(&self) -> IntegrationResult<Url> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| IntegrationError::Config(format!("Invalid Airtable URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| IntegrationError::Config("Invalid Airtable URL".to_string()))?
            .pop_if_empty()
            .push(&self.base_id)
            .push(&self.table_name);
        Ok(url)
    }

    async fn create_batch(&self, url: &Url, batch: &[Value]) -> IntegrationResult<()> {
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.api_key)
            .json(&json!({ "records": batch }))
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(IntegrationError::Rejected(format!(
            "Failed to create records: {}",
            error_text
        )))
    }
}

/// Map a workflow onto the table's columns
pub fn to_airtable_record(workflow: &WorkflowRecord, updated_at: &str) -> Value {
    json!({
        "fields": {
            "Name": workflow.name,
            "Description": workflow.description,
            "Trigger Type": workflow.trigger_type,
            "Complexity": workflow.complexity,
            "Node Count": workflow.node_count,
            "Active": workflow.active,
            "Integrations": workflow.integrations.join(", "),
            "Last Updated": updated_at,
        }
    })
}

#[async_trait]
impl RecordSink for AirtableExporter {
    fn name(&self) -> &str {
        "airtable"
    }

    async fn push(&self, records: &[WorkflowRecord]) -> IntegrationResult<usize> {
        let url = self.table_url()?;
        let updated_at = Local::now().to_rfc3339();
        let rows: Vec<Value> = records
            .iter()
            .map(|w| to_airtable_record(w, &updated_at))
            .collect();

        let mut created = 0;
        for batch in rows.chunks(BATCH_SIZE) {
            if let Err(e) = self.create_batch(&url, batch).await {
                return Err(IntegrationError::partial(created, e));
            }
            created += batch.len();
            debug!(created, total = rows.len(), "Airtable batch created");
        }

        Ok(created)
    }
}
