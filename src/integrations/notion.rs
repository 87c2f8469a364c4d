//! Notion database sync
//!
//! Each workflow becomes one page in a Notion database. Pages are created
//! one request at a time and the loop stops at the first failure.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::traits::{require, IntegrationError, IntegrationResult, RecordSink};
use super::workflow::WorkflowRecord;

/// Notion REST API base
pub const NOTION_API_URL: &str = "https://api.notion.com/v1";

/// API version the page payload is written against
pub const NOTION_VERSION: &str = "2022-06-28";

pub struct NotionSync {
    client: Client,
    token: String,
    database_id: String,
    api_url: String,
}

impl NotionSync {
    pub fn new(
        client: Client,
        database_id: impl Into<String>,
        token: impl Into<String>,
    ) -> IntegrationResult<Self> {
        let (database_id, token) = (database_id.into(), token.into());
        require(&database_id, "database_id")?;
        require(&token, "token")?;

        Ok(Self {
            client,
            token,
            database_id,
            api_url: NOTION_API_URL.to_string(),
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    async fn create_page(&self, page: &Value) -> IntegrationResult<()> {
        let response = self
            .client
            .post(format!("{}/pages", self.api_url.trim_end_matches('/')))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(page)
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
            "Failed to create page: {}",
            error_text
        )))
    }
}

/// Build the page-create payload with typed database properties
pub fn page_payload(database_id: &str, workflow: &WorkflowRecord) -> Value {
    let integrations: Vec<Value> = workflow
        .integrations
        .iter()
        .map(|name| json!({ "name": name }))
        .collect();

    json!({
        "parent": { "database_id": database_id },
        "properties": {
            "Name": {
                "title": [{ "text": { "content": workflow.name } }]
            },
            "Description": {
                "rich_text": [{ "text": { "content": workflow.description } }]
            },
            "Trigger Type": { "select": { "name": workflow.trigger_type } },
            "Complexity": { "select": { "name": workflow.complexity } },
            "Node Count": { "number": workflow.node_count },
            "Active": { "checkbox": workflow.active },
            "Integrations": { "multi_select": integrations },
        }
    })
}

#[async_trait]
impl RecordSink for NotionSync {
    fn name(&self) -> &str {
        "notion"
    }

    async fn push(&self, records: &[WorkflowRecord]) -> IntegrationResult<usize> {
        let mut created = 0;
        for workflow in records {
            let page = page_payload(&self.database_id, workflow);
            if let Err(e) = self.create_page(&page).await {
                return Err(IntegrationError::partial(created, e));
            }
            created += 1;
        }
        Ok(created)
    }
}
