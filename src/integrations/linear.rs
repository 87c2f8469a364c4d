//! Linear integration provider
//!
//! Fetches in-flight issues from Linear's GraphQL API. Filtering by team
//! happens client-side after the fetch.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::traits::{require, IntegrationError, IntegrationResult, IssueRecord, IssueTracker};

/// Linear GraphQL API endpoint
pub const LINEAR_API_URL: &str = "https://api.linear.app/graphql";

/// Issues whose workflow state type is "started"
const ACTIVE_ISSUES_QUERY: &str = r#"query Issues {
  issues(filter: { state: { type: { eq: "started" } } }) {
    nodes {
      id
      title
      description
      state {
        name
        type
      }
      assignee {
        displayName
      }
      url
      identifier
      team {
        key
      }
    }
  }
}"#;

/// Linear client
///
/// Holds the API key for a single operation; the hub builds a new one per
/// request.
pub struct LinearClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl LinearClient {
    /// Create a client against the public Linear API
    pub fn new(client: Client, api_key: impl Into<String>) -> IntegrationResult<Self> {
        let api_key = api_key.into();
        require(&api_key, "api_key")?;

        Ok(Self {
            client,
            api_key,
            endpoint: LINEAR_API_URL.to_string(),
        })
    }

    /// Point the client at another GraphQL endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Execute a GraphQL query against the Linear API
    async fn execute_graphql<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
    ) -> IntegrationResult<GraphQLResponse<T>> {
        let response = self
            .client
            .post(&self.endpoint)
            // Linear API uses the API key directly without "Bearer" prefix
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(IntegrationError::Rejected(format!(
                "Failed to fetch issues: {}",
                error_text
            )));
        }

        Ok(response.json().await?)
    }

    /// Fetch all issues in a started state
    pub async fn fetch_active_issues(&self) -> IntegrationResult<Vec<IssueRecord>> {
        let response: GraphQLResponse<IssuesData> =
            self.execute_graphql(ACTIVE_ISSUES_QUERY).await?;

        // A non-null `errors` key fails the call, even an empty list
        if let Some(errors) = response.errors {
            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(IntegrationError::Rejected(format!(
                "Linear GraphQL Error: {}",
                messages.join("; ")
            )));
        }

        Ok(response
            .data
            .and_then(|d| d.issues)
            .map(|c| c.nodes)
            .unwrap_or_default())
    }
}

/// Keep issues owned by `team_key`, preserving order.
///
/// A missing or empty key leaves the list untouched.
pub fn filter_by_team(issues: Vec<IssueRecord>, team_key: Option<&str>) -> Vec<IssueRecord> {
    match team_key.filter(|k| !k.is_empty()) {
        Some(key) => issues
            .into_iter()
            .filter(|issue| issue.team_key() == Some(key))
            .collect(),
        None => issues,
    }
}

/// Generic GraphQL response wrapper
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IssuesData {
    issues: Option<IssueConnection>,
}

#[derive(Debug, Deserialize)]
struct IssueConnection {
    nodes: Vec<IssueRecord>,
}

#[async_trait]
impl IssueTracker for LinearClient {
    fn name(&self) -> &str {
        "linear"
    }

    async fn active_issues(&self, team_key: Option<&str>) -> IntegrationResult<Vec<IssueRecord>> {
        let issues = self.fetch_active_issues().await?;
        Ok(filter_by_team(issues, team_key))
    }
}
