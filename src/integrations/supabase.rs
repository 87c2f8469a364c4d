//! Supabase project health
//!
//! The health check confirms both credentials are present and then asks
//! the management API for the slowest recent queries. That probe is best
//! effort: plans without query insights answer with an error, which counts
//! as "no slow queries" rather than an unhealthy project.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::traits::{require, HealthProbe, HealthReport, IntegrationResult};

/// Supabase management API base
pub const SUPABASE_API_URL: &str = "https://api.supabase.com/v1";

pub struct SupabaseClient {
    client: Client,
    access_token: String,
    project_ref: String,
    api_url: String,
}

impl SupabaseClient {
    pub fn new(
        client: Client,
        access_token: impl Into<String>,
        project_ref: impl Into<String>,
    ) -> IntegrationResult<Self> {
        let (access_token, project_ref) = (access_token.into(), project_ref.into());
        require(&access_token, "access_token")?;
        require(&project_ref, "project_ref")?;

        Ok(Self {
            client,
            access_token,
            project_ref,
            api_url: SUPABASE_API_URL.to_string(),
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Ten slowest queries by latency; empty when the API refuses
    pub async fn slow_queries(&self) -> IntegrationResult<Vec<Value>> {
        let url = format!(
            "{}/projects/{}/analytics/query",
            self.api_url.trim_end_matches('/'),
            self.project_ref
        );

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("sort", "latency"), ("order", "desc"), ("limit", "10")])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            debug!(
                status = response.status().as_u16(),
                "Query insights unavailable"
            );
            return Ok(Vec::new());
        }

        match response.json::<Value>().await? {
            Value::Array(queries) => Ok(queries),
            _ => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl HealthProbe for SupabaseClient {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn check(&self) -> IntegrationResult<HealthReport> {
        let slow_queries = match self.slow_queries().await {
            Ok(queries) => queries,
            Err(e) => {
                debug!(error = %e, "Slow query probe failed");
                Vec::new()
            }
        };

        Ok(HealthReport {
            slow_queries_count: slow_queries.len(),
        })
    }
}
