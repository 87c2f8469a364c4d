//! Hub configuration.
//!
//! Settings are read from an optional TOML file and then overridden by
//! `HUB__`-prefixed environment variables, using `__` between nested keys
//! (for example `HUB__SERVER__PORT=9000`).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::integrations::{
    airtable::AIRTABLE_API_URL, linear::LINEAR_API_URL, notion::NOTION_API_URL,
    supabase::SUPABASE_API_URL,
};

/// Default GitHub REST API root
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum HubConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] ConfigError),
}

/// A named integration and its declared settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub name: String,
    #[serde(alias = "api_key")]
    pub credential: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl IntegrationConfig {
    pub fn new(
        name: impl Into<String>,
        credential: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            credential: credential.into(),
            base_url: base_url.into(),
            enabled: true,
        }
    }
}

impl fmt::Debug for IntegrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationConfig")
            .field("name", &self.name)
            .field("credential", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// HTTP front door settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Client secret for verifying Sentry webhook signatures
    pub sentry_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8003,
            sentry_secret: None,
        }
    }
}

impl ServerConfig {
    /// Get the full bind address (ip:port)
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// API roots the adapters talk to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    /// Full GraphQL endpoint URL
    pub linear: String,
    pub github: String,
    pub supabase: String,
    pub airtable: String,
    pub notion: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            linear: LINEAR_API_URL.to_string(),
            github: GITHUB_API_URL.to_string(),
            supabase: SUPABASE_API_URL.to_string(),
            airtable: AIRTABLE_API_URL.to_string(),
            notion: NOTION_API_URL.to_string(),
        }
    }
}

impl ProviderEndpoints {
    /// Point every provider at one mock server, using the production paths
    pub fn rooted_at(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            linear: format!("{}/graphql", root),
            github: root.to_string(),
            supabase: format!("{}/v1", root),
            airtable: format!("{}/v0", root),
            notion: format!("{}/v1", root),
        }
    }

    /// `None` when GitHub is the public API, so octocrab keeps its default
    pub fn github_override(&self) -> Option<&str> {
        let github = self.github.trim_end_matches('/');
        (github != GITHUB_API_URL).then_some(github)
    }
}

/// Top-level hub configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Endpoints that get a logging handler at startup
    pub webhook_endpoints: Vec<String>,
    pub server: ServerConfig,
    pub endpoints: ProviderEndpoints,
    /// Integrations registered at startup
    pub integrations: Vec<IntegrationConfig>,
}

impl HubConfig {
    /// Load configuration from an optional TOML file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self, HubConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(HubConfigError::FileNotFound(path.display().to_string()));
            }
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("HUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Copy suitable for printing: credentials and secrets replaced
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for integration in &mut config.integrations {
            integration.credential = "<redacted>".to_string();
        }
        if config.server.sentry_secret.is_some() {
            config.server.sentry_secret = Some("<redacted>".to_string());
        }
        config
    }
}
