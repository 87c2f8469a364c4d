//! Workflow records exported to spreadsheets and documentation databases.

use serde::{Deserialize, Deserializer, Serialize};

/// Summary of one automation workflow
///
/// Missing or null fields default to empty values so partially filled
/// records from callers are still exportable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub trigger_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub complexity: String,
    #[serde(deserialize_with = "null_as_default")]
    pub node_count: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub active: bool,
    /// Names of the services the workflow talks to
    #[serde(deserialize_with = "null_as_default")]
    pub integrations: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl WorkflowRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
