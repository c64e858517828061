//! Runtime configuration for a [`Database`](crate::Database).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What `save()` does for a persisted instance with no modified attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyUpdatePolicy {
    /// Issue no statement and report success.
    #[default]
    Skip,
    /// Issue `UPDATE t SET pk = ? WHERE pk = ?` so the row's existence is
    /// checked against the database.
    Execute,
}

/// Configuration for engine behavior.
///
/// ```
/// use rowmodel_core::{DatabaseConfig, EmptyUpdatePolicy};
///
/// let config = DatabaseConfig::from_json(r#"{"empty_update": "execute"}"#).unwrap();
/// assert_eq!(config.empty_update, EmptyUpdatePolicy::Execute);
/// assert!(!config.log_statements);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Behavior for saves with nothing to update.
    pub empty_update: EmptyUpdatePolicy,
    /// Log every executed statement at `debug`.
    pub log_statements: bool,
}

impl DatabaseConfig {
    /// Configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the empty-update policy.
    #[must_use]
    pub const fn empty_update(mut self, policy: EmptyUpdatePolicy) -> Self {
        self.empty_update = policy;
        self
    }

    /// Enable or disable statement logging.
    #[must_use]
    pub const fn log_statements(mut self, value: bool) -> Self {
        self.log_statements = value;
        self
    }

    /// Parse from a JSON document. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }
}
