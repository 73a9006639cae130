//! Runner configuration and defaults.

use std::{fmt, str::FromStr};

use serde::Serialize;

/// Default name of the table recording completed migrations.
pub const DEFAULT_HISTORY_TABLE: &str = "schema_migrations";

/// How the runner decides which steps are still pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryPolicy {
    /// Completed versions must be a prefix of the registry. A later version
    /// recorded while an earlier one is missing is a `HistoryGap` error.
    #[default]
    Contiguous,

    /// Every registered version not yet completed runs, ascending, even when
    /// later versions already completed.
    CompletedSet,
}

impl fmt::Display for HistoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contiguous => f.write_str("contiguous"),
            Self::CompletedSet => f.write_str("completed-set"),
        }
    }
}

impl FromStr for HistoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contiguous" => Ok(Self::Contiguous),
            "completed-set" => Ok(Self::CompletedSet),
            other => Err(format!(
                "unknown history policy '{other}', expected 'contiguous' or 'completed-set'"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Table recording completed versions.
    pub history_table: String,

    /// Pending-step selection policy.
    pub policy: HistoryPolicy,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            history_table: DEFAULT_HISTORY_TABLE.to_owned(),
            policy: HistoryPolicy::default(),
        }
    }
}

impl MigratorConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

#[derive(Debug)]
pub struct ConfigBuilder {
    config: MigratorConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MigratorConfig::default(),
        }
    }

    pub fn history_table(mut self, table: impl Into<String>) -> Self {
        self.config.history_table = table.into();
        self
    }

    pub fn policy(mut self, policy: HistoryPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn build(self) -> MigratorConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
