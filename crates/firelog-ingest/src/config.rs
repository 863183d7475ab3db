//! Pipeline configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use firelog_core::FirelogPaths;

/// What to do with a row that violates the tabular schema
/// (missing `Timestamp`/`Severity`, or a timestamp without an hour).
///
/// Untracked severities are never affected by this policy: they are
/// expected traffic and are always dropped silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedRowPolicy {
    /// Fail the whole invocation on the first malformed row. Nothing is written.
    #[default]
    Abort,
    /// Drop the row, count it as skipped, and continue.
    Skip,
}

impl MalformedRowPolicy {
    /// Returns the configuration value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Skip => "skip",
        }
    }
}

impl fmt::Display for MalformedRowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MalformedRowPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            _ => Err(format!(
                "unknown malformed row policy '{value}' (expected abort or skip)"
            )),
        }
    }
}

/// Configuration for one [`crate::pipeline::Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Handling of schema-violating rows.
    pub malformed_rows: MalformedRowPolicy,

    /// Archive member suffix that identifies the tabular payload.
    pub payload_extension: String,

    /// Directory in the export sink receiving `{date}.json`.
    pub export_prefix: String,

    /// Whether the day export runs after a commit.
    pub export_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            malformed_rows: MalformedRowPolicy::default(),
            payload_extension: ".csv".to_string(),
            export_prefix: FirelogPaths::DEFAULT_EXPORT_PREFIX.to_string(),
            export_enabled: true,
        }
    }
}
