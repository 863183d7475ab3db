//! Tabular log row model.
//!
//! Rows follow a fixed, versionless column layout:
//!
//! ```text
//! Timestamp,Hostname,AppName,SeverityLevel,Severity,LogType,Message
//! 2025-04-28T10:15:30Z,srx-fw01,RT_IDP,2,CRITICAL,THREAT,RT_IDP_ATTACK_LOG: Port scan detected
//! ```
//!
//! Aggregation reads only `Timestamp`, `Hostname` and `Severity`; the full
//! [`LogRecord`] is available for fixtures and tooling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Column holding the ISO-8601 UTC timestamp.
pub const COL_TIMESTAMP: &str = "Timestamp";
/// Column holding the emitting host.
pub const COL_HOSTNAME: &str = "Hostname";
/// Column holding the application tag.
pub const COL_APP_NAME: &str = "AppName";
/// Column holding the numeric syslog level.
pub const COL_SEVERITY_LEVEL: &str = "SeverityLevel";
/// Column holding the severity name.
pub const COL_SEVERITY: &str = "Severity";
/// Column holding the normal/threat classification.
pub const COL_LOG_TYPE: &str = "LogType";
/// Column holding the free-text message.
pub const COL_MESSAGE: &str = "Message";

/// All columns in file order.
pub const COLUMNS: [&str; 7] = [
    COL_TIMESTAMP,
    COL_HOSTNAME,
    COL_APP_NAME,
    COL_SEVERITY_LEVEL,
    COL_SEVERITY,
    COL_LOG_TYPE,
    COL_MESSAGE,
];

/// Syslog severity (RFC 5424 priority names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// System is unusable (0).
    Emergency,
    /// Action must be taken immediately (1).
    Alert,
    /// Critical conditions (2).
    Critical,
    /// Error conditions (3).
    Error,
    /// Warning conditions (4).
    Warning,
    /// Normal but significant condition (5).
    Notice,
    /// Informational (6).
    Info,
    /// Debug-level messages (7).
    Debug,
}

impl Severity {
    /// All severities in ascending level order.
    pub const ALL: [Self; 8] = [
        Self::Emergency,
        Self::Alert,
        Self::Critical,
        Self::Error,
        Self::Warning,
        Self::Notice,
        Self::Info,
        Self::Debug,
    ];

    /// Returns the numeric syslog level (0-7).
    #[must_use]
    pub const fn level(self) -> u8 {
        self as u8
    }

    /// Returns the column value for this severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "EMERGENCY",
            Self::Alert => "ALERT",
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Notice => "NOTICE",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }

    /// Returns the counting bucket, or `None` for untracked severities.
    #[must_use]
    pub const fn tracked(self) -> Option<TrackedSeverity> {
        match self {
            Self::Critical => Some(TrackedSeverity::Critical),
            Self::Warning => Some(TrackedSeverity::Warning),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown severity name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity '{0}'")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sev| sev.as_str() == s)
            .ok_or_else(|| UnknownSeverity(s.to_string()))
    }
}

/// The bounded set of severities that are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedSeverity {
    /// Counted into `critical`.
    Critical,
    /// Counted into `warning`.
    Warning,
}

impl TrackedSeverity {
    /// Classifies a raw severity column value by exact match.
    ///
    /// Anything other than `CRITICAL` or `WARNING` (including lowercase
    /// spellings and empty strings) is untracked.
    #[must_use]
    pub fn from_column(value: &str) -> Option<Self> {
        match value {
            "CRITICAL" => Some(Self::Critical),
            "WARNING" => Some(Self::Warning),
            _ => None,
        }
    }
}

/// Normal traffic vs. threat detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogType {
    /// Routine session, auth or UTM traffic.
    Normal,
    /// Screen, IDP or policy-deny detections.
    Threat,
}

/// One fully parsed log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// `YYYY-MM-DDTHH:MM:SSZ`.
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    /// Emitting host.
    #[serde(rename = "Hostname")]
    pub hostname: String,
    /// Application tag (e.g. `RT_FLOW`).
    #[serde(rename = "AppName")]
    pub app_name: String,
    /// Numeric syslog level.
    #[serde(rename = "SeverityLevel")]
    pub severity_level: u8,
    /// Severity name.
    #[serde(rename = "Severity")]
    pub severity: Severity,
    /// Normal vs threat.
    #[serde(rename = "LogType")]
    pub log_type: LogType,
    /// Free-text message.
    #[serde(rename = "Message")]
    pub message: String,
}
