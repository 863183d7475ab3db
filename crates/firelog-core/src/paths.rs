//! Canonical storage paths for firelog.
//!
//! Every writer builds object paths through [`FirelogPaths`]; no other module
//! hardcodes a path layout.
//!
//! # Path Layout
//!
//! ```text
//! {aggregate store root}/
//! └── aggregates/
//!     └── date={YYYY-MM-DD}/
//!         └── hour={HH}.json          # one HourlyAggregate per hour
//!
//! {export sink root}/
//! └── data/
//!     └── {YYYY-MM-DD}.json           # DayExport, overwritten on each export
//! ```

/// Canonical path generator for aggregate records and day exports.
///
/// # Example
///
/// ```
/// use firelog_core::paths::FirelogPaths;
///
/// assert_eq!(
///     FirelogPaths::day_export(FirelogPaths::DEFAULT_EXPORT_PREFIX, "2025-04-28"),
///     "data/2025-04-28.json"
/// );
/// assert_eq!(
///     FirelogPaths::aggregate("2025-04-28", "10:00"),
///     "aggregates/date=2025-04-28/hour=10.json"
/// );
/// ```
pub struct FirelogPaths;

impl FirelogPaths {
    /// Directory holding per-hour aggregate documents.
    pub const AGGREGATES_DIR: &'static str = "aggregates";

    /// Default directory for day exports.
    pub const DEFAULT_EXPORT_PREFIX: &'static str = "data";

    /// Returns the export path for one date under `prefix`.
    #[must_use]
    pub fn day_export(prefix: &str, date: &str) -> String {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            format!("{date}.json")
        } else {
            format!("{prefix}/{date}.json")
        }
    }

    /// Returns the directory holding every aggregate for `date`.
    #[must_use]
    pub fn aggregate_date_dir(date: &str) -> String {
        format!("{}/date={date}/", Self::AGGREGATES_DIR)
    }

    /// Returns the document path for one aggregate.
    ///
    /// `hour` is the `HH:00` form; only the `HH` digits appear in the path.
    #[must_use]
    pub fn aggregate(date: &str, hour: &str) -> String {
        let hh = hour.split(':').next().unwrap_or(hour);
        format!("{}hour={hh}.json", Self::aggregate_date_dir(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_prefix_trailing_slash_is_normalized() {
        assert_eq!(
            FirelogPaths::day_export("data/", "2025-04-28"),
            "data/2025-04-28.json"
        );
        assert_eq!(FirelogPaths::day_export("", "2025-04-28"), "2025-04-28.json");
    }

    #[test]
    fn aggregate_paths_share_date_dir() {
        let dir = FirelogPaths::aggregate_date_dir("2025-04-28");
        assert!(FirelogPaths::aggregate("2025-04-28", "00:00").starts_with(&dir));
        assert!(FirelogPaths::aggregate("2025-04-28", "23:00").starts_with(&dir));
        assert!(!FirelogPaths::aggregate("2025-04-29", "23:00").starts_with(&dir));
    }
}
