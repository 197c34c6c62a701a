//! UTC timestamp newtype used across every entity in the data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A UTC point in time.
///
/// Every entity in the data model carries a creation timestamp and an
/// optional updated timestamp of this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// The current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Seconds since the Unix epoch.
    #[must_use]
    pub fn unix_timestamp(&self) -> i64 {
        self.0.timestamp()
    }

    /// Build a timestamp `secs` seconds after this one.
    #[must_use]
    pub fn plus_seconds(&self, secs: i64) -> Self {
        Self(self.0 + chrono::Duration::seconds(secs))
    }

    /// Whether this timestamp is strictly before `now`.
    #[must_use]
    pub fn is_past(&self) -> bool {
        self.0 < Utc::now()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_seconds_is_monotone() {
        let t = Timestamp::now();
        let later = t.plus_seconds(300);
        assert!(later.0 > t.0);
    }

    #[test]
    fn is_past_for_old_timestamp() {
        let t = Timestamp::now().plus_seconds(-10);
        assert!(t.is_past());
    }
}
