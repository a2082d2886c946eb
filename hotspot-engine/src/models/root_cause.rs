//! Root-cause taxonomy
//!
//! Closed set of categories the domain classifier maps signals onto.

use serde::{Deserialize, Serialize};

/// Root-cause category of a signal or hotspot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootCause {
    Process,
    Resource,
    Communication,
    Technology,
    Training,
    Quality,
    Unknown,
}

impl RootCause {
    /// All categories a rule can produce (excludes `Unknown`)
    pub const KNOWN: [RootCause; 6] = [
        RootCause::Process,
        RootCause::Resource,
        RootCause::Communication,
        RootCause::Technology,
        RootCause::Training,
        RootCause::Quality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RootCause::Process => "process",
            RootCause::Resource => "resource",
            RootCause::Communication => "communication",
            RootCause::Technology => "technology",
            RootCause::Training => "training",
            RootCause::Quality => "quality",
            RootCause::Unknown => "unknown",
        }
    }

    /// Parse a stored category name (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "process" => Some(RootCause::Process),
            "resource" => Some(RootCause::Resource),
            "communication" => Some(RootCause::Communication),
            "technology" => Some(RootCause::Technology),
            "training" => Some(RootCause::Training),
            "quality" => Some(RootCause::Quality),
            "unknown" => Some(RootCause::Unknown),
            _ => None,
        }
    }

    /// Human label used in hotspot titles
    pub fn label(&self) -> &'static str {
        match self {
            RootCause::Process => "Process",
            RootCause::Resource => "Resourcing",
            RootCause::Communication => "Communication",
            RootCause::Technology => "Technology",
            RootCause::Training => "Training",
            RootCause::Quality => "Quality",
            RootCause::Unknown => "Unclassified",
        }
    }
}

impl std::fmt::Display for RootCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_variant() {
        for cause in RootCause::KNOWN.iter().chain(std::iter::once(&RootCause::Unknown)) {
            assert_eq!(RootCause::parse(cause.as_str()), Some(*cause));
        }
        assert_eq!(RootCause::parse(" Technology "), Some(RootCause::Technology));
        assert_eq!(RootCause::parse("finance"), None);
    }
}
