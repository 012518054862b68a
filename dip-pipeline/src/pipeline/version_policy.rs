//! Processor version policy tag.
//!
//! Resolving processor implementations by version happens in the plugin
//! layer; the pipeline only carries the policy it was configured with.

use super::layout::normalize_name;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How processor versions are matched against installed implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionPolicy {
    /// Only the exact version.
    #[serde(alias = "MICRO_EXACT")]
    MicroExact,
    /// The exact version if present, otherwise the latest micro version.
    #[serde(alias = "MICRO_LATEST_FALLBACK")]
    MicroLatestFallback,
    /// The latest micro version of the same minor version.
    #[default]
    #[serde(alias = "MICRO_LATEST")]
    MicroLatest,
    /// The latest minor version of the same major version.
    #[serde(alias = "MINOR_LATEST")]
    MinorLatest,
}

impl VersionPolicy {
    /// Looks up a policy by name, falling back to the default for unknown
    /// names.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match normalize_name(name).as_str() {
            "MICROEXACT" => Self::MicroExact,
            "MICROLATESTFALLBACK" => Self::MicroLatestFallback,
            "MINORLATEST" => Self::MinorLatest,
            _ => Self::MicroLatest,
        }
    }
}

impl fmt::Display for VersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MicroExact => write!(f, "MICRO_EXACT"),
            Self::MicroLatestFallback => write!(f, "MICRO_LATEST_FALLBACK"),
            Self::MicroLatest => write!(f, "MICRO_LATEST"),
            Self::MinorLatest => write!(f, "MINOR_LATEST"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(VersionPolicy::from_name("MICRO_EXACT"), VersionPolicy::MicroExact);
        assert_eq!(
            VersionPolicy::from_name("micro-latest-fallback"),
            VersionPolicy::MicroLatestFallback
        );
        assert_eq!(VersionPolicy::from_name("minor_latest"), VersionPolicy::MinorLatest);
        assert_eq!(VersionPolicy::from_name("bogus"), VersionPolicy::MicroLatest);
    }

    #[test]
    fn test_display_matches_name() {
        for policy in [
            VersionPolicy::MicroExact,
            VersionPolicy::MicroLatestFallback,
            VersionPolicy::MicroLatest,
            VersionPolicy::MinorLatest,
        ] {
            assert_eq!(VersionPolicy::from_name(&policy.to_string()), policy);
        }
    }
}
