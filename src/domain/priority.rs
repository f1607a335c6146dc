//! Request priority tiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Priority of a feed request. Lower order is served first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Highest,
    High,
    #[default]
    Medium,
    Low,
    Lowest,
}

impl Priority {
    /// Every tier, highest first.
    pub const ALL: [Priority; 5] = [
        Priority::Highest,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::Lowest,
    ];

    /// Numeric order of the tier (1 = served first).
    pub fn order(&self) -> u8 {
        match self {
            Priority::Highest => 1,
            Priority::High => 2,
            Priority::Medium => 3,
            Priority::Low => 4,
            Priority::Lowest => 5,
        }
    }

    /// Upper-case tag used in dedup keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Highest => "HIGHEST",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
            Priority::Lowest => "LOWEST",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown priority '{}'", s))
    }
}
