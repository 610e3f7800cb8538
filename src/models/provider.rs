//! News providers supported by the scraper and resolver.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A news site the pipeline knows how to search and resolve.
///
/// The set is closed: every variant supplies an extraction rule set
/// (see [`crate::scrapers::rules`]) and a resolver strategy
/// (see [`crate::services::resolve`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Cnn,
    #[serde(rename = "foxnews")]
    FoxNews,
}

impl Provider {
    /// All providers, in the order searches run by default.
    pub const ALL: [Provider; 2] = [Provider::Cnn, Provider::FoxNews];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cnn => "cnn",
            Self::FoxNews => "foxnews",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a provider name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0} (expected one of: cnn, foxnews)")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cnn" => Ok(Self::Cnn),
            "foxnews" | "fox" => Ok(Self::FoxNews),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}
