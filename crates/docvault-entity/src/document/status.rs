//! Version status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use docvault_core::AppError;

/// Processing state of a document version.
///
/// ```text
/// processing ──► available
///      └───────► quarantined
/// ```
///
/// `available` and `quarantined` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    /// Uploaded, awaiting scanning and indexing.
    #[default]
    Processing,
    /// Cleared for use.
    Available,
    /// Flagged by the scanner.
    Quarantined,
}

impl VersionStatus {
    /// Whether no further transition is defined.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Available | Self::Quarantined)
    }

    /// Whether moving from `self` to `next` is a defined transition.
    pub fn can_transition_to(&self, next: VersionStatus) -> bool {
        !self.is_terminal() && next.is_terminal()
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Available => "available",
            Self::Quarantined => "quarantined",
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VersionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(Self::Processing),
            "available" => Ok(Self::Available),
            "quarantined" => Ok(Self::Quarantined),
            _ => Err(AppError::validation(format!("Invalid version status: '{s}'"))),
        }
    }
}
