//! Answer origin and its precedence

use serde::{Deserialize, Serialize};

/// Where an answer value came from
///
/// Ordered by authority: a `Confirmed` answer outranks an `Optimistic` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerOrigin {
    /// Written locally before the hub confirmed it
    Optimistic,
    /// Derived from a hub broadcast
    Confirmed,
}

impl std::fmt::Display for AnswerOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimistic => write!(f, "optimistic"),
            Self::Confirmed => write!(f, "confirmed"),
        }
    }
}
