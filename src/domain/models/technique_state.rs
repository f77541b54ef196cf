//! Lifecycle state of an attack technique.
//!
//! Reachable transitions:
//!
//! ```text
//! COLD --warmup--> WARM --detonate--> DETONATED --revert--> WARM
//! WARM | DETONATED --cleanup--> COLD
//! DETONATED --detonate--> DETONATED   (idempotent techniques, or force)
//! COLD --detonate--> DETONATED         (techniques without prerequisites)
//! ```
//!
//! Guards are enforced by the runner operations, not by this type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a technique's prerequisites and detonation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TechniqueState {
    /// No prerequisite infrastructure exists
    #[default]
    Cold,
    /// Prerequisites exist, technique not detonated (or reverted)
    Warm,
    /// Detonated and not reverted
    Detonated,
}

impl TechniqueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cold => "COLD",
            Self::Warm => "WARM",
            Self::Detonated => "DETONATED",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "COLD" => Some(Self::Cold),
            "WARM" => Some(Self::Warm),
            "DETONATED" => Some(Self::Detonated),
            _ => None,
        }
    }

    /// Whether `self -> next` is one of the lifecycle edges.
    ///
    /// `Detonated -> Detonated` is listed; whether it is allowed for a given
    /// technique depends on idempotency or force.
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (*self, next),
            (Self::Cold, Self::Warm)
                | (Self::Cold | Self::Warm, Self::Detonated)
                | (Self::Detonated, Self::Detonated)
                | (Self::Detonated, Self::Warm)
                | (Self::Warm | Self::Detonated, Self::Cold)
        )
    }
}

impl fmt::Display for TechniqueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
