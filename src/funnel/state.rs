//! Funnel state machine — tracks which step of the prize funnel a user is in.

use serde::{Deserialize, Serialize};

/// The stages of the lead-capture funnel.
///
/// Progresses linearly: Start → AwaitingName → AwaitingPhone → Completed.
/// A fresh `/start` resets any session back to `Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStage {
    /// Session exists, no prize claimed yet.
    Start,
    /// Prize claimed, waiting for the keepsake-card name.
    AwaitingName,
    /// Name collected, waiting for the shared contact.
    AwaitingPhone,
    /// Lead finalized. Only a restart moves the session out of here.
    Completed,
}

impl FunnelStage {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: FunnelStage) -> bool {
        use FunnelStage::*;
        matches!(
            (self, target),
            (Start, AwaitingName) | (AwaitingName, AwaitingPhone) | (AwaitingPhone, Completed)
        )
    }

    /// Whether this stage is terminal (the lead has been captured).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingPhone => "awaiting_phone",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}
