//! Interview state machine: whether a question is pending or the plan is done.

use serde::{Deserialize, Serialize};

/// The states of a planning conversation.
///
/// AwaitingAnswer loops on itself while questions remain, then moves to
/// Concluded. Concluded is terminal: further input only re-presents the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    AwaitingAnswer,
    Concluded,
}

impl EngineState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: EngineState) -> bool {
        use EngineState::*;
        matches!(
            (self, target),
            (AwaitingAnswer, AwaitingAnswer) | (AwaitingAnswer, Concluded) | (Concluded, Concluded)
        )
    }

    /// Whether the interview is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Concluded)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingAnswer => "awaiting_answer",
            Self::Concluded => "concluded",
        };
        write!(f, "{s}")
    }
}
