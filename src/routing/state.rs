//! Request lifecycle state machine.
//!
//! ```text
//! RECEIVED → VALIDATING → RETRIEVING_KB → SCORING_KB → {ACCEPT_KB | RETRIEVING_WEB}
//!   RETRIEVING_WEB → SCORING_WEB → {ACCEPT_WEB | ACCEPT_HYBRID | REJECTED}
//!   ACCEPT_* → COMPOSING → VALIDATING_OUTPUT → {COMPOSING (one retry) | DONE}
//! ```
//!
//! `VALIDATING` may also go straight to `REJECTED` when the input guardrail
//! refuses the question. `REJECTED` and `DONE` are terminal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingState {
    /// Question received.
    Received,
    /// Input guardrail running.
    Validating,
    /// Knowledge base search in flight.
    RetrievingKb,
    /// Knowledge base results being scored.
    ScoringKb,
    /// Knowledge base evidence accepted.
    AcceptKb,
    /// Web search in flight.
    RetrievingWeb,
    /// Web results being scored.
    ScoringWeb,
    /// Web evidence accepted.
    AcceptWeb,
    /// Merged evidence accepted.
    AcceptHybrid,
    /// Request refused; terminal.
    Rejected,
    /// Generation in flight.
    Composing,
    /// Output guardrail running.
    ValidatingOutput,
    /// Response produced; terminal.
    Done,
}

impl RoutingState {
    /// Returns true if no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Done)
    }

    /// Returns true if `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use RoutingState as S;
        matches!(
            (self, next),
            (S::Received, S::Validating)
                | (S::Validating, S::RetrievingKb | S::Rejected)
                | (S::RetrievingKb, S::ScoringKb)
                | (S::ScoringKb, S::AcceptKb | S::RetrievingWeb)
                | (S::RetrievingWeb, S::ScoringWeb)
                | (S::ScoringWeb, S::AcceptWeb | S::AcceptHybrid | S::Rejected)
                | (S::AcceptKb | S::AcceptWeb | S::AcceptHybrid, S::Composing)
                | (S::Composing, S::ValidatingOutput)
                | (S::ValidatingOutput, S::Composing | S::Done)
        )
    }
}

impl std::fmt::Display for RoutingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Received => "RECEIVED",
            Self::Validating => "VALIDATING",
            Self::RetrievingKb => "RETRIEVING_KB",
            Self::ScoringKb => "SCORING_KB",
            Self::AcceptKb => "ACCEPT_KB",
            Self::RetrievingWeb => "RETRIEVING_WEB",
            Self::ScoringWeb => "SCORING_WEB",
            Self::AcceptWeb => "ACCEPT_WEB",
            Self::AcceptHybrid => "ACCEPT_HYBRID",
            Self::Rejected => "REJECTED",
            Self::Composing => "COMPOSING",
            Self::ValidatingOutput => "VALIDATING_OUTPUT",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// An illegal transition was requested.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Illegal routing transition {from} -> {to}")]
pub struct TransitionError {
    /// Current state.
    pub from: RoutingState,
    /// Requested state.
    pub to: RoutingState,
}

/// Tracks the current state and every state visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
    trail: Vec<RoutingState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Start in `RECEIVED`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trail: vec![RoutingState::Received],
        }
    }

    /// The current state.
    #[must_use]
    pub fn current(&self) -> RoutingState {
        self.trail
            .last()
            .copied()
            .unwrap_or(RoutingState::Received)
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if `next` is not a legal successor; the
    /// machine is left unchanged.
    pub fn advance(&mut self, next: RoutingState) -> Result<(), TransitionError> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(TransitionError { from, to: next });
        }
        tracing::trace!(%from, to = %next, "Routing transition");
        self.trail.push(next);
        Ok(())
    }

    /// Every state visited, in order.
    #[must_use]
    pub fn trail(&self) -> &[RoutingState] {
        &self.trail
    }

    /// Consume the machine, returning the trail.
    #[must_use]
    pub fn into_trail(self) -> Vec<RoutingState> {
        self.trail
    }
}
