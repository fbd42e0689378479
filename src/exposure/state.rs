//! Exposure cycle states and their legal transitions.

use std::fmt;
use thiserror::Error;

/// State of one exposure/readout cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Armed,
    Exposing,
    /// Cancellation observed while exposing.
    Aborting,
    Stopping,
    ReadingOut,
    Done,
    Failed,
}

impl CycleState {
    /// Whether the cycle has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, CycleState::Done | CycleState::Failed)
    }

    /// Whether `next` may follow `self`.
    pub fn can_transition_to(self, next: CycleState) -> bool {
        use CycleState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Armed)
            | (Armed, Exposing)
            | (Exposing, Stopping)
            | (Exposing, Aborting)
            | (Stopping, ReadingOut)
            | (ReadingOut, Done)
            | (Aborting, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Armed => "armed",
            CycleState::Exposing => "exposing",
            CycleState::Aborting => "aborting",
            CycleState::Stopping => "stopping",
            CycleState::ReadingOut => "reading out",
            CycleState::Done => "done",
            CycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Illegal state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal cycle transition from {from} to {to}")]
pub struct TransitionError {
    pub from: CycleState,
    pub to: CycleState,
}

/// Tracks the current state and every state visited.
#[derive(Debug, Clone)]
pub struct StateMachine {
    trail: Vec<CycleState>,
}

impl StateMachine {
    /// Starts in [`CycleState::Idle`].
    pub fn new() -> Self {
        Self {
            trail: vec![CycleState::Idle],
        }
    }

    /// Current state.
    pub fn current(&self) -> CycleState {
        self.trail.last().copied().unwrap_or(CycleState::Idle)
    }

    /// Moves to `next` if the transition is legal.
    pub fn advance(&mut self, next: CycleState) -> Result<(), TransitionError> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(TransitionError { from, to: next });
        }
        tracing::debug!(from = %from, to = %next, "cycle transition");
        self.trail.push(next);
        Ok(())
    }

    /// Moves to [`CycleState::Failed`] unless already terminal.
    pub fn fail(&mut self) {
        if !self.current().is_terminal() {
            tracing::debug!(from = %self.current(), "cycle failed");
            self.trail.push(CycleState::Failed);
        }
    }

    /// Every state visited, in order.
    pub fn trail(&self) -> &[CycleState] {
        &self.trail
    }

    /// Consumes the machine, returning the trail.
    pub fn into_trail(self) -> Vec<CycleState> {
        self.trail
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
