//! The staged state machine shared by all three workflows.
//!
//! ```text
//!            stage            submit             resolve
//!   Idle ─────────▶ Staged ─────────▶ Submitting ───────▶ Succeeded
//!    ▲                ▲  ▲                 │              │
//!    │ reset          │  └──── stage ──────┼──────────────┤
//!    │                │                    └─────────────▶ Failed ── submit (retry)
//!    └────────────────┴───────────────── reset ────────────┘
//! ```
//!
//! `Submitting` is only left through [`WorkflowState::settle`]; staging,
//! resetting and a second submission are refused while a request is in
//! flight. Leaving `Succeeded` drops the result, which releases any bytes it
//! holds.

use crate::error::{TransportFailure, ValidationError};
use serde::Serialize;
use std::fmt;

/// Where a workflow is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Staged,
    Submitting,
    Succeeded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::Staged => "staged",
            Stage::Submitting => "submitting",
            Stage::Succeeded => "succeeded",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A workflow's stage plus the data the terminal stages carry.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState<R> {
    Idle,
    Staged,
    Submitting,
    Succeeded(R),
    Failed(TransportFailure),
}

impl<R> Default for WorkflowState<R> {
    fn default() -> Self {
        WorkflowState::Idle
    }
}

impl<R> WorkflowState<R> {
    pub fn stage(&self) -> Stage {
        match self {
            WorkflowState::Idle => Stage::Idle,
            WorkflowState::Staged => Stage::Staged,
            WorkflowState::Submitting => Stage::Submitting,
            WorkflowState::Succeeded(_) => Stage::Succeeded,
            WorkflowState::Failed(_) => Stage::Failed,
        }
    }

    /// The typed result, in `Succeeded` only.
    pub fn result(&self) -> Option<&R> {
        match self {
            WorkflowState::Succeeded(r) => Some(r),
            _ => None,
        }
    }

    /// The failure, in `Failed` only.
    pub fn failure(&self) -> Option<&TransportFailure> {
        match self {
            WorkflowState::Failed(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, WorkflowState::Submitting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Succeeded(_) | WorkflowState::Failed(_))
    }

    /// Valid files were staged.
    pub(crate) fn mark_staged(&mut self) -> Result<(), ValidationError> {
        self.ensure_idle_line()?;
        *self = WorkflowState::Staged;
        Ok(())
    }

    /// A request is about to go out. Input checks are the caller's job.
    pub(crate) fn begin_submit(&mut self) -> Result<(), ValidationError> {
        self.ensure_idle_line()?;
        *self = WorkflowState::Submitting;
        Ok(())
    }

    /// The transport resolved. Returns `None` if nothing was in flight.
    pub(crate) fn settle(&mut self, result: Result<R, TransportFailure>) -> Option<Stage> {
        if !self.is_in_flight() {
            return None;
        }
        *self = match result {
            Ok(r) => WorkflowState::Succeeded(r),
            Err(f) => WorkflowState::Failed(f),
        };
        Some(self.stage())
    }

    /// Back to `Idle`, dropping any result or failure.
    pub(crate) fn reset(&mut self) -> Result<(), ValidationError> {
        self.ensure_idle_line()?;
        *self = WorkflowState::Idle;
        Ok(())
    }

    fn ensure_idle_line(&self) -> Result<(), ValidationError> {
        if self.is_in_flight() {
            Err(ValidationError::InFlight)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    type State = WorkflowState<String>;

    #[test]
    fn happy_path() {
        let mut s = State::default();
        assert_eq!(s.stage(), Stage::Idle);
        s.mark_staged().unwrap();
        assert_eq!(s.stage(), Stage::Staged);
        s.begin_submit().unwrap();
        assert!(s.is_in_flight());
        assert_eq!(s.settle(Ok("done".into())), Some(Stage::Succeeded));
        assert_eq!(s.result().map(String::as_str), Some("done"));
        assert!(s.is_terminal());
    }

    #[test]
    fn failure_is_carried() {
        let mut s = State::Staged;
        s.begin_submit().unwrap();
        let f = TransportFailure::new(FailureKind::Status(500), "boom");
        assert_eq!(s.settle(Err(f.clone())), Some(Stage::Failed));
        assert_eq!(s.failure(), Some(&f));
        assert!(s.result().is_none());
    }

    #[test]
    fn in_flight_refuses_everything_but_settle() {
        let mut s = State::Submitting;
        assert_eq!(s.begin_submit(), Err(ValidationError::InFlight));
        assert_eq!(s.mark_staged(), Err(ValidationError::InFlight));
        assert_eq!(s.reset(), Err(ValidationError::InFlight));
        assert_eq!(s.stage(), Stage::Submitting);
    }

    #[test]
    fn settle_without_flight_is_ignored() {
        let mut s = State::Staged;
        assert_eq!(s.settle(Ok("late".into())), None);
        assert_eq!(s.stage(), Stage::Staged);
    }

    #[test]
    fn reset_twice_is_idle() {
        let mut s = State::Succeeded("x".into());
        s.reset().unwrap();
        assert_eq!(s, State::Idle);
        s.reset().unwrap();
        assert_eq!(s, State::Idle);
    }

    #[test]
    fn staging_leaves_terminal_states() {
        let mut s = State::Succeeded("old".into());
        s.mark_staged().unwrap();
        assert!(s.result().is_none());
        let mut s = State::Failed(TransportFailure::empty_result("none"));
        s.mark_staged().unwrap();
        assert_eq!(s.stage(), Stage::Staged);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Submitting.to_string(), "submitting");
    }
}
