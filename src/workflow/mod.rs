//! Workflow controllers: one state machine per upload journey.
//!
//! Each controller owns its staged files, its [`WorkflowState`], and a
//! progress gauge. Nothing is shared between controllers, so there is no
//! locking; within one controller submissions are strictly serialized by
//! the `Submitting` stage.
//!
//! ## Submission lifecycle
//!
//! ```text
//! prepare_submit() ──▶ PendingSubmission::send(transport) ──▶ resolve(outcome)
//!   validate,             one HTTP request,                   terminal stage,
//!   → Submitting          always an UploadOutcome             notification
//! ```
//!
//! [`Workflow::submit`] runs all three against the controller's own
//! transport. Hosts that drive the network themselves can call the steps
//! separately.
//!
//! 1. [`research`]: index many documents, then query them
//! 2. [`convert`]: one file to a target format, binary result
//! 3. [`ocr`]: one file to extracted text

pub mod convert;
mod driver;
pub mod ocr;
pub mod research;
pub mod state;

pub use state::{Stage, WorkflowState};

use crate::error::ValidationError;
use crate::progress::ProgressFn;
use crate::staging::{StageReport, StagedFile};
use crate::transport::{Expect, UploadOutcome, UploadRequest, UploadTransport};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// The three upload journeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    ResearchIndex,
    Convert,
    Ocr,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkflowKind::ResearchIndex => "research-index",
            WorkflowKind::Convert => "convert",
            WorkflowKind::Ocr => "ocr",
        })
    }
}

/// Body of a prepared request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Multipart { request: UploadRequest, expect: Expect },
    Json(Value),
}

/// A validated request whose controller is now `Submitting`.
///
/// Send it with [`PendingSubmission::send`] and hand the outcome back to the
/// controller's `resolve`.
#[derive(Debug)]
#[must_use = "the controller stays in Submitting until the outcome is resolved"]
pub struct PendingSubmission {
    endpoint: &'static str,
    payload: RequestPayload,
}

impl PendingSubmission {
    pub(crate) fn multipart(endpoint: &'static str, request: UploadRequest, expect: Expect) -> Self {
        Self {
            endpoint,
            payload: RequestPayload::Multipart { request, expect },
        }
    }

    pub(crate) fn json(endpoint: &'static str, body: Value) -> Self {
        Self {
            endpoint,
            payload: RequestPayload::Json(body),
        }
    }

    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    /// Perform the request. Always resolves to an outcome.
    pub async fn send(
        self,
        transport: &dyn UploadTransport,
        on_progress: Option<ProgressFn>,
    ) -> UploadOutcome {
        match self.payload {
            RequestPayload::Multipart { request, expect } => {
                transport.send(self.endpoint, request, expect, on_progress).await
            }
            RequestPayload::Json(body) => transport.post_json(self.endpoint, body).await,
        }
    }
}

/// The contract every controller implements.
#[async_trait]
pub trait Workflow: Send {
    /// Typed result carried by `Succeeded`.
    type Output: Send + Sync;

    fn kind(&self) -> WorkflowKind;

    fn state(&self) -> &WorkflowState<Self::Output>;

    /// Files currently staged.
    fn staged(&self) -> &[StagedFile];

    /// Displayed progress of the current or last request, `0..=100`.
    fn progress(&self) -> u8;

    /// Validate and stage files. On `Err` nothing changed.
    fn stage(&mut self, files: Vec<StagedFile>) -> Result<StageReport, ValidationError>;

    /// Validate inputs and move to `Submitting`.
    fn prepare_submit(&mut self) -> Result<PendingSubmission, ValidationError>;

    /// Apply the transport's outcome and move to `Succeeded` or `Failed`.
    fn resolve(&mut self, outcome: UploadOutcome) -> Stage;

    /// Prepare, send, and resolve in one go.
    ///
    /// `Err` means the submission was rejected locally and no request was
    /// made; `Ok` carries the terminal stage reached.
    async fn submit(&mut self) -> Result<Stage, ValidationError>;

    /// Back to `Idle`, clearing staged files and any result.
    fn reset(&mut self) -> Result<(), ValidationError>;

    fn current_stage(&self) -> Stage {
        self.state().stage()
    }
}
