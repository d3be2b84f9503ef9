//! # edgequake-docflow
//!
//! Client for the EdgeQuake document backend: index documents for AI search,
//! convert files between formats, and extract text with OCR.
//!
//! ## Workflows
//!
//! ```text
//!            stage()        submit()         transport resolves
//!   Idle ─────────▶ Staged ─────────▶ Submitting ─────────▶ Succeeded(result)
//!                                                  └──────▶ Failed(failure)
//! ```
//!
//! | Controller | Endpoint | Sends | Result |
//! |------------|----------|-------|--------|
//! | [`ResearchController`] | `/api/ai/index-files` | many pdf/docx/txt + labels | [`IndexReceipt`] |
//! | [`ResearchController::search`] | `/api/ai/search-body` | `{query, top_k}` | [`SearchAnswer`] |
//! | [`ConvertController`] | `/api/convert/convert` | one file + target | [`ConvertedFile`] |
//! | [`OcrController`] | `/ocr` | one file | [`OcrText`] |
//!
//! Local validation (unsupported types, missing inputs, a request already in
//! flight) is reported as [`ValidationError`] before anything is sent. Once a
//! request is sent, every outcome, including network errors and timeouts, lands
//! in the workflow state as a [`TransportFailure`]; none escapes as a panic.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docflow::{ClientConfig, DocflowClient, StagedFile, Workflow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env()?;
//!     let client = DocflowClient::new(config)?;
//!
//!     let mut convert = client.convert();
//!     convert.stage(vec![StagedFile::from_path("report.docx").await?])?;
//!     convert.choose_target("pdf")?;
//!     convert.submit().await?;
//!     if let Some(file) = convert.state().result() {
//!         file.save_into(".").await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docflow` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod formats;
pub mod notify;
pub mod present;
pub mod progress;
pub mod staging;
pub mod transport;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::DocflowClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{DocflowError, FailureKind, TransportFailure, ValidationError};
pub use notify::{Notification, NoticeLevel, Notifier, RecordingNotifier, SharedNotifier, TracingNotifier};
pub use present::{ResultPresenter, WorkflowResult};
pub use progress::{NoopProgressCallback, ProgressCallback, ProgressGauge, UploadProgressCallback};
pub use staging::{FileStagingArea, StageReport, StagedFile, StagingPolicy};
pub use transport::{
    Expect, HttpTransport, ResponsePayload, SharedTransport, UploadOutcome, UploadRequest, UploadTransport,
};
pub use workflow::convert::{ConvertController, ConvertedFile};
pub use workflow::ocr::{OcrController, OcrText};
pub use workflow::research::{IndexReceipt, ResearchController, SearchAnswer, SearchMatch};
pub use workflow::{PendingSubmission, RequestPayload, Stage, Workflow, WorkflowKind, WorkflowState};
