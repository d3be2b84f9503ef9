//! Error types for the edgequake-docflow library.
//!
//! Three distinct types reflect three distinct failure modes:
//!
//! * [`DocflowError`]: **Fatal**: the client cannot be set up or an input or
//!   output file cannot be touched (bad base URL, unreadable file, output
//!   directory not writable). Returned as `Err(DocflowError)`.
//!
//! * [`ValidationError`]: **Client-local rejection**: the user asked for
//!   something the workflow will not send (unsupported extension, missing
//!   target format, blank query). No network call is made and the workflow
//!   state is left exactly as it was.
//!
//! * [`TransportFailure`]: **Remote failure**: the request went out but did
//!   not produce a usable result. It is never returned as `Err` from the
//!   transport; it travels inside [`crate::transport::UploadOutcome::Failure`]
//!   and ends up in the workflow's `Failed` state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docflow library.
#[derive(Debug, Error)]
pub enum DocflowError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// A client-local rejection. Raised synchronously, before any request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Convert: the dropped file's extension has no conversion rule.
    #[error("Unsupported file type: '{name}' (.{extension})")]
    UnsupportedFileType { name: String, extension: String },

    /// Research-Index: the file's type is not one the index accepts.
    #[error("'{name}' is not an accepted type (accepted: {accepted})")]
    NotAccepted { name: String, accepted: String },

    /// The file is larger than the backend will accept for this workflow.
    #[error("'{name}' is {size} bytes; the limit is {limit} bytes")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    /// A drop or picker event carried no files at all.
    #[error("No files provided")]
    EmptySelection,

    /// Submit was requested with nothing staged.
    #[error("No files selected.")]
    NoFilesStaged,

    /// Convert: submit was requested without a target format.
    #[error("Select file and target format")]
    MissingTargetFormat,

    /// Convert: the chosen target is not allowed for the staged source.
    #[error("Cannot convert .{source_ext} to {target}")]
    UnsupportedTarget { source_ext: String, target: String },

    /// Search was requested with an empty or whitespace-only query.
    #[error("Please enter a valid query.")]
    EmptyQuery,

    /// The controller already has a request in flight.
    #[error("A request is already in progress")]
    InFlight,
}

/// Classification of a [`TransportFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "status")]
pub enum FailureKind {
    /// Connection refused, DNS failure, reset mid-body.
    Network,
    /// The configured request timeout elapsed.
    Timeout,
    /// The server answered with a non-2xx status.
    Status(u16),
    /// The body could not be parsed as the expected shape.
    MalformedBody,
    /// The body parsed but lacks the content the workflow needs.
    EmptyResult,
}

/// A remote failure, carried by `UploadOutcome::Failure` and `Failed` states.
///
/// `message` is what gets shown to the user: the server's `detail` when it
/// sent one, a generic description otherwise. `detail` keeps the lower-level
/// reason (status line, reqwest error, parse error) for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
    pub detail: Option<String>,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// A well-formed response that lacks the expected content.
    pub fn empty_result(message: impl Into<String>) -> Self {
        Self::new(FailureKind::EmptyResult, message)
    }

    /// HTTP status code, when the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            FailureKind::Status(code) => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_file_type_display() {
        let e = ValidationError::UnsupportedFileType {
            name: "image.bmp".into(),
            extension: "bmp".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Unsupported file type"), "got: {msg}");
        assert!(msg.contains(".bmp"), "got: {msg}");
    }

    #[test]
    fn transport_failure_displays_message_only() {
        let f = TransportFailure::new(FailureKind::Status(500), "Indexing failed")
            .with_detail("HTTP 500 Internal Server Error");
        assert_eq!(f.to_string(), "Indexing failed");
        assert_eq!(f.status(), Some(500));
    }

    #[test]
    fn empty_result_has_no_status() {
        let f = TransportFailure::empty_result("No results from AI.");
        assert_eq!(f.kind, FailureKind::EmptyResult);
        assert_eq!(f.status(), None);
        assert!(f.detail.is_none());
    }

    #[test]
    fn output_write_failed_display() {
        let e = DocflowError::OutputWriteFailed {
            path: PathBuf::from("/nope/report.docx"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.to_string().contains("report.docx"));
    }
}
