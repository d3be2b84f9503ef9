//! Upload transport: one HTTP request per call, always resolved to an
//! [`UploadOutcome`].
//!
//! ## Why an outcome instead of `Result`?
//!
//! Every remote problem (connection refused, non-2xx status, a body that
//! does not parse) ends the same way for a workflow: it moves to `Failed`
//! with a message for the user. Returning [`UploadOutcome::Failure`] keeps
//! that path explicit and means nothing thrown inside reqwest can reach the
//! presentation layer unhandled. Each `send` resolves exactly once and a
//! `Success` is only built from a complete body.

use crate::config::ClientConfig;
use crate::error::{DocflowError, FailureKind, TransportFailure};
use crate::progress::{percent_of, ProgressFn};
use crate::staging::StagedFile;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Endpoint paths, relative to [`ClientConfig::base_url`].
pub mod endpoints {
    /// Multipart `files[]` + `metadata[]`; JSON `{message}` back.
    pub const INDEX_FILES: &str = "/api/ai/index-files";
    /// JSON `{query, top_k}`; JSON `{answer, matches}` back.
    pub const SEARCH_BODY: &str = "/api/ai/search-body";
    /// Multipart `file` + `target_format`; converted bytes back.
    pub const CONVERT: &str = "/api/convert/convert";
    /// Multipart `file`; JSON `{text}` back.
    pub const OCR: &str = "/ocr";
}

/// How the response body should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Parse as JSON.
    Json,
    /// Keep the raw bytes.
    Blob,
}

/// A multipart upload, built fresh for each submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    file_field: String,
    files: Vec<StagedFile>,
    fields: Vec<(String, String)>,
}

impl UploadRequest {
    /// Start a request whose files go under the multipart field `file_field`.
    pub fn new(file_field: impl Into<String>) -> Self {
        Self {
            file_field: file_field.into(),
            files: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn file(mut self, file: StagedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn files_from(mut self, files: impl IntoIterator<Item = StagedFile>) -> Self {
        self.files.extend(files);
        self
    }

    /// Append a scalar field. Repeating a name sends it repeatedly, in order.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file_field(&self) -> &str {
        &self.file_field
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Every value sent under `name`, in order.
    pub fn field_values(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn into_form(self) -> Result<Form, TransportFailure> {
        let mut form = Form::new();
        for file in self.files {
            let mime = file.mime_type();
            let (name, bytes) = file.into_parts();
            let part = Part::bytes(bytes)
                .file_name(name)
                .mime_str(mime)
                .map_err(|e| {
                    TransportFailure::new(FailureKind::Network, "Could not prepare upload")
                        .with_detail(format!("mime: {e}"))
                })?;
            form = form.part(self.file_field.clone(), part);
        }
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        Ok(form)
    }
}

/// A successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Json(Value),
    Blob(Vec<u8>),
}

/// Terminal resolution of one transport call.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Success(ResponsePayload),
    Failure(TransportFailure),
}

impl UploadOutcome {
    pub fn json(value: Value) -> Self {
        Self::Success(ResponsePayload::Json(value))
    }

    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Success(ResponsePayload::Blob(bytes.into()))
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure(TransportFailure::new(kind, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Sends requests to the backend.
///
/// Implementations must never panic or return early without an outcome;
/// every call resolves to exactly one [`UploadOutcome`].
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// POST `request` as multipart to `endpoint`.
    ///
    /// `on_progress`, when given, may be called any number of times with a
    /// percentage before the call resolves.
    async fn send(
        &self,
        endpoint: &str,
        request: UploadRequest,
        expect: Expect,
        on_progress: Option<ProgressFn>,
    ) -> UploadOutcome;

    /// POST `body` as JSON to `endpoint`, expecting JSON back.
    async fn post_json(&self, endpoint: &str, body: Value) -> UploadOutcome;
}

/// Shared handle stored by each controller.
pub type SharedTransport = Arc<dyn UploadTransport>;

/// [`UploadTransport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Build a transport bound to `config.base_url`.
    pub fn new(config: &ClientConfig) -> Result<Self, DocflowError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| DocflowError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn resolve(
        &self,
        endpoint: &str,
        sent: Result<reqwest::Response, reqwest::Error>,
        expect: Expect,
        on_progress: Option<ProgressFn>,
    ) -> UploadOutcome {
        let response = match sent {
            Ok(r) => r,
            Err(e) => {
                warn!("{}: request failed: {}", endpoint, e);
                return UploadOutcome::Failure(request_error(&e));
            }
        };

        let status = response.status();
        debug!("{}: HTTP {}", endpoint, status);

        if !status.is_success() {
            let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            let failure = match extract_detail(&body) {
                Some(detail) => TransportFailure::new(FailureKind::Status(status.as_u16()), detail),
                None => TransportFailure::new(
                    FailureKind::Status(status.as_u16()),
                    format!("Request failed with HTTP {}", status.as_u16()),
                ),
            }
            .with_detail(format!("HTTP {} from {}", status, endpoint));
            warn!("{}: {}", endpoint, failure.message);
            return UploadOutcome::Failure(failure);
        }

        let body = match read_body(response, on_progress.as_ref()).await {
            Ok(b) => b,
            Err(e) => {
                warn!("{}: body read failed: {}", endpoint, e);
                return UploadOutcome::Failure(request_error(&e));
            }
        };

        match expect {
            Expect::Blob => {
                info!("{}: received {} bytes", endpoint, body.len());
                UploadOutcome::blob(body)
            }
            Expect::Json => match serde_json::from_slice::<Value>(&body) {
                Ok(value) => UploadOutcome::json(value),
                Err(e) => {
                    warn!("{}: unparseable JSON: {}", endpoint, e);
                    UploadOutcome::Failure(
                        TransportFailure::new(
                            FailureKind::MalformedBody,
                            "The server returned an unreadable response",
                        )
                        .with_detail(e.to_string()),
                    )
                }
            },
        }
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        request: UploadRequest,
        expect: Expect,
        on_progress: Option<ProgressFn>,
    ) -> UploadOutcome {
        let url = self.config.endpoint_url(endpoint);
        info!(
            "POST {} ({} file(s), {} field(s))",
            url,
            request.files().len(),
            request.fields().len()
        );

        let form = match request.into_form() {
            Ok(f) => f,
            Err(failure) => return UploadOutcome::Failure(failure),
        };

        let sent = self.client.post(&url).multipart(form).send().await;
        self.resolve(endpoint, sent, expect, on_progress).await
    }

    async fn post_json(&self, endpoint: &str, body: Value) -> UploadOutcome {
        let url = self.config.endpoint_url(endpoint);
        info!("POST {} (json)", url);
        let sent = self.client.post(&url).json(&body).send().await;
        self.resolve(endpoint, sent, Expect::Json, None).await
    }
}

/// Stream the body, reporting progress against `Content-Length` when known.
async fn read_body(
    response: reqwest::Response,
    on_progress: Option<&ProgressFn>,
) -> Result<Vec<u8>, reqwest::Error> {
    let total = response.content_length();
    let mut body = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk?);
        if let (Some(total), Some(cb)) = (total, on_progress) {
            cb(percent_of(body.len() as u64, total));
        }
    }
    Ok(body)
}

fn request_error(e: &reqwest::Error) -> TransportFailure {
    if e.is_timeout() {
        TransportFailure::new(FailureKind::Timeout, "The request timed out").with_detail(e.to_string())
    } else {
        TransportFailure::new(FailureKind::Network, "Could not reach the server")
            .with_detail(e.to_string())
    }
}

/// Pull a human-readable reason out of an error body.
///
/// Understands FastAPI's two shapes: `{"detail": "..."}` and
/// `{"detail": [{"msg": "..."}, ...]}` for request validation errors.
pub fn extract_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::String(s) => (!s.trim().is_empty()).then(|| s.clone()),
        Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
