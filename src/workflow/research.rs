//! Research-Index workflow: upload documents for AI indexing, then ask
//! questions about them.
//!
//! Indexing follows the shared staged lifecycle. Search is a separate action
//! with its own small state machine: it is not tied to the staged files, so a
//! query can run while documents sit in the staging area, but two queries
//! never overlap.

use super::driver::WorkflowDriver;
use super::state::{Stage, WorkflowState};
use super::{PendingSubmission, Workflow, WorkflowKind};
use crate::config::ClientConfig;
use crate::error::{FailureKind, TransportFailure, ValidationError};
use crate::notify::{Notification, SharedNotifier};
use crate::progress::ProgressCallback;
use crate::staging::{StageReport, StagedFile, StagingPolicy, RESEARCH_ACCEPTED};
use crate::transport::{endpoints, Expect, ResponsePayload, SharedTransport, UploadOutcome, UploadRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Query sent by the "summarize" quick action.
pub const SUMMARIZE_QUERY: &str = "Summarize this document";

const DEFAULT_INDEX_MESSAGE: &str = "Upload completed successfully.";

/// What the index endpoint acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReceipt {
    /// Server message, or a generic one when it sent none.
    pub message: String,
    /// Metadata labels sent, one per file, in upload order.
    pub labels: Vec<String>,
}

/// One ranked passage from the index.
///
/// `rank` order is the server's relevance order (1 = most relevant) and is
/// never re-sorted on this side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub rank: u32,
    pub score: f64,
    #[serde(rename = "metadata")]
    pub metadata_label: String,
    #[serde(rename = "text")]
    pub text_excerpt: String,
}

/// A search answer with its supporting matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchAnswer {
    pub query: String,
    pub answer: String,
    pub matches: Vec<SearchMatch>,
}

#[derive(Deserialize)]
struct SearchResponse {
    answer: Option<String>,
    #[serde(default)]
    matches: Option<Vec<SearchMatch>>,
}

/// Controller for the Research-Index workflow.
pub struct ResearchController {
    driver: WorkflowDriver<IndexReceipt>,
    search: WorkflowState<SearchAnswer>,
    pending_query: Option<String>,
    default_top_k: usize,
    progress_callback: Option<ProgressCallback>,
}

impl ResearchController {
    pub fn new(transport: SharedTransport, notifier: SharedNotifier, config: &ClientConfig) -> Self {
        let policy = StagingPolicy::Cumulative {
            accepted: RESEARCH_ACCEPTED,
            max_file_bytes: config.max_index_file_bytes,
        };
        Self {
            driver: WorkflowDriver::new(
                WorkflowKind::ResearchIndex,
                policy,
                transport,
                notifier,
                config,
            ),
            search: WorkflowState::Idle,
            pending_query: None,
            default_top_k: config.default_top_k,
            progress_callback: config.progress_callback.clone(),
        }
    }

    /// Metadata labels the next index upload would send.
    pub fn labels(&self) -> Vec<String> {
        self.driver
            .staging
            .files()
            .iter()
            .enumerate()
            .map(|(i, f)| f.label_or_default(i))
            .collect()
    }

    /// State of the search action, independent of the index upload.
    pub fn search_state(&self) -> &WorkflowState<SearchAnswer> {
        &self.search
    }

    /// Validate a query and move search to `Submitting`.
    ///
    /// `top_k` defaults to the configured value and is clamped to 1–20.
    pub fn prepare_search(
        &mut self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<PendingSubmission, ValidationError> {
        if self.search.is_in_flight() {
            return Err(self.driver.reject(ValidationError::InFlight));
        }
        if query.trim().is_empty() {
            return Err(self.driver.reject(ValidationError::EmptyQuery));
        }
        let top_k = top_k
            .unwrap_or(self.default_top_k)
            .clamp(1, crate::config::MAX_TOP_K);

        self.search
            .begin_submit()
            .map_err(|e| self.driver.reject(e))?;
        self.pending_query = Some(query.to_string());
        if let Some(ref cb) = self.progress_callback {
            cb.on_request_start(endpoints::SEARCH_BODY);
        }
        info!("[{}] searching (top_k={})", WorkflowKind::ResearchIndex, top_k);

        Ok(PendingSubmission::json(
            endpoints::SEARCH_BODY,
            json!({ "query": query, "top_k": top_k }),
        ))
    }

    /// Apply the search endpoint's outcome.
    pub fn resolve_search(&mut self, outcome: UploadOutcome) -> Stage {
        let query = self.pending_query.take().unwrap_or_default();
        let result = match outcome {
            UploadOutcome::Success(ResponsePayload::Json(value)) => parse_search(query, value),
            UploadOutcome::Success(ResponsePayload::Blob(_)) => Err(TransportFailure::new(
                FailureKind::MalformedBody,
                "Search returned a non-JSON response",
            )),
            UploadOutcome::Failure(f) => Err(f),
        };

        let ok = result.is_ok();
        let failure = result.as_ref().err().cloned();
        let Some(stage) = self.search.settle(result) else {
            warn!("[{}] search outcome with nothing in flight; ignored", WorkflowKind::ResearchIndex);
            return self.search.stage();
        };
        if let Some(ref cb) = self.progress_callback {
            cb.on_request_complete(endpoints::SEARCH_BODY, ok);
        }

        match failure {
            None => {
                let n = self.search.result().map(|a| a.matches.len()).unwrap_or(0);
                debug!("[{}] search returned {} matches", WorkflowKind::ResearchIndex, n);
                self.driver.notify(Notification::success("AI Search Completed"));
            }
            Some(f) if f.kind == FailureKind::EmptyResult => {
                self.driver
                    .notify(Notification::warning(f.message.clone()));
            }
            Some(f) => {
                self.driver
                    .notify(Notification::error("Search failed").with_description(f.message));
            }
        }
        stage
    }

    /// Query the index. Rejects an empty or whitespace-only query before any
    /// request is made.
    pub async fn search(&mut self, query: &str, top_k: Option<usize>) -> Result<Stage, ValidationError> {
        let pending = self.prepare_search(query, top_k)?;
        let transport = Arc::clone(&self.driver.transport);
        let outcome = pending.send(transport.as_ref(), None).await;
        Ok(self.resolve_search(outcome))
    }

    /// Ask the index to summarize the uploaded documents.
    pub async fn summarize(&mut self) -> Result<Stage, ValidationError> {
        self.search(SUMMARIZE_QUERY, None).await
    }

    /// Clear the search answer without touching the staged documents.
    pub fn clear_search(&mut self) -> Result<(), ValidationError> {
        self.search.reset().map_err(|e| self.driver.reject(e))
    }
}

fn parse_search(query: String, value: Value) -> Result<SearchAnswer, TransportFailure> {
    let response: SearchResponse = serde_json::from_value(value).map_err(|e| {
        TransportFailure::new(FailureKind::MalformedBody, "Search returned an unexpected response")
            .with_detail(e.to_string())
    })?;

    let answer = response
        .answer
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| TransportFailure::empty_result("No results from AI."))?;

    Ok(SearchAnswer {
        query,
        answer,
        matches: response.matches.unwrap_or_default(),
    })
}

fn parse_index(labels: Vec<String>, outcome: UploadOutcome) -> Result<IndexReceipt, TransportFailure> {
    match outcome {
        UploadOutcome::Success(ResponsePayload::Json(value)) => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(DEFAULT_INDEX_MESSAGE)
                .to_string();
            Ok(IndexReceipt { message, labels })
        }
        UploadOutcome::Success(ResponsePayload::Blob(_)) => Err(TransportFailure::new(
            FailureKind::MalformedBody,
            "Indexing returned a non-JSON response",
        )),
        UploadOutcome::Failure(f) => Err(f),
    }
}

#[async_trait]
impl Workflow for ResearchController {
    type Output = IndexReceipt;

    fn kind(&self) -> WorkflowKind {
        WorkflowKind::ResearchIndex
    }

    fn state(&self) -> &WorkflowState<IndexReceipt> {
        &self.driver.state
    }

    fn staged(&self) -> &[StagedFile] {
        self.driver.staging.files()
    }

    fn progress(&self) -> u8 {
        self.driver.progress()
    }

    fn stage(&mut self, files: Vec<StagedFile>) -> Result<StageReport, ValidationError> {
        self.driver.stage(files)
    }

    fn prepare_submit(&mut self) -> Result<PendingSubmission, ValidationError> {
        self.driver.ensure_not_in_flight()?;
        if self.driver.staging.is_empty() {
            return Err(self.driver.reject(ValidationError::NoFilesStaged));
        }

        let labels = self.labels();
        let request = labels.into_iter().fold(
            UploadRequest::new("files").files_from(self.driver.staging.files().iter().cloned()),
            |req, label| req.field("metadata", label),
        );

        self.driver.begin(endpoints::INDEX_FILES)?;
        Ok(PendingSubmission::multipart(
            endpoints::INDEX_FILES,
            request,
            Expect::Json,
        ))
    }

    fn resolve(&mut self, outcome: UploadOutcome) -> Stage {
        let labels = self.labels();
        let result = parse_index(labels, outcome);
        let mut success = Notification::success("Files uploaded!");
        if let Ok(receipt) = &result {
            success = success.with_description(receipt.message.clone());
        }
        self.driver
            .finish(endpoints::INDEX_FILES, result, success, "Upload failed")
    }

    async fn submit(&mut self) -> Result<Stage, ValidationError> {
        let pending = self.prepare_submit()?;
        let transport = Arc::clone(&self.driver.transport);
        let progress = self.driver.progress_fn(pending.endpoint());
        let outcome = pending.send(transport.as_ref(), Some(progress)).await;
        Ok(self.resolve(outcome))
    }

    fn reset(&mut self) -> Result<(), ValidationError> {
        self.driver.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_keeps_server_order() {
        let body = json!({
            "answer": "Two passages",
            "matches": [
                {"rank": 1, "score": 0.42, "metadata": "b.pdf", "text": "second best score"},
                {"rank": 2, "score": 0.91, "metadata": "a.pdf", "text": "best score"}
            ]
        });
        let answer = parse_search("q".into(), body).unwrap();
        let ranks: Vec<u32> = answer.matches.iter().map(|m| m.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
        assert_eq!(answer.matches[1].metadata_label, "a.pdf");
    }

    #[test]
    fn missing_matches_default_to_empty() {
        let answer = parse_search("q".into(), json!({"answer": "ok"})).unwrap();
        assert!(answer.matches.is_empty());
    }

    #[test]
    fn blank_answer_is_empty_result() {
        let err = parse_search("q".into(), json!({"answer": "  ", "matches": []})).unwrap_err();
        assert_eq!(err.kind, FailureKind::EmptyResult);
        assert_eq!(err.message, "No results from AI.");
    }

    #[test]
    fn malformed_match_is_rejected() {
        let err = parse_search("q".into(), json!({"answer": "a", "matches": [{"rank": "x"}]}))
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedBody);
    }

    #[test]
    fn index_message_falls_back() {
        let receipt = parse_index(vec!["a.pdf".into()], UploadOutcome::json(json!({}))).unwrap();
        assert_eq!(receipt.message, DEFAULT_INDEX_MESSAGE);
        assert_eq!(receipt.labels, vec!["a.pdf".to_string()]);
    }
}
