//! OCR workflow: one image or document in, extracted text out.

use super::driver::WorkflowDriver;
use super::state::{Stage, WorkflowState};
use super::{PendingSubmission, Workflow, WorkflowKind};
use crate::config::ClientConfig;
use crate::error::{FailureKind, TransportFailure, ValidationError};
use crate::notify::{Notification, SharedNotifier};
use crate::staging::{StageReport, StagedFile, StagingPolicy};
use crate::transport::{endpoints, Expect, ResponsePayload, SharedTransport, UploadOutcome, UploadRequest};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Text the OCR service extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OcrText {
    pub source_name: String,
    /// May be empty when the image holds no recognisable text.
    pub text: String,
}

/// Controller for the OCR workflow.
pub struct OcrController {
    driver: WorkflowDriver<OcrText>,
}

impl OcrController {
    pub fn new(transport: SharedTransport, notifier: SharedNotifier, config: &ClientConfig) -> Self {
        Self {
            driver: WorkflowDriver::new(
                WorkflowKind::Ocr,
                StagingPolicy::Single,
                transport,
                notifier,
                config,
            ),
        }
    }
}

fn into_text(source_name: String, outcome: UploadOutcome) -> Result<OcrText, TransportFailure> {
    match outcome {
        UploadOutcome::Success(ResponsePayload::Json(value)) => match value.get("text") {
            Some(Value::String(text)) => Ok(OcrText {
                source_name,
                text: text.clone(),
            }),
            Some(_) => Err(TransportFailure::new(
                FailureKind::MalformedBody,
                "OCR returned text in an unexpected form",
            )),
            None => Err(TransportFailure::empty_result("No text was returned")),
        },
        UploadOutcome::Success(ResponsePayload::Blob(_)) => Err(TransportFailure::new(
            FailureKind::MalformedBody,
            "OCR returned a non-JSON response",
        )),
        UploadOutcome::Failure(f) => Err(f),
    }
}

#[async_trait]
impl Workflow for OcrController {
    type Output = OcrText;

    fn kind(&self) -> WorkflowKind {
        WorkflowKind::Ocr
    }

    fn state(&self) -> &WorkflowState<OcrText> {
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
        let Some(file) = self.driver.staging.current().cloned() else {
            return Err(self.driver.reject(ValidationError::NoFilesStaged));
        };

        self.driver.begin(endpoints::OCR)?;
        Ok(PendingSubmission::multipart(
            endpoints::OCR,
            UploadRequest::new("file").file(file),
            Expect::Json,
        ))
    }

    fn resolve(&mut self, outcome: UploadOutcome) -> Stage {
        let source_name = self
            .driver
            .staging
            .current()
            .map(|f| f.name().to_string())
            .unwrap_or_default();
        let result = into_text(source_name, outcome);
        self.driver.finish(
            endpoints::OCR,
            result,
            Notification::success("OCR extraction complete"),
            "OCR extraction failed",
        )
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
    use serde_json::json;

    #[test]
    fn empty_text_is_still_a_success() {
        let out = into_text("blank.png".into(), UploadOutcome::json(json!({"text": ""}))).unwrap();
        assert_eq!(out.text, "");
        assert_eq!(out.source_name, "blank.png");
    }

    #[test]
    fn missing_text_is_an_empty_result() {
        let err = into_text("a.png".into(), UploadOutcome::json(json!({}))).unwrap_err();
        assert_eq!(err.kind, FailureKind::EmptyResult);
    }

    #[test]
    fn non_string_text_is_malformed() {
        let err = into_text("a.png".into(), UploadOutcome::json(json!({"text": 42}))).unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedBody);
    }
}
