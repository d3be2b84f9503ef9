//! Convert workflow: one file plus a target format in, converted bytes out.

use super::driver::WorkflowDriver;
use super::state::{Stage, WorkflowState};
use super::{PendingSubmission, Workflow, WorkflowKind};
use crate::config::ClientConfig;
use crate::error::{DocflowError, FailureKind, TransportFailure, ValidationError};
use crate::formats;
use crate::notify::{Notification, SharedNotifier};
use crate::staging::{StageReport, StagedFile, StagingPolicy};
use crate::transport::{endpoints, Expect, ResponsePayload, SharedTransport, UploadOutcome, UploadRequest};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const FALLBACK_STEM: &str = "converted_file";

/// The converted document, held in memory until saved or dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub bytes: Vec<u8>,
    pub source_name: String,
    pub target_format: String,
    /// Suggested file name: source stem plus the target extension.
    pub download_name: String,
}

impl fmt::Debug for ConvertedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertedFile")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("source_name", &self.source_name)
            .field("target_format", &self.target_format)
            .field("download_name", &self.download_name)
            .finish()
    }
}

impl ConvertedFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the bytes to `path` atomically (temp file + rename).
    ///
    /// A path ending in a separator (`out/`) names a directory: it is
    /// created if missing and the file is saved there under
    /// [`ConvertedFile::download_name`].
    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<PathBuf, DocflowError> {
        let path = path.as_ref();
        if names_directory(path) {
            return self.write_atomic(&path.join(&self.download_name)).await;
        }
        self.write_atomic(path).await
    }

    /// Save under `dir` using [`ConvertedFile::download_name`].
    pub async fn save_into(&self, dir: impl AsRef<Path>) -> Result<PathBuf, DocflowError> {
        self.write_atomic(&dir.as_ref().join(&self.download_name)).await
    }

    async fn write_atomic(&self, path: &Path) -> Result<PathBuf, DocflowError> {
        let write_err = |e| DocflowError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".part");
        let tmp_path = PathBuf::from(tmp_name);

        let written = match tokio::fs::write(&tmp_path, &self.bytes).await {
            Ok(()) => tokio::fs::rename(&tmp_path, path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // No partial temp file is left behind.
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(e));
        }

        info!("Wrote {} bytes to {}", self.bytes.len(), path.display());
        Ok(path.to_path_buf())
    }
}

fn names_directory(path: &Path) -> bool {
    path.as_os_str()
        .to_string_lossy()
        .ends_with(std::path::is_separator)
}

/// `report.final.pdf` + `docx` → `report.docx`; a name with nothing before
/// its first dot falls back to `converted_file`.
pub fn download_name(source_name: &str, target_format: &str) -> String {
    let stem = source_name.split('.').next().unwrap_or_default();
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };
    format!("{stem}.{target_format}")
}

/// Controller for the Convert workflow.
pub struct ConvertController {
    driver: WorkflowDriver<ConvertedFile>,
    target: Option<String>,
}

impl ConvertController {
    pub fn new(transport: SharedTransport, notifier: SharedNotifier, config: &ClientConfig) -> Self {
        Self {
            driver: WorkflowDriver::new(
                WorkflowKind::Convert,
                StagingPolicy::Convertible {
                    max_file_bytes: config.max_convert_file_bytes,
                },
                transport,
                notifier,
                config,
            ),
            target: None,
        }
    }

    /// Formats the staged file may be converted to; empty when nothing is
    /// staged.
    pub fn available_targets(&self) -> &'static [&'static str] {
        self.driver
            .staging
            .current()
            .and_then(|f| formats::allowed_targets(f.source_extension()))
            .unwrap_or(&[])
    }

    /// The chosen target format, if any.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Pick the output format for the staged file.
    pub fn choose_target(&mut self, format: &str) -> Result<(), ValidationError> {
        self.driver.ensure_not_in_flight()?;
        let Some(file) = self.driver.staging.current() else {
            return Err(self.driver.reject(ValidationError::NoFilesStaged));
        };
        let target = format.trim().trim_start_matches('.').to_ascii_lowercase();
        if !formats::is_allowed(file.source_extension(), &target) {
            let err = ValidationError::UnsupportedTarget {
                source_ext: file.source_extension().to_string(),
                target,
            };
            return Err(self.driver.reject(err));
        }
        debug!("[{}] target format {}", WorkflowKind::Convert, target);
        self.target = Some(target);
        Ok(())
    }
}

fn into_converted(
    source_name: String,
    target_format: String,
    outcome: UploadOutcome,
) -> Result<ConvertedFile, TransportFailure> {
    match outcome {
        UploadOutcome::Success(ResponsePayload::Blob(bytes)) if bytes.is_empty() => Err(
            TransportFailure::empty_result("The server returned an empty file"),
        ),
        UploadOutcome::Success(ResponsePayload::Blob(bytes)) => Ok(ConvertedFile {
            download_name: download_name(&source_name, &target_format),
            bytes,
            source_name,
            target_format,
        }),
        UploadOutcome::Success(ResponsePayload::Json(_)) => Err(TransportFailure::new(
            FailureKind::MalformedBody,
            "Expected a file but the server returned JSON",
        )),
        UploadOutcome::Failure(f) => Err(f),
    }
}

#[async_trait]
impl Workflow for ConvertController {
    type Output = ConvertedFile;

    fn kind(&self) -> WorkflowKind {
        WorkflowKind::Convert
    }

    fn state(&self) -> &WorkflowState<ConvertedFile> {
        &self.driver.state
    }

    fn staged(&self) -> &[StagedFile] {
        self.driver.staging.files()
    }

    fn progress(&self) -> u8 {
        self.driver.progress()
    }

    /// Replaces the staged file; the chosen target is cleared because it may
    /// not apply to the new file.
    fn stage(&mut self, files: Vec<StagedFile>) -> Result<StageReport, ValidationError> {
        let report = self.driver.stage(files)?;
        self.target = None;
        Ok(report)
    }

    fn prepare_submit(&mut self) -> Result<PendingSubmission, ValidationError> {
        self.driver.ensure_not_in_flight()?;
        let Some(file) = self.driver.staging.current().cloned() else {
            return Err(self.driver.reject(ValidationError::MissingTargetFormat));
        };
        let Some(target) = self.target.clone() else {
            return Err(self.driver.reject(ValidationError::MissingTargetFormat));
        };

        let request = UploadRequest::new("file")
            .file(file)
            .field("target_format", target);

        self.driver.begin(endpoints::CONVERT)?;
        Ok(PendingSubmission::multipart(
            endpoints::CONVERT,
            request,
            Expect::Blob,
        ))
    }

    fn resolve(&mut self, outcome: UploadOutcome) -> Stage {
        let source_name = self
            .driver
            .staging
            .current()
            .map(|f| f.name().to_string())
            .unwrap_or_default();
        let target = self.target.clone().unwrap_or_default();

        let result = into_converted(source_name, target, outcome);
        let mut success = Notification::success("Conversion successful");
        if let Ok(file) = &result {
            success = success.with_description(format!("Ready to download as {}", file.download_name));
        }
        let stage = self
            .driver
            .finish(endpoints::CONVERT, result, success, "Conversion failed");
        if stage == Stage::Succeeded {
            self.target = None;
        }
        stage
    }

    async fn submit(&mut self) -> Result<Stage, ValidationError> {
        let pending = self.prepare_submit()?;
        let transport = Arc::clone(&self.driver.transport);
        let progress = self.driver.progress_fn(pending.endpoint());
        let outcome = pending.send(transport.as_ref(), Some(progress)).await;
        Ok(self.resolve(outcome))
    }

    fn reset(&mut self) -> Result<(), ValidationError> {
        self.driver.reset()?;
        self.target = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_name_uses_text_before_first_dot() {
        assert_eq!(download_name("report.pdf", "docx"), "report.docx");
        assert_eq!(download_name("scan.final.png", "pdf"), "scan.pdf");
        assert_eq!(download_name("README", "pdf"), "README.pdf");
    }

    #[test]
    fn download_name_falls_back_when_stem_is_empty() {
        assert_eq!(download_name(".hidden.txt", "pdf"), "converted_file.pdf");
        assert_eq!(download_name("", "txt"), "converted_file.txt");
    }

    #[test]
    fn empty_blob_is_an_empty_result() {
        let err = into_converted("a.pdf".into(), "txt".into(), UploadOutcome::blob(Vec::new()))
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::EmptyResult);
    }

    #[test]
    fn json_instead_of_blob_is_malformed() {
        let err = into_converted(
            "a.pdf".into(),
            "txt".into(),
            UploadOutcome::json(serde_json::json!({"ok": true})),
        )
        .unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedBody);
    }

    #[tokio::test]
    async fn save_into_writes_download_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = into_converted("notes.txt".into(), "pdf".into(), UploadOutcome::blob(b"%PDF".to_vec()))
            .unwrap();
        let path = file.save_into(dir.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "notes.pdf");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF");
        assert!(!dir.path().join("notes.pdf.part").exists());
    }

    #[tokio::test]
    async fn save_to_trailing_separator_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = into_converted("report.docx".into(), "pdf".into(), UploadOutcome::blob(b"%PDF".to_vec()))
            .unwrap();
        let out = format!("{}{}", dir.path().join("out").display(), std::path::MAIN_SEPARATOR);

        let path = file.save_to(&out).await.unwrap();
        assert_eq!(path, dir.path().join("out").join("report.pdf"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF");
        assert!(!dir.path().join("out").join(".part").exists());
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the target makes the rename fail after the
        // temp file has been written.
        let target = dir.path().join("taken.pdf");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();

        let file = into_converted("taken.docx".into(), "pdf".into(), UploadOutcome::blob(b"%PDF".to_vec()))
            .unwrap();
        let err = file.save_to(&target).await.unwrap_err();
        assert!(matches!(err, DocflowError::OutputWriteFailed { .. }));
        assert!(!dir.path().join("taken.pdf.part").exists());
        assert!(target.join("keep").exists());
    }
}
