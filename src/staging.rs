//! File staging: accept picked or dropped files, validate them against the
//! workflow's rules, and hold the current selection until submit.
//!
//! Staging never touches the network. A rejected drop leaves the existing
//! selection exactly as it was.

use crate::error::{DocflowError, ValidationError};
use crate::formats;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Types the Research-Index workflow accepts.
pub const RESEARCH_ACCEPTED: &[&str] = &["pdf", "docx", "txt"];

/// A file selected by the user, held in memory until it is submitted.
#[derive(Clone, PartialEq, Eq)]
pub struct StagedFile {
    name: String,
    bytes: Vec<u8>,
    source_extension: String,
    label: Option<String>,
}

impl fmt::Debug for StagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedFile")
            .field("name", &self.name)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("source_extension", &self.source_extension)
            .field("label", &self.label)
            .finish()
    }
}

impl StagedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let source_extension = extension_of(&name);
        Self {
            name,
            bytes: bytes.into(),
            source_extension,
            label: None,
        }
    }

    /// Read a file from disk, naming it after the path's file name.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, DocflowError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DocflowError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                DocflowError::FileReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!("Read {} ({} bytes)", path.display(), bytes.len());
        Ok(Self::new(name, bytes))
    }

    /// Attach an explicit Research-Index metadata label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = (!label.trim().is_empty()).then_some(label);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lower-cased text after the last `.` of the name; empty if there is none.
    pub fn source_extension(&self) -> &str {
        &self.source_extension
    }

    /// Split into `(name, bytes)` for the wire.
    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.name, self.bytes)
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Metadata label sent for the file at `index` of an upload: the explicit
    /// label, else the file name, else `Document {index + 1}`.
    pub fn label_or_default(&self, index: usize) -> String {
        match (self.label.as_deref(), self.name.is_empty()) {
            (Some(label), _) => label.to_string(),
            (None, false) => self.name.clone(),
            (None, true) => format!("Document {}", index + 1),
        }
    }

    /// MIME type sent in the multipart part header.
    pub fn mime_type(&self) -> &'static str {
        match self.source_extension.as_str() {
            "pdf" => "application/pdf",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "txt" => "text/plain",
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "tif" | "tiff" => "image/tiff",
            "bmp" => "image/bmp",
            _ => "application/octet-stream",
        }
    }
}

fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Per-workflow staging rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagingPolicy {
    /// Research-Index: any number of files, appended across drops, restricted
    /// to `accepted` extensions.
    Cumulative {
        accepted: &'static [&'static str],
        max_file_bytes: u64,
    },
    /// Convert: one file whose extension has a conversion rule; replaces the
    /// previous selection.
    Convertible { max_file_bytes: u64 },
    /// OCR: one file of any type; replaces the previous selection.
    Single,
}

/// What a successful `stage` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Files added to the selection by this call.
    pub staged: usize,
    /// Files refused, each with the reason.
    pub rejected: Vec<ValidationError>,
    /// Extra files dropped on a single-file workflow.
    pub ignored: usize,
}

/// Holds the files a workflow will submit.
#[derive(Debug, Clone)]
pub struct FileStagingArea {
    policy: StagingPolicy,
    files: Vec<StagedFile>,
}

impl FileStagingArea {
    pub fn new(policy: StagingPolicy) -> Self {
        Self {
            policy,
            files: Vec::new(),
        }
    }

    pub fn policy(&self) -> &StagingPolicy {
        &self.policy
    }

    /// Validate `incoming` and update the selection.
    ///
    /// On `Err` the selection is untouched.
    pub fn stage(&mut self, incoming: Vec<StagedFile>) -> Result<StageReport, ValidationError> {
        if incoming.is_empty() {
            return Err(ValidationError::EmptySelection);
        }

        match self.policy {
            StagingPolicy::Cumulative {
                accepted,
                max_file_bytes,
            } => {
                let mut report = StageReport::default();
                let mut keep = Vec::with_capacity(incoming.len());
                for file in incoming {
                    if !accepted.contains(&file.source_extension()) {
                        report.rejected.push(ValidationError::NotAccepted {
                            name: file.name().to_string(),
                            accepted: accepted.join(", "),
                        });
                    } else if file.size() > max_file_bytes {
                        report.rejected.push(too_large(&file, max_file_bytes));
                    } else {
                        keep.push(file);
                    }
                }
                if keep.is_empty() {
                    // Every file was refused; surface the first reason.
                    return Err(report.rejected.swap_remove(0));
                }
                report.staged = keep.len();
                self.files.extend(keep);
                Ok(report)
            }
            StagingPolicy::Convertible { max_file_bytes } => {
                let (file, ignored) = take_first(incoming)?;
                if formats::allowed_targets(file.source_extension()).is_none() {
                    return Err(ValidationError::UnsupportedFileType {
                        name: file.name().to_string(),
                        extension: file.source_extension().to_string(),
                    });
                }
                if file.size() > max_file_bytes {
                    return Err(too_large(&file, max_file_bytes));
                }
                self.files = vec![file];
                Ok(StageReport {
                    staged: 1,
                    rejected: Vec::new(),
                    ignored,
                })
            }
            StagingPolicy::Single => {
                let (file, ignored) = take_first(incoming)?;
                self.files = vec![file];
                Ok(StageReport {
                    staged: 1,
                    rejected: Vec::new(),
                    ignored,
                })
            }
        }
    }

    /// Empty the selection.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    /// The single file of a one-file workflow.
    pub fn current(&self) -> Option<&StagedFile> {
        self.files.first()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// Single-file workflows keep the first file of a drop and ignore the rest.
fn take_first(files: Vec<StagedFile>) -> Result<(StagedFile, usize), ValidationError> {
    let mut iter = files.into_iter();
    let file = iter.next().ok_or(ValidationError::EmptySelection)?;
    Ok((file, iter.count()))
}

fn too_large(file: &StagedFile, limit: u64) -> ValidationError {
    ValidationError::FileTooLarge {
        name: file.name().to_string(),
        size: file.size(),
        limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn research() -> FileStagingArea {
        FileStagingArea::new(StagingPolicy::Cumulative {
            accepted: RESEARCH_ACCEPTED,
            max_file_bytes: 1024,
        })
    }

    fn file(name: &str) -> StagedFile {
        StagedFile::new(name, b"content".to_vec())
    }

    #[test]
    fn extension_is_derived_lowercase() {
        assert_eq!(file("Report.PDF").source_extension(), "pdf");
        assert_eq!(file("archive.tar.gz").source_extension(), "gz");
        assert_eq!(file("README").source_extension(), "");
    }

    #[test]
    fn default_labels() {
        assert_eq!(file("a.pdf").label_or_default(0), "a.pdf");
        assert_eq!(file("").label_or_default(2), "Document 3");
        assert_eq!(file("a.pdf").with_label("Q3 report").label_or_default(0), "Q3 report");
        assert_eq!(file("a.pdf").with_label("   ").label(), None);
    }

    #[test]
    fn research_staging_is_cumulative() {
        let mut area = research();
        area.stage(vec![file("a.pdf")]).unwrap();
        area.stage(vec![file("b.txt"), file("c.docx")]).unwrap();
        let names: Vec<_> = area.files().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a.pdf", "b.txt", "c.docx"]);
    }

    #[test]
    fn research_partial_drop_keeps_accepted() {
        let mut area = research();
        let report = area.stage(vec![file("a.pdf"), file("photo.png")]).unwrap();
        assert_eq!(report.staged, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(area.len(), 1);
    }

    #[test]
    fn research_all_rejected_leaves_selection() {
        let mut area = research();
        area.stage(vec![file("a.pdf")]).unwrap();
        let err = area.stage(vec![file("photo.png")]).unwrap_err();
        assert!(matches!(err, ValidationError::NotAccepted { .. }));
        assert_eq!(area.len(), 1);
    }

    #[test]
    fn research_size_limit() {
        let mut area = research();
        let big = StagedFile::new("big.pdf", vec![0u8; 2048]);
        let err = area.stage(vec![big]).unwrap_err();
        assert!(matches!(err, ValidationError::FileTooLarge { size: 2048, limit: 1024, .. }));
        assert!(area.is_empty());
    }

    #[test]
    fn convert_rejects_unknown_extension() {
        let mut area = FileStagingArea::new(StagingPolicy::Convertible { max_file_bytes: 1024 });
        area.stage(vec![file("report.pdf")]).unwrap();
        let err = area.stage(vec![file("image.bmp")]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedFileType {
                name: "image.bmp".into(),
                extension: "bmp".into()
            }
        );
        assert_eq!(area.current().unwrap().name(), "report.pdf");
    }

    #[test]
    fn convert_replaces_and_ignores_extras() {
        let mut area = FileStagingArea::new(StagingPolicy::Convertible { max_file_bytes: 1024 });
        area.stage(vec![file("a.pdf")]).unwrap();
        let report = area.stage(vec![file("b.png"), file("c.txt")]).unwrap();
        assert_eq!(report.ignored, 1);
        assert_eq!(area.len(), 1);
        assert_eq!(area.current().unwrap().name(), "b.png");
    }

    #[test]
    fn ocr_accepts_anything() {
        let mut area = FileStagingArea::new(StagingPolicy::Single);
        area.stage(vec![file("scan.bmp")]).unwrap();
        area.stage(vec![file("noext")]).unwrap();
        assert_eq!(area.current().unwrap().name(), "noext");
    }

    #[test]
    fn empty_drop_is_rejected() {
        let mut area = FileStagingArea::new(StagingPolicy::Single);
        assert_eq!(area.stage(vec![]).unwrap_err(), ValidationError::EmptySelection);
    }

    #[test]
    fn clear_empties() {
        let mut area = research();
        area.stage(vec![file("a.pdf")]).unwrap();
        area.clear();
        assert!(area.is_empty());
    }

    #[tokio::test]
    async fn from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Notes.TXT");
        std::fs::write(&path, b"hello").unwrap();
        let f = StagedFile::from_path(&path).await.unwrap();
        assert_eq!(f.name(), "Notes.TXT");
        assert_eq!(f.source_extension(), "txt");
        assert_eq!(f.bytes(), b"hello");
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = StagedFile::from_path("/definitely/not/here.pdf").await.unwrap_err();
        assert!(matches!(err, DocflowError::FileNotFound { .. }));
    }
}
