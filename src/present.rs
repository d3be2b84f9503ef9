//! Plain-text rendering of workflow results.
//!
//! Pure functions over the typed results; the CLI prints what these return
//! and a GUI host can use them for labels and tooltips. Nothing here touches
//! workflow state.

use crate::error::{FailureKind, TransportFailure};
use crate::workflow::convert::ConvertedFile;
use crate::workflow::ocr::OcrText;
use crate::workflow::research::{IndexReceipt, SearchAnswer, SearchMatch};
use std::fmt::Write as _;

/// Characters of a match's text shown before the ellipsis.
pub const EXCERPT_CHARS: usize = 200;

/// A terminal result of any workflow, borrowed for display.
#[derive(Debug, Clone, Copy)]
pub enum WorkflowResult<'a> {
    Indexed(&'a IndexReceipt),
    Answer(&'a SearchAnswer),
    Converted(&'a ConvertedFile),
    Extracted(&'a OcrText),
    Failed(&'a TransportFailure),
}

/// Renders [`WorkflowResult`]s as text.
#[derive(Debug, Clone)]
pub struct ResultPresenter {
    excerpt_chars: usize,
}

impl Default for ResultPresenter {
    fn default() -> Self {
        Self {
            excerpt_chars: EXCERPT_CHARS,
        }
    }
}

impl ResultPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override how much of each match's text is shown.
    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    pub fn render(&self, result: WorkflowResult<'_>) -> String {
        match result {
            WorkflowResult::Indexed(r) => render_index(r),
            WorkflowResult::Answer(a) => self.render_answer(a),
            WorkflowResult::Converted(c) => render_converted(c),
            WorkflowResult::Extracted(t) => render_ocr(t),
            WorkflowResult::Failed(f) => render_failure(f),
        }
    }

    fn render_answer(&self, answer: &SearchAnswer) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "AI Answer:");
        let _ = writeln!(out, "{}", answer.answer);
        if !answer.matches.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Top Matches:");
            for m in &answer.matches {
                let _ = writeln!(out);
                let _ = writeln!(out, "  {}", m.metadata_label);
                let _ = writeln!(out, "  {}", excerpt(&m.text_excerpt, self.excerpt_chars));
                let _ = writeln!(out, "  {}", match_badge(m));
            }
        }
        out
    }
}

/// The first `max_chars` characters of `text`, followed by `...`.
///
/// Counts `char`s, not bytes, so multi-byte text is never split.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...")
}

/// `Rank #1 | Score: 0.91`
pub fn match_badge(m: &SearchMatch) -> String {
    format!("Rank #{} | Score: {:.2}", m.rank, m.score)
}

fn render_index(receipt: &IndexReceipt) -> String {
    let mut out = format!("{}\n", receipt.message);
    for label in &receipt.labels {
        let _ = writeln!(out, "  • {label}");
    }
    out
}

fn render_converted(file: &ConvertedFile) -> String {
    format!(
        "Converted {} to {} ({} bytes) as {}\n",
        file.source_name,
        file.target_format.to_uppercase(),
        file.len(),
        file.download_name
    )
}

fn render_ocr(text: &OcrText) -> String {
    if text.text.is_empty() {
        format!("No text found in {}\n", text.source_name)
    } else {
        format!("{}\n", text.text)
    }
}

/// Message plus a hint naming the failure class.
pub fn render_failure(failure: &TransportFailure) -> String {
    let class = match failure.kind {
        FailureKind::Network => "network error".to_string(),
        FailureKind::Timeout => "timed out".to_string(),
        FailureKind::Status(code) => format!("HTTP {code}"),
        FailureKind::MalformedBody => "unreadable response".to_string(),
        FailureKind::EmptyResult => "empty result".to_string(),
    };
    match failure.detail {
        Some(ref detail) => format!("{} ({class}; {detail})\n", failure.message),
        None => format!("{} ({class})\n", failure.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(rank: u32, score: f64, text: &str) -> SearchMatch {
        SearchMatch {
            rank,
            score,
            metadata_label: "doc.pdf".into(),
            text_excerpt: text.into(),
        }
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let long = "é".repeat(250);
        let out = excerpt(&long, EXCERPT_CHARS);
        assert_eq!(out.chars().count(), 203);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn excerpt_of_short_text_keeps_it_whole() {
        assert_eq!(excerpt("short", EXCERPT_CHARS), "short...");
    }

    #[test]
    fn badge_rounds_score() {
        assert_eq!(match_badge(&hit(1, 0.9134, "")), "Rank #1 | Score: 0.91");
        assert_eq!(match_badge(&hit(3, 0.5, "")), "Rank #3 | Score: 0.50");
    }

    #[test]
    fn answer_lists_matches_in_given_order() {
        let answer = SearchAnswer {
            query: "q".into(),
            answer: "A".into(),
            matches: vec![hit(2, 0.1, "second"), hit(1, 0.9, "first")],
        };
        let out = ResultPresenter::new().render(WorkflowResult::Answer(&answer));
        let second = out.find("Rank #2").unwrap();
        let first = out.find("Rank #1").unwrap();
        assert!(second < first);
    }

    #[test]
    fn answer_without_matches_has_no_heading() {
        let answer = SearchAnswer {
            query: "q".into(),
            answer: "Only this".into(),
            matches: vec![],
        };
        let out = ResultPresenter::new().render(WorkflowResult::Answer(&answer));
        assert!(!out.contains("Top Matches"));
    }

    #[test]
    fn failure_names_status() {
        let f = TransportFailure::new(FailureKind::Status(400), "Unsupported conversion")
            .with_detail("HTTP 400 from /api/convert/convert");
        let out = render_failure(&f);
        assert!(out.starts_with("Unsupported conversion (HTTP 400;"));
    }

    #[test]
    fn converted_summary_mentions_download_name() {
        let file = ConvertedFile {
            bytes: vec![1, 2, 3],
            source_name: "a.docx".into(),
            target_format: "pdf".into(),
            download_name: "a.pdf".into(),
        };
        let out = ResultPresenter::new().render(WorkflowResult::Converted(&file));
        assert_eq!(out, "Converted a.docx to PDF (3 bytes) as a.pdf\n");
    }
}
