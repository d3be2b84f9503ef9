//! Which target formats the conversion backend can produce from a given
//! source extension.
//!
//! The table is process-wide and immutable. No entry lists its own source
//! extension as a target; the conversion endpoint has no identity
//! conversions, and any extension of the table must keep it that way.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

static FORMAT_TABLE: Lazy<BTreeMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    BTreeMap::from([
        ("jpg", &["pdf", "txt"][..]),
        ("jpeg", &["pdf", "txt"][..]),
        ("png", &["pdf", "txt"][..]),
        ("pdf", &["jpg", "txt", "docx"][..]),
        ("docx", &["pdf"][..]),
        ("txt", &["pdf"][..]),
    ])
});

/// Targets the backend can convert `source_extension` into, in display order.
///
/// Lookup is case-insensitive and tolerates a leading dot. `None` means the
/// source type is not convertible at all.
pub fn allowed_targets(source_extension: &str) -> Option<&'static [&'static str]> {
    let ext = source_extension.trim_start_matches('.').to_ascii_lowercase();
    FORMAT_TABLE.get(ext.as_str()).copied()
}

/// Whether `source → target` is a listed conversion.
pub fn is_allowed(source_extension: &str, target: &str) -> bool {
    allowed_targets(source_extension)
        .is_some_and(|targets| targets.iter().any(|t| t.eq_ignore_ascii_case(target.trim())))
}

/// Every source extension with at least one conversion rule, sorted.
pub fn supported_sources() -> impl Iterator<Item = &'static str> {
    FORMAT_TABLE.keys().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_values() {
        assert_eq!(allowed_targets("jpg"), Some(&["pdf", "txt"][..]));
        assert_eq!(allowed_targets("jpeg"), Some(&["pdf", "txt"][..]));
        assert_eq!(allowed_targets("png"), Some(&["pdf", "txt"][..]));
        assert_eq!(allowed_targets("pdf"), Some(&["jpg", "txt", "docx"][..]));
        assert_eq!(allowed_targets("docx"), Some(&["pdf"][..]));
        assert_eq!(allowed_targets("txt"), Some(&["pdf"][..]));
    }

    #[test]
    fn no_identity_conversions() {
        for src in supported_sources() {
            let targets = allowed_targets(src).unwrap();
            assert!(!targets.contains(&src), "{src} converts to itself");
        }
    }

    #[test]
    fn unknown_extensions_are_absent() {
        for ext in ["bmp", "gif", "xlsx", "", "pdfx"] {
            assert!(allowed_targets(ext).is_none(), "{ext} should be absent");
        }
    }

    #[test]
    fn lookup_ignores_case_and_dot() {
        assert_eq!(allowed_targets("PDF"), allowed_targets("pdf"));
        assert_eq!(allowed_targets(".Docx"), Some(&["pdf"][..]));
    }

    #[test]
    fn is_allowed_checks_pairs() {
        assert!(is_allowed("pdf", "docx"));
        assert!(is_allowed("pdf", "DOCX"));
        assert!(!is_allowed("pdf", "pdf"));
        assert!(!is_allowed("docx", "txt"));
        assert!(!is_allowed("bmp", "pdf"));
    }

    #[test]
    fn supported_sources_sorted() {
        let all: Vec<_> = supported_sources().collect();
        assert_eq!(all, vec!["docx", "jpeg", "jpg", "pdf", "png", "txt"]);
    }
}
