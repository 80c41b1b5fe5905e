//! Citation extraction and verification.
//!
//! The completion step is contractually instructed to emit an inline
//! `[SOURCE:<chunk_id>]` marker immediately after any claim that uses
//! retrieved content, and none otherwise. This module enforces the other
//! side of that contract: displayed citations correspond 1:1 to markers the
//! generator actually emitted, so unused search results are never shown as
//! if they grounded the answer.

use regex::Regex;
use std::sync::OnceLock;

use crate::types::Citation;

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Leading spaces/tabs are stripped with the marker so punctuation after
    // it re-attaches to the preceding word
    RE.get_or_init(|| Regex::new(r"[ \t]*\[SOURCE:([^\]]+)\]").expect("valid marker regex"))
}

fn space_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("valid regex"))
}

fn newline_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

/// Scan generated text for provenance markers.
///
/// Returns the text with every marker stripped (whitespace normalized but
/// markdown line structure preserved) and the referenced chunk ids in order
/// of first appearance, de-duplicated.
pub fn extract_citations(content: &str) -> (String, Vec<String>) {
    let mut cited_ids: Vec<String> = Vec::new();
    for capture in marker_regex().captures_iter(content) {
        let id = capture[1].trim().to_string();
        if !cited_ids.contains(&id) {
            cited_ids.push(id);
        }
    }

    let stripped = marker_regex().replace_all(content, "");
    let collapsed = space_runs().replace_all(&stripped, " ");
    let cleaned = newline_runs().replace_all(&collapsed, "\n\n");

    (cleaned.trim().to_string(), cited_ids)
}

/// Keep only the citation candidates the generator actually referenced.
/// Candidate order is preserved.
pub fn filter_citations(candidates: Vec<Citation>, cited_ids: &[String]) -> Vec<Citation> {
    candidates
        .into_iter()
        .filter(|c| cited_ids.iter().any(|id| id == &c.chunk_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RetrievedSource, SourceType};

    fn candidate(chunk_id: &str) -> Citation {
        Citation::from_retrieved(&RetrievedSource {
            chunk_id: chunk_id.to_string(),
            document_id: "doc".into(),
            document_title: "Doc".into(),
            content: "content".into(),
            source_type: SourceType::Documents,
            score: 1.0,
            metadata: None,
        })
    }

    #[test]
    fn markers_are_extracted_and_stripped() {
        let text = "Rent is 1500 [SOURCE:chunk-documents-doc-1]. Quiet area.";
        let (cleaned, cited) = extract_citations(text);
        assert_eq!(cleaned, "Rent is 1500. Quiet area.");
        assert_eq!(cited, vec!["chunk-documents-doc-1".to_string()]);
    }

    #[test]
    fn repeated_markers_are_deduplicated() {
        let text = "A [SOURCE:x]. B [SOURCE:y]. C [SOURCE:x].";
        let (cleaned, cited) = extract_citations(text);
        assert_eq!(cited, vec!["x".to_string(), "y".to_string()]);
        assert!(!cleaned.contains("[SOURCE:"));
    }

    #[test]
    fn text_without_markers_is_untouched() {
        let text = "Plain answer.\n\nSecond paragraph.";
        let (cleaned, cited) = extract_citations(text);
        assert_eq!(cleaned, text);
        assert!(cited.is_empty());
    }

    #[test]
    fn markdown_newlines_survive_cleanup() {
        let text = "# Heading [SOURCE:a]\n\n- item one\n- item two\n\n\n\nEnd.";
        let (cleaned, _) = extract_citations(text);
        assert!(cleaned.contains("# Heading\n\n- item one\n- item two"));
        assert!(cleaned.contains("\n\nEnd."));
        assert!(!cleaned.contains("\n\n\n"));
    }

    #[test]
    fn filter_keeps_exactly_the_referenced_candidates() {
        let candidates = vec![candidate("chunk-documents-doc-1"), candidate("chunk-documents-doc-2")];
        let text = "Rent is 1500 [SOURCE:chunk-documents-doc-1]. Quiet area.";
        let (cleaned, cited) = extract_citations(text);

        let used = filter_citations(candidates, &cited);
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].chunk_id, "chunk-documents-doc-1");
        assert_eq!(cleaned, "Rent is 1500. Quiet area.");
    }

    #[test]
    fn unknown_marker_ids_filter_to_nothing() {
        let candidates = vec![candidate("chunk-documents-doc-1")];
        let (_, cited) = extract_citations("Claim [SOURCE:chunk-leases-other].");
        let used = filter_citations(candidates, &cited);
        assert!(used.is_empty());
    }
}
