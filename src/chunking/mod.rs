//! Text chunking with offset tracking.
//!
//! Five strategies share a single overflow/overlap rule (the greedy
//! accumulator below); per-strategy copies of that rule are where boundary
//! bugs come from, so only the segmentation differs between strategies.
//! All offsets are byte offsets into the source text, clamped to `char`
//! boundaries so `&text[start..end]` is always valid for highlighting.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::types::SourceType;

/// A bounded span of source text, the atomic indexed unit
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub content: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Chunking strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingMethod {
    /// Sliding window, step = size - overlap; full coverage, arbitrary cuts
    FixedSize,
    /// Greedy accumulation of blank-line-delimited paragraphs
    Paragraph,
    /// Greedy accumulation of punctuation-delimited sentences
    Sentence,
    /// Breakpoints at structural markers (headings, legal sections)
    Semantic,
    /// Split on the first separator, recurse with the rest; fixed-size
    /// fallback
    Recursive,
}

/// Chunking configuration for one source category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub method: ChunkingMethod,
    /// Maximum chunk size in bytes
    pub chunk_size: usize,
    /// Overlap seeded into the next chunk in bytes
    pub chunk_overlap: usize,
    /// Extra breakpoints for semantic, separator priority for recursive
    #[serde(default)]
    pub separators: Option<Vec<String>>,
}

impl ChunkingConfig {
    pub fn new(method: ChunkingMethod, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            method,
            chunk_size,
            chunk_overlap,
            separators: None,
        }
    }

    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = Some(separators);
        self
    }

    /// Default configuration per source category.
    ///
    /// Uploaded documents get recursive splitting; leases follow their legal
    /// article structure; record cards are short and split on paragraphs;
    /// KPI reports use small fixed windows.
    pub fn default_for(source_type: SourceType) -> Self {
        match source_type {
            SourceType::Documents => {
                Self::new(ChunkingMethod::Recursive, 512, 50).with_separators(vec![
                    "\n\n".into(),
                    "\n".into(),
                    ". ".into(),
                    " ".into(),
                ])
            }
            SourceType::Leases => Self::new(ChunkingMethod::Semantic, 768, 100)
                .with_separators(vec!["\n\nArticle".into(), "\n\nSection".into()]),
            SourceType::Properties | SourceType::Tenants | SourceType::Owners => {
                Self::new(ChunkingMethod::Paragraph, 256, 25)
            }
            SourceType::Kpis => Self::new(ChunkingMethod::FixedSize, 128, 0),
        }
    }
}

/// Split text into ordered, offset-tracked spans per the configured strategy
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextSpan> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    match config.method {
        ChunkingMethod::FixedSize => chunk_fixed_size(text, config.chunk_size, config.chunk_overlap),
        ChunkingMethod::Paragraph => chunk_paragraph(text, config.chunk_size, config.chunk_overlap),
        ChunkingMethod::Sentence => chunk_sentence(text, config.chunk_size, config.chunk_overlap),
        ChunkingMethod::Semantic => chunk_semantic(
            text,
            config.chunk_size,
            config.chunk_overlap,
            config.separators.as_deref(),
        ),
        ChunkingMethod::Recursive => chunk_recursive(
            text,
            config.chunk_size,
            config.chunk_overlap,
            config.separators.as_deref(),
        ),
    }
}

/// Snap a byte index down to the nearest char boundary
fn floor_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Snap a byte index up to the nearest char boundary
fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

// ---------------------------------------------------------------------------
// fixed_size
// ---------------------------------------------------------------------------

fn chunk_fixed_size(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextSpan> {
    let chunk_size = chunk_size.max(1);
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let end = ceil_boundary(text, start + chunk_size);
        let window = &text[start..end];
        if !window.trim().is_empty() {
            chunks.push(TextSpan {
                content: window.to_string(),
                start_offset: start,
                end_offset: end,
            });
        }
        if end >= text.len() {
            break;
        }
        start = ceil_boundary(text, start + step);
    }

    chunks
}

// ---------------------------------------------------------------------------
// Shared overflow/overlap rule
// ---------------------------------------------------------------------------

/// One pre-segmented piece of the source text
struct Segment<'a> {
    text: &'a str,
    start: usize,
}

/// Greedily accumulate segments into spans of at most `max_size` bytes.
///
/// On overflow the current buffer is emitted and the next buffer is seeded
/// with its last `overlap` bytes. `joiner` sits between accumulated
/// segments ("\n\n" for paragraphs, "" for segments that already carry
/// their separators). This is the one place the overflow/overlap rule
/// lives.
fn accumulate(
    text: &str,
    segments: Vec<Segment<'_>>,
    max_size: usize,
    overlap: usize,
    joiner: &str,
) -> Vec<TextSpan> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_start = 0usize;

    for segment in segments {
        if !buffer.is_empty() && buffer.len() + joiner.len() + segment.text.len() > max_size {
            push_trimmed(&mut chunks, &buffer, buffer_start, segment.start);

            let overlap_text = overlap_suffix(&buffer, overlap);
            buffer_start = segment.start.saturating_sub(overlap_text.len());
            buffer = if overlap_text.is_empty() {
                segment.text.to_string()
            } else {
                format!("{}{}{}", overlap_text, joiner, segment.text)
            };
        } else if buffer.is_empty() {
            buffer_start = segment.start;
            buffer.push_str(segment.text);
        } else {
            buffer.push_str(joiner);
            buffer.push_str(segment.text);
        }
    }

    push_trimmed(&mut chunks, &buffer, buffer_start, text.len());
    chunks
}

fn push_trimmed(chunks: &mut Vec<TextSpan>, buffer: &str, start: usize, end: usize) {
    let content = buffer.trim();
    if !content.is_empty() {
        chunks.push(TextSpan {
            content: content.to_string(),
            start_offset: start,
            end_offset: end,
        });
    }
}

/// Last `overlap` bytes of the buffer, snapped to a char boundary
fn overlap_suffix(buffer: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    if buffer.len() <= overlap {
        return buffer.to_string();
    }
    let start = ceil_boundary(buffer, buffer.len() - overlap);
    buffer[start..].to_string()
}

// ---------------------------------------------------------------------------
// paragraph / sentence / semantic segmentation
// ---------------------------------------------------------------------------

fn chunk_paragraph(text: &str, max_size: usize, overlap: usize) -> Vec<TextSpan> {
    let mut segments = Vec::new();
    let mut offset = 0usize;
    for paragraph in text.split("\n\n") {
        let trimmed = paragraph.trim();
        if !trimmed.is_empty() {
            let inner = offset + (paragraph.len() - paragraph.trim_start().len());
            segments.push(Segment {
                text: trimmed,
                start: inner,
            });
        }
        offset += paragraph.len() + 2;
    }
    accumulate(text, segments, max_size, overlap, "\n\n")
}

fn sentence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?]*[.!?]+\s*").expect("valid sentence regex"))
}

fn chunk_sentence(text: &str, max_size: usize, overlap: usize) -> Vec<TextSpan> {
    let mut segments = Vec::new();
    let mut last_end = 0usize;
    for m in sentence_regex().find_iter(text) {
        segments.push(Segment {
            text: m.as_str(),
            start: m.start(),
        });
        last_end = m.end();
    }
    // Trailing unterminated text is a final pseudo-sentence
    if last_end < text.len() && !text[last_end..].trim().is_empty() {
        segments.push(Segment {
            text: &text[last_end..],
            start: last_end,
        });
    }
    accumulate(text, segments, max_size, overlap, "")
}

fn section_regexes() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?m)^#{1,6}\s+.+$",
            r"(?mi)^Article\s+\d+",
            r"(?mi)^Chapter\s+\d+",
            r"(?mi)^Section\s+\d+",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid section regex"))
        .collect()
    })
}

fn chunk_semantic(
    text: &str,
    max_size: usize,
    overlap: usize,
    separators: Option<&[String]>,
) -> Vec<TextSpan> {
    let mut split_points = vec![0usize];

    for re in section_regexes() {
        for m in re.find_iter(text) {
            split_points.push(m.start());
        }
    }
    if let Some(seps) = separators {
        for sep in seps {
            if sep.is_empty() {
                continue;
            }
            let mut from = 0;
            while let Some(pos) = text[from..].find(sep.as_str()) {
                split_points.push(from + pos);
                from += pos + sep.len();
            }
        }
    }

    split_points.sort_unstable();
    split_points.dedup();
    split_points.push(text.len());

    let mut segments = Vec::new();
    for window in split_points.windows(2) {
        let (start, end) = (floor_boundary(text, window[0]), floor_boundary(text, window[1]));
        if start < end {
            segments.push(Segment {
                text: &text[start..end],
                start,
            });
        }
    }
    accumulate(text, segments, max_size, overlap, "")
}

// ---------------------------------------------------------------------------
// recursive
// ---------------------------------------------------------------------------

const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", ", ", " "];

fn chunk_recursive(
    text: &str,
    max_size: usize,
    overlap: usize,
    separators: Option<&[String]>,
) -> Vec<TextSpan> {
    let owned: Vec<String> = separators
        .map(|s| s.to_vec())
        .unwrap_or_else(|| DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect());
    let seps: Vec<&str> = owned.iter().map(String::as_str).collect();

    split_recursive(text, &seps, 0, max_size, overlap)
        .into_iter()
        .filter(|c| !c.content.is_empty())
        .collect()
}

/// Split on the first separator; any accumulated piece still over the limit
/// recurses with the remaining separator list. The terminal fallback is the
/// fixed-size window (the only level where `overlap` applies).
fn split_recursive(
    text: &str,
    seps: &[&str],
    offset: usize,
    max_size: usize,
    overlap: usize,
) -> Vec<TextSpan> {
    if text.len() <= max_size {
        let content = text.trim();
        if content.is_empty() {
            return Vec::new();
        }
        return vec![TextSpan {
            content: content.to_string(),
            start_offset: offset,
            end_offset: offset + text.len(),
        }];
    }

    let Some((&sep, rest)) = seps.split_first() else {
        return chunk_fixed_size(text, max_size, overlap)
            .into_iter()
            .map(|mut span| {
                span.start_offset += offset;
                span.end_offset += offset;
                span
            })
            .collect();
    };

    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_start = offset;
    let mut pos = offset;

    for part in text.split(sep) {
        let part_start = pos;
        pos += part.len() + sep.len();

        if buffer.is_empty() {
            buffer_start = part_start;
            buffer = part.to_string();
        } else if buffer.len() + sep.len() + part.len() > max_size {
            if buffer.len() <= max_size {
                push_trimmed(&mut chunks, &buffer, buffer_start, buffer_start + buffer.len());
            } else {
                chunks.extend(split_recursive(&buffer, rest, buffer_start, max_size, overlap));
            }
            buffer_start = part_start;
            buffer = part.to_string();
        } else {
            buffer.push_str(sep);
            buffer.push_str(part);
        }
    }

    if !buffer.trim().is_empty() {
        if buffer.len() <= max_size {
            push_trimmed(&mut chunks, &buffer, buffer_start, offset + text.len());
        } else {
            chunks.extend(split_recursive(&buffer, rest, buffer_start, max_size, overlap));
        }
    }

    chunks
}

// ---------------------------------------------------------------------------
// semantic tags
// ---------------------------------------------------------------------------

fn tag_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            ("rent", r"(?i)\brent\b|monthly payment"),
            ("charges", r"(?i)\bcharges?\b|service charge"),
            ("deposit", r"(?i)\bdeposit\b|guarantee"),
            ("lease", r"(?i)\blease\b|rental (agreement|contract)"),
            ("expiry", r"(?i)\bexpir|end of (the )?lease|termination date"),
            ("works", r"(?i)\bworks\b|renovation|repair"),
            ("notice", r"(?i)\bnotice\b|termination"),
            ("indexation", r"(?i)\bindexation\b|rent review|revision"),
            ("landlord", r"(?i)\blandlord\b|\bowner\b|lessor"),
            ("tenant", r"(?i)\btenant\b|lessee"),
            ("surface", r"(?i)\bsurface\b|m[²2]|square met"),
            ("diagnostics", r"(?i)\bdiagnostic|energy (rating|performance)|asbestos"),
            ("insurance", r"(?i)\binsurance\b|coverage"),
            ("payment", r"(?i)\binvoice\b|payment|transfer|\bamount\b"),
        ]
        .into_iter()
        .map(|(tag, pattern)| (tag, Regex::new(pattern).expect("valid tag regex")))
        .collect()
    })
}

fn amount_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\d+[\s,.]?\d*\s*[€$]|\d+\s*euros?").expect("valid regex"))
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}|\d{4}-\d{2}-\d{2}").expect("valid regex"))
}

/// Extract semantic tags from chunk content. The source-type token is
/// always present.
pub fn extract_semantic_tags(text: &str, source_type: SourceType) -> Vec<String> {
    let mut tags = vec![source_type.as_str().to_string()];

    for (tag, re) in tag_patterns() {
        if re.is_match(text) {
            tags.push((*tag).to_string());
        }
    }
    if amount_regex().is_match(text) {
        tags.push("amount".to_string());
    }
    if date_regex().is_match(text) {
        tags.push("date".to_string());
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans_are_ordered(spans: &[TextSpan]) {
        for pair in spans.windows(2) {
            assert!(pair[0].start_offset <= pair[1].start_offset, "offsets not monotonic");
        }
    }

    #[test]
    fn fixed_size_offsets_reconstruct_source() {
        let text = "abcdefghij".repeat(20); // 200 bytes
        let spans = chunk_text(&text, &ChunkingConfig::new(ChunkingMethod::FixedSize, 50, 10));

        // Windows cover every byte; reconstruct via offsets.
        let mut rebuilt = vec![0u8; text.len()];
        let mut covered = vec![false; text.len()];
        for span in &spans {
            assert_eq!(&text[span.start_offset..span.end_offset], span.content);
            rebuilt[span.start_offset..span.end_offset]
                .copy_from_slice(span.content.as_bytes());
            covered[span.start_offset..span.end_offset].fill(true);
        }
        assert!(covered.iter().all(|&c| c));
        assert_eq!(String::from_utf8(rebuilt).unwrap(), text);
        spans_are_ordered(&spans);
    }

    #[test]
    fn fixed_size_respects_char_boundaries() {
        let text = "héllo wörld à çôté ".repeat(30);
        let spans = chunk_text(&text, &ChunkingConfig::new(ChunkingMethod::FixedSize, 40, 8));
        for span in &spans {
            assert!(text.is_char_boundary(span.start_offset));
            assert!(text.is_char_boundary(span.end_offset));
        }
    }

    #[test]
    fn fixed_size_short_text_is_single_chunk() {
        let spans = chunk_text("short", &ChunkingConfig::new(ChunkingMethod::FixedSize, 512, 50));
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, "short");
        assert_eq!(spans[0].start_offset, 0);
        assert_eq!(spans[0].end_offset, 5);
    }

    #[test]
    fn paragraph_accumulates_until_overflow() {
        let p1 = "First paragraph with some content.";
        let p2 = "Second paragraph with more content.";
        let p3 = "Third paragraph closing things out.";
        let text = format!("{}\n\n{}\n\n{}", p1, p2, p3);

        // Everything fits in one chunk
        let spans = chunk_text(&text, &ChunkingConfig::new(ChunkingMethod::Paragraph, 1000, 100));
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, text);

        // Force an overflow after each paragraph
        let spans = chunk_text(&text, &ChunkingConfig::new(ChunkingMethod::Paragraph, 40, 10));
        assert!(spans.len() >= 3);
        assert!(spans[0].content.starts_with(p1));
        spans_are_ordered(&spans);
    }

    #[test]
    fn paragraph_overlap_seeds_next_chunk() {
        let p1 = "A".repeat(80);
        let p2 = "B".repeat(80);
        let text = format!("{}\n\n{}", p1, p2);
        let spans = chunk_text(&text, &ChunkingConfig::new(ChunkingMethod::Paragraph, 100, 20));
        assert_eq!(spans.len(), 2);
        // Second chunk is seeded with the tail of the first
        assert!(spans[1].content.starts_with(&"A".repeat(20)));
        assert!(spans[1].content.ends_with(&"B".repeat(80)));
    }

    #[test]
    fn sentence_keeps_trailing_unterminated_text() {
        let text = "One sentence. Two sentences! Is this three? Trailing fragment without punctuation";
        let spans = chunk_text(&text, &ChunkingConfig::new(ChunkingMethod::Sentence, 30, 5));
        let joined: String = spans.iter().map(|s| s.content.as_str()).collect::<Vec<_>>().join(" ");
        assert!(joined.contains("Trailing fragment without punctuation"));
        spans_are_ordered(&spans);
    }

    #[test]
    fn semantic_breaks_on_section_markers() {
        let text = format!(
            "Preamble text before any section.\n\nArticle 1\n{}\n\nArticle 2\n{}",
            "Lease obligations described here. ".repeat(10),
            "Termination conditions described here. ".repeat(10),
        );
        // Zero overlap so each emitted chunk starts exactly at a marker
        let spans = chunk_text(&text, &ChunkingConfig::new(ChunkingMethod::Semantic, 300, 0));
        assert!(spans.len() >= 3);
        assert!(spans[0].content.starts_with("Preamble"));
        assert!(spans.iter().filter(|s| s.content.starts_with("Article")).count() >= 2);
        spans_are_ordered(&spans);
    }

    #[test]
    fn recursive_falls_back_through_separators() {
        // No paragraph breaks: must recurse to "\n" then ". " then spaces
        let text = "word ".repeat(300); // 1500 bytes, only space separators
        let config = ChunkingConfig::new(ChunkingMethod::Recursive, 200, 20).with_separators(vec![
            "\n\n".into(),
            "\n".into(),
            ". ".into(),
            " ".into(),
        ]);
        let spans = chunk_text(&text, &config);
        assert!(spans.len() > 1);
        for span in &spans {
            assert!(span.content.len() <= 200, "chunk exceeds max size");
        }
        spans_are_ordered(&spans);
    }

    #[test]
    fn recursive_small_input_is_single_chunk() {
        let spans = chunk_text(
            "Small input.",
            &ChunkingConfig::default_for(SourceType::Documents),
        );
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, "Small input.");
    }

    #[test]
    fn all_strategies_drop_whitespace_only_chunks() {
        for method in [
            ChunkingMethod::FixedSize,
            ChunkingMethod::Paragraph,
            ChunkingMethod::Sentence,
            ChunkingMethod::Semantic,
            ChunkingMethod::Recursive,
        ] {
            let spans = chunk_text("   \n\n   \n  ", &ChunkingConfig::new(method, 64, 8));
            assert!(spans.is_empty(), "{:?} produced chunks from whitespace", method);
        }
    }

    #[test]
    fn paragraph_chunks_reconstruct_after_overlap_dedup() {
        // paragraph(1000, 100) chunks, de-duplicated for overlap,
        // concatenate back to the source text.
        let paragraphs: Vec<String> = (0..12)
            .map(|i| format!("Paragraph {} body {}", i, "content ".repeat(40)).trim().to_string())
            .collect();
        let text = paragraphs.join("\n\n");
        let spans = chunk_text(&text, &ChunkingConfig::new(ChunkingMethod::Paragraph, 1000, 100));
        assert!(spans.len() > 1);

        let mut rebuilt = spans[0].content.clone();
        for span in &spans[1..] {
            // Strip the longest prefix of this chunk that is already a
            // suffix of the accumulated text (the seeded overlap).
            let mut matched = 0;
            for cut in (1..=span.content.len().min(rebuilt.len())).rev() {
                if !span.content.is_char_boundary(cut) {
                    continue;
                }
                if rebuilt.ends_with(&span.content[..cut]) {
                    matched = cut;
                    break;
                }
            }
            rebuilt.push_str("\n\n");
            rebuilt.push_str(span.content[matched..].trim_start());
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn semantic_tags_include_source_type_and_matches() {
        let tags = extract_semantic_tags(
            "The monthly rent is 1,500€ and the deposit equals one month.",
            SourceType::Leases,
        );
        assert!(tags.contains(&"leases".to_string()));
        assert!(tags.contains(&"rent".to_string()));
        assert!(tags.contains(&"deposit".to_string()));
        assert!(tags.contains(&"amount".to_string()));
    }

    #[test]
    fn default_configs_match_per_source_policy() {
        let doc = ChunkingConfig::default_for(SourceType::Documents);
        assert_eq!(doc.method, ChunkingMethod::Recursive);
        assert_eq!((doc.chunk_size, doc.chunk_overlap), (512, 50));

        let lease = ChunkingConfig::default_for(SourceType::Leases);
        assert_eq!(lease.method, ChunkingMethod::Semantic);
        assert_eq!((lease.chunk_size, lease.chunk_overlap), (768, 100));

        let kpi = ChunkingConfig::default_for(SourceType::Kpis);
        assert_eq!(kpi.method, ChunkingMethod::FixedSize);
        assert_eq!((kpi.chunk_size, kpi.chunk_overlap), (128, 0));
    }
}
