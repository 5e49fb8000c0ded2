//! Document chunking strategies.
//!
//! Extracted document text is cut into retrievable units by a
//! [`ChunkingStrategy`]. The [`Chunker`] inspects the text and picks the first
//! registered strategy whose [`applies_to`](ChunkingStrategy::applies_to)
//! returns true, falling back to a fixed-size window otherwise.
//!
//! Two strategies ship by default:
//!
//! - **[`StructuralSplit`]**: for legal/regulatory texts. Selected when the
//!   marker word (`artículo`) appears more than `structural_threshold` times.
//!   Cuts at `ARTÍCULO <n>` / `CAPÍTULO <roman>` headings, each heading staying
//!   attached to the text that follows it.
//! - **[`SlidingWindow`]**: for unstructured prose. Fixed windows of
//!   `window_chars` characters overlapping by `overlap_chars`.
//!
//! Every raw chunk is then normalized ([`normalize_chunk`]) and dropped if it
//! is shorter than `min_chunk_chars`.
//!
//! # Example
//!
//! ```rust
//! use opsdesk_core::chunk::{Chunker, ChunkingOptions};
//!
//! let chunker = Chunker::new(&ChunkingOptions::default());
//! let text = "Plain prose about safety procedures underground. ".repeat(40);
//! let out = chunker.chunk(&text);
//! assert_eq!(out.strategy, "sliding_window");
//! assert!(out.chunks.iter().all(|c| c.chars().count() >= 50));
//! ```

use regex::Regex;
use std::sync::LazyLock;

/// Article and chapter headings, e.g. `ARTÍCULO 12`, `Capítulo IV`.
static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(ART[ÍI]CULO\s+\d+|CAP[ÍI]TULO\s+[IVX]+)").expect("heading pattern is valid")
});

/// Tuning knobs for the built-in strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkingOptions {
    /// Window length for [`SlidingWindow`], in characters.
    pub window_chars: usize,
    /// Characters shared by consecutive windows.
    pub overlap_chars: usize,
    /// Chunks shorter than this after normalization are discarded.
    pub min_chunk_chars: usize,
    /// Word whose frequency marks a document as structured (matched lowercase).
    pub structural_marker: String,
    /// The marker must appear strictly more often than this.
    pub structural_threshold: usize,
    /// Emit the text before the first heading as its own chunk.
    pub keep_preamble: bool,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            window_chars: 1000,
            overlap_chars: 100,
            min_chunk_chars: 50,
            structural_marker: "artículo".to_string(),
            structural_threshold: 10,
            keep_preamble: false,
        }
    }
}

/// A way of cutting document text into raw chunks.
///
/// Implementations only split; normalization and the minimum-length filter
/// are applied uniformly by the [`Chunker`].
pub trait ChunkingStrategy: Send + Sync {
    /// Stable identifier, stored in chunk metadata.
    fn name(&self) -> &'static str;
    /// Whether this strategy should handle `text`.
    fn applies_to(&self, text: &str) -> bool;
    /// Split `text` into raw (unnormalized) chunks.
    fn split(&self, text: &str) -> Vec<String>;
}

/// Heading-delimited splitting for legal texts.
pub struct StructuralSplit {
    marker: String,
    threshold: usize,
    keep_preamble: bool,
}

impl StructuralSplit {
    pub fn new(marker: &str, threshold: usize, keep_preamble: bool) -> Self {
        Self {
            marker: marker.to_lowercase(),
            threshold,
            keep_preamble,
        }
    }
}

impl ChunkingStrategy for StructuralSplit {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn applies_to(&self, text: &str) -> bool {
        count_marker(text, &self.marker) > self.threshold
    }

    fn split(&self, text: &str) -> Vec<String> {
        let starts: Vec<usize> = HEADING.find_iter(text).map(|m| m.start()).collect();

        let mut out = Vec::with_capacity(starts.len() + 1);
        let first = starts.first().copied().unwrap_or(text.len());
        if self.keep_preamble && first > 0 {
            out.push(text[..first].to_string());
        }

        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            out.push(text[start..end].to_string());
        }
        out
    }
}

/// Fixed-size overlapping windows over the full text.
pub struct SlidingWindow {
    window: usize,
    overlap: usize,
}

impl SlidingWindow {
    pub fn new(window: usize, overlap: usize) -> Self {
        Self {
            window: window.max(1),
            overlap: overlap.min(window.saturating_sub(1)),
        }
    }

    fn step(&self) -> usize {
        self.window - self.overlap
    }
}

impl ChunkingStrategy for SlidingWindow {
    fn name(&self) -> &'static str {
        "sliding_window"
    }

    fn applies_to(&self, _text: &str) -> bool {
        true
    }

    fn split(&self, text: &str) -> Vec<String> {
        // Byte offset of every char boundary, plus the end of the string.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let n_chars = bounds.len() - 1;

        let mut out = Vec::new();
        let mut start = 0;
        while start < n_chars {
            let end = (start + self.window).min(n_chars);
            out.push(text[bounds[start]..bounds[end]].to_string());
            start += self.step();
        }
        out
    }
}

/// Result of chunking one document.
#[derive(Debug, Clone)]
pub struct ChunkedText {
    /// Name of the strategy that produced the chunks.
    pub strategy: &'static str,
    /// Number of raw fragments before normalization and filtering.
    pub raw_count: usize,
    /// Normalized chunks that passed the minimum-length filter.
    pub chunks: Vec<String>,
}

/// Picks a strategy for a document and applies it.
pub struct Chunker {
    strategies: Vec<Box<dyn ChunkingStrategy>>,
    fallback: Box<dyn ChunkingStrategy>,
    min_chunk_chars: usize,
}

impl Chunker {
    /// Chunker with the built-in structural strategy and sliding-window fallback.
    pub fn new(options: &ChunkingOptions) -> Self {
        Self {
            strategies: vec![Box::new(StructuralSplit::new(
                &options.structural_marker,
                options.structural_threshold,
                options.keep_preamble,
            ))],
            fallback: Box::new(SlidingWindow::new(
                options.window_chars,
                options.overlap_chars,
            )),
            min_chunk_chars: options.min_chunk_chars,
        }
    }

    /// Register a strategy that is consulted before the existing ones.
    pub fn with_strategy(mut self, strategy: Box<dyn ChunkingStrategy>) -> Self {
        self.strategies.insert(0, strategy);
        self
    }

    /// The strategy that would handle `text`.
    pub fn select(&self, text: &str) -> &dyn ChunkingStrategy {
        self.strategies
            .iter()
            .find(|s| s.applies_to(text))
            .map(|s| s.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    pub fn chunk(&self, text: &str) -> ChunkedText {
        let strategy = self.select(text);
        let raw = strategy.split(text);
        let raw_count = raw.len();
        let chunks = raw
            .iter()
            .map(|r| normalize_chunk(r))
            .filter(|c| c.chars().count() >= self.min_chunk_chars)
            .collect();

        ChunkedText {
            strategy: strategy.name(),
            raw_count,
            chunks,
        }
    }
}

/// Join extracted pages into one document body.
///
/// Blank pages contribute nothing; each remaining page is followed by a
/// newline. Stray spaces before full stops left by PDF extraction are removed.
pub fn prepare_text<S: AsRef<str>>(pages: &[S]) -> String {
    let mut full = String::new();
    for page in pages {
        let page = page.as_ref();
        if page.is_empty() {
            continue;
        }
        full.push_str(page);
        full.push('\n');
    }
    full.replace(" .", ".")
}

/// Collapse newlines to spaces and trim surrounding whitespace.
pub fn normalize_chunk(raw: &str) -> String {
    raw.replace('\n', " ").trim().to_string()
}

/// Case-insensitive count of non-overlapping `marker` occurrences.
pub fn count_marker(text: &str, marker: &str) -> usize {
    if marker.is_empty() {
        return 0;
    }
    text.to_lowercase().matches(marker).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legal_text(articles: usize) -> String {
        let mut text = String::from("DECRETO 1234 preámbulo que no pertenece a ningún artículo.\n");
        for i in 1..=articles {
            text.push_str(&format!(
                "Artículo {}\nEl titular de la concesión deberá cumplir la obligación número {} establecida.\n",
                i, i
            ));
        }
        text
    }

    #[test]
    fn test_marker_count_is_case_insensitive() {
        assert_eq!(count_marker("ARTÍCULO 1, Artículo 2, artículo 3", "artículo"), 3);
        assert_eq!(count_marker("articulo sin tilde", "artículo"), 0);
    }

    #[test]
    fn test_structural_selected_above_threshold() {
        let chunker = Chunker::new(&ChunkingOptions::default());
        // 15 headings plus the word in the preamble.
        assert_eq!(chunker.select(&legal_text(15)).name(), "structural");
    }

    #[test]
    fn test_sliding_window_at_threshold() {
        let chunker = Chunker::new(&ChunkingOptions::default());
        // Preamble mention + 9 headings = exactly 10 occurrences.
        let text = legal_text(9);
        assert_eq!(count_marker(&text, "artículo"), 10);
        assert_eq!(chunker.select(&text).name(), "sliding_window");
    }

    #[test]
    fn test_structural_chunks_start_at_headings_and_drop_preamble() {
        let chunker = Chunker::new(&ChunkingOptions::default());
        let out = chunker.chunk(&legal_text(15));
        assert_eq!(out.strategy, "structural");
        assert_eq!(out.raw_count, 15);
        assert_eq!(out.chunks.len(), 15);
        for (i, chunk) in out.chunks.iter().enumerate() {
            assert!(
                chunk.starts_with(&format!("Artículo {} ", i + 1)),
                "chunk {} = {:?}",
                i,
                chunk
            );
            assert!(!chunk.contains('\n'));
        }
        assert!(!out.chunks.iter().any(|c| c.contains("DECRETO")));
    }

    #[test]
    fn test_structural_keeps_preamble_when_asked() {
        let options = ChunkingOptions {
            keep_preamble: true,
            ..Default::default()
        };
        let out = Chunker::new(&options).chunk(&legal_text(15));
        assert_eq!(out.chunks.len(), 16);
        assert!(out.chunks[0].starts_with("DECRETO 1234"));
    }

    #[test]
    fn test_structural_splits_on_chapters_too() {
        let split = StructuralSplit::new("artículo", 0, false);
        let parts = split.split("intro CAPÍTULO II texto ARTICULO 7 más texto");
        assert_eq!(parts, vec!["CAPÍTULO II texto ", "ARTICULO 7 más texto"]);
    }

    #[test]
    fn test_structural_without_headings_yields_nothing() {
        let split = StructuralSplit::new("artículo", 0, false);
        assert!(split.split("no headings at all").is_empty());
    }

    #[test]
    fn test_sliding_window_overlap_is_exact() {
        let text: String = (0..2500)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        let windows = SlidingWindow::new(1000, 100).split(&text);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].len(), 1000);
        assert_eq!(windows[1].len(), 1000);
        assert_eq!(windows[2].len(), 700);
        for pair in windows.windows(2) {
            assert_eq!(&pair[0][900..1000], &pair[1][..100]);
        }
    }

    #[test]
    fn test_sliding_window_counts_chars_not_bytes() {
        let text = "ñ".repeat(1500);
        let windows = SlidingWindow::new(1000, 100).split(&text);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].chars().count(), 1000);
        assert_eq!(windows[1].chars().count(), 600);
    }

    #[test]
    fn test_short_chunks_are_dropped() {
        let chunker = Chunker::new(&ChunkingOptions::default());
        // Windows start at 0, 900 and 1800.
        let text = "x".repeat(1830);
        let out = chunker.chunk(&text);
        assert_eq!(out.raw_count, 3);
        // Third window is 30 chars long.
        assert_eq!(out.chunks.len(), 2);
        assert!(out.chunks.iter().all(|c| c.chars().count() >= 50));
    }

    #[test]
    fn test_normalize_collapses_newlines() {
        assert_eq!(normalize_chunk("\n Línea uno\nlínea dos \n"), "Línea uno línea dos");
    }

    #[test]
    fn test_prepare_text_skips_blank_pages() {
        let pages = vec!["uno .".to_string(), String::new(), "dos".to_string()];
        assert_eq!(prepare_text(&pages), "uno.\ndos\n");
    }

    struct FaqStrategy;

    impl ChunkingStrategy for FaqStrategy {
        fn name(&self) -> &'static str {
            "faq"
        }
        fn applies_to(&self, text: &str) -> bool {
            text.starts_with("FAQ")
        }
        fn split(&self, text: &str) -> Vec<String> {
            text.split("Q:").map(|s| s.to_string()).collect()
        }
    }

    #[test]
    fn test_registered_strategy_takes_precedence() {
        let chunker = Chunker::new(&ChunkingOptions::default()).with_strategy(Box::new(FaqStrategy));
        let text = format!(
            "FAQ Q:{} Q:{}",
            "How are royalties computed for small-scale operators?",
            "Which licence covers exploration and exploitation together?"
        );
        let out = chunker.chunk(&text);
        assert_eq!(out.strategy, "faq");
        assert_eq!(out.chunks.len(), 2);
    }
}
