use crate::config::SplitterConfig;
use crate::error::Result;
use std::ops::Range;

/// Hierarchical text splitter with exact character overlap
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    /// Create a new splitter, rejecting invalid configurations up front
    pub fn new(config: SplitterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split text into chunks of at most `chunk_size` characters.
    ///
    /// Each chunk starts with the last `overlap` characters of its predecessor, so
    /// dropping those prefixes and concatenating yields the input again. Windows
    /// holding nothing but whitespace are skipped, which is the only place that
    /// reassembly loses text. Empty or whitespace-only input produces no chunks.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        let chunks: Vec<String> = self
            .spans(text)
            .into_iter()
            .map(|span| text[span].to_string())
            .collect();
        log::debug!(
            "Split {} bytes into {} chunks (chunk_size {}, overlap {})",
            text.len(),
            chunks.len(),
            self.config.chunk_size,
            self.config.overlap
        );
        chunks
    }

    /// Byte ranges of each chunk within `text`, blank windows left out
    #[must_use]
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // offsets[i] is the byte offset of character i; the final entry is text.len()
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;
        let size = self.config.chunk_size;
        let overlap = self.config.overlap;

        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            if total - start <= size {
                push_unless_blank(&mut spans, text, offsets[start]..offsets[total]);
                break;
            }

            // The cut must leave more than `overlap` characters behind so the next
            // chunk starts strictly later than this one.
            let end = self.find_cut(text, &offsets, start + overlap + 1, start + size);
            push_unless_blank(&mut spans, text, offsets[start]..offsets[end]);
            start = end - overlap;
        }
        spans
    }

    /// Last admissible cut in `[lo, hi]` at the coarsest separator available,
    /// falling back to `hi` (a raw character boundary).
    fn find_cut(&self, text: &str, offsets: &[usize], lo: usize, hi: usize) -> usize {
        for separator in &self.config.separators {
            for cut in (lo..=hi).rev() {
                if text[offsets[cut]..].starts_with(separator.as_str()) {
                    return cut;
                }
            }
        }
        hi
    }
}

fn push_unless_blank(spans: &mut Vec<Range<usize>>, text: &str, span: Range<usize>) {
    if !text[span.clone()].trim().is_empty() {
        spans.push(span);
    }
}

/// Split `text` with the default separator hierarchy
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let splitter = TextSplitter::new(SplitterConfig::new(chunk_size, overlap))?;
    Ok(splitter.split(text))
}
