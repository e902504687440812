use crate::error::IngestError;
use crate::tokens::TokenCounter;

pub const DEFAULT_CHUNK_TOKENS: usize = 512;
pub const DEFAULT_OVERLAP_TOKENS: usize = 50;

/// Split order: paragraphs, then sentence ends, then single words. A piece
/// still over budget after all levels is cut into raw character windows.
const SEPARATORS: &[&str] = &["\n\n", ". ", "! ", "? ", " "];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_CHUNK_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
        }
    }
}

/// Splits extracted document text into ordered, token-bounded windows with
/// a token overlap carried between consecutive windows.
#[derive(Clone)]
pub struct TextChunker {
    counter: TokenCounter,
    config: ChunkingConfig,
}

struct Segment {
    text: String,
    tokens: usize,
}

impl TextChunker {
    pub fn new(counter: TokenCounter, config: ChunkingConfig) -> Result<Self, IngestError> {
        if config.max_tokens == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_tokens must be positive".to_string(),
            ));
        }
        if config.overlap_tokens >= config.max_tokens {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap_tokens {} must be smaller than max_tokens {}",
                config.overlap_tokens, config.max_tokens
            )));
        }

        Ok(Self { counter, config })
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Empty or whitespace-only input yields zero chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let segments = self.split_segments(text, SEPARATORS);
        self.merge_segments(segments)
    }

    fn segment(&self, text: &str) -> Segment {
        Segment {
            text: text.to_string(),
            tokens: self.counter.count(text),
        }
    }

    /// Breaks `text` into pieces that each fit the token budget, trying the
    /// separators in order and keeping every separator attached to the
    /// preceding piece so that concatenation reproduces the input exactly.
    fn split_segments(&self, text: &str, separators: &[&str]) -> Vec<Segment> {
        if self.counter.count(text) <= self.config.max_tokens {
            return vec![self.segment(text)];
        }

        let Some((separator, remaining)) = separators.split_first() else {
            return self.split_by_chars(text);
        };

        let pieces = split_keeping_separator(text, separator);
        if pieces.len() <= 1 {
            return self.split_segments(text, remaining);
        }

        pieces
            .into_iter()
            .flat_map(|piece| self.split_segments(piece, remaining))
            .collect()
    }

    /// Last-resort split for a single piece with no separators left, e.g. a
    /// run of text with no whitespace at all.
    fn split_by_chars(&self, text: &str) -> Vec<Segment> {
        let chars: Vec<char> = text.chars().collect();
        let mut segments = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let mut end = (start + self.config.max_tokens).min(chars.len());
            loop {
                let piece: String = chars[start..end].iter().collect();
                if end - start <= 1 || self.counter.count(&piece) <= self.config.max_tokens {
                    segments.push(self.segment(&piece));
                    break;
                }
                end = start + (end - start) / 2;
            }
            start = end;
        }

        segments
    }

    fn merge_segments(&self, segments: Vec<Segment>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: Vec<Segment> = Vec::new();
        let mut window_tokens = 0usize;

        for segment in segments {
            if !window.is_empty() && window_tokens + segment.tokens > self.config.max_tokens {
                self.push_window(&mut chunks, &window);

                let mut carried = self.carry_overlap(window);
                // Shrink the carried tail until the new segment fits.
                while !carried.is_empty() {
                    let carried_tokens: usize = carried.iter().map(|piece| piece.tokens).sum();
                    if carried_tokens + segment.tokens <= self.config.max_tokens {
                        break;
                    }
                    carried.remove(0);
                }

                window = carried;
                window_tokens = window.iter().map(|piece| piece.tokens).sum();
            }

            window_tokens += segment.tokens;
            window.push(segment);
        }

        if !window.is_empty() {
            self.push_window(&mut chunks, &window);
        }

        chunks
    }

    /// Smallest tail of the emitted window whose concatenated text counts at
    /// least `overlap_tokens`. Counted on the joined text; per-piece counts
    /// do not add up exactly across a join.
    fn carry_overlap(&self, mut window: Vec<Segment>) -> Vec<Segment> {
        if self.config.overlap_tokens == 0 {
            return Vec::new();
        }

        let mut shared = String::new();
        let mut start = window.len();
        while start > 0 {
            shared.insert_str(0, &window[start - 1].text);
            start -= 1;
            if self.counter.count(&shared) >= self.config.overlap_tokens {
                break;
            }
        }

        window.split_off(start)
    }

    fn push_window(&self, chunks: &mut Vec<String>, window: &[Segment]) {
        let text: String = window.iter().map(|piece| piece.text.as_str()).collect();
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
    }
}

/// Splits at `separator`, keeping the separator attached to the preceding
/// piece. Pieces are never empty and concatenate back to `text`.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    while let Some(position) = text[start..].find(separator) {
        let end = start + position + separator.len();
        pieces.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}
