use crate::error::{RagError, Result};
use log::{debug, warn};
use std::ops::Range;
use tiktoken_rs::CoreBPE;

/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The actual text content of this chunk, an exact substring of the document
    pub text: String,
    /// Token count for this chunk
    pub token_count: usize,
    /// Source identifier of the document this chunk belongs to
    pub document_id: String,
    /// Position of this chunk within its document
    pub index: usize,
    /// Starting byte offset of this chunk in the original document
    pub start_position: usize,
}

/// Settings for splitting a document into chunks
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkingConfig {
    /// Text that separates the units the splitter prefers to break on
    pub separator: String,
    /// Target maximum number of tokens per chunk
    pub chunk_size: usize,
    /// Number of tokens shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        ChunkingConfig {
            separator: "\n".to_string(),
            chunk_size: 600,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(RagError::Config("chunk separator must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits text into model tokens, reported as byte ranges into the input
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Range<usize>>;
}

/// Treats every run of alphanumeric characters as one token and every other
/// non-whitespace character as a token of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        let mut word_start: Option<usize> = None;

        for (i, c) in text.char_indices() {
            if c.is_alphanumeric() {
                word_start.get_or_insert(i);
                continue;
            }
            if let Some(start) = word_start.take() {
                spans.push(start..i);
            }
            if !c.is_whitespace() {
                spans.push(i..i + c.len_utf8());
            }
        }

        if let Some(start) = word_start {
            spans.push(start..text.len());
        }

        spans
    }
}

/// Byte-pair encoding used by the OpenAI chat models (`cl100k_base`)
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| RagError::Config(format!("Failed to load cl100k_base: {}", e)))?;
        Ok(TiktokenTokenizer { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Range<usize>> {
        let ids = self.bpe.encode_ordinary(text);
        let mut spans = Vec::with_capacity(ids.len());
        let mut position = 0;
        let mut pending = Vec::new();

        // A multi-byte character can be split over several tokens; those
        // tokens share the span of the characters they decode to together
        for id in ids {
            pending.push(id);
            let piece = match self.bpe.decode(pending.clone()) {
                Ok(piece) => piece,
                Err(_) => continue,
            };
            let end = if text[position..].starts_with(piece.as_str()) {
                position + piece.len()
            } else {
                position
            };
            for _ in pending.drain(..) {
                spans.push(position..end);
            }
            position = end;
        }

        for _ in pending.drain(..) {
            spans.push(position..text.len());
        }

        spans
    }
}

/// Model tokenizer when available, word counting otherwise
pub fn default_tokenizer() -> Box<dyn Tokenizer> {
    match TiktokenTokenizer::cl100k() {
        Ok(tokenizer) => Box::new(tokenizer),
        Err(e) => {
            warn!("{}; counting words instead of model tokens", e);
            Box::new(WordTokenizer)
        }
    }
}

/// Rough token count of a text, one per word or punctuation mark
pub fn estimate_token_count(text: &str) -> usize {
    WordTokenizer.tokenize(text).len()
}

/// Split text into overlapping chunks of at most `chunk_size` tokens.
///
/// The text is first broken on the separator; whole units are then merged
/// until the next one would not fit. Each new chunk starts with the last
/// `chunk_overlap` tokens of the chunk before it. When that carry plus the
/// next unit is still too long, the unit is cut at a token boundary. A unit
/// that is longer than `chunk_size` on its own is emitted as a single
/// oversized chunk.
pub fn split_into_chunks(
    text: &str,
    document_id: &str,
    config: &ChunkingConfig,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<TextChunk>> {
    config.validate()?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let spans = tokenizer.tokenize(text);
    let units = group_into_units(text, &spans, &config.separator);

    let size = config.chunk_size;
    let overlap = config.chunk_overlap;
    let mut chunks = Vec::new();
    // Token range of the chunk being built
    let mut start = 0;
    let mut end = 0;

    for unit in units {
        if unit.len() > size {
            if end > start {
                chunks.push(make_chunk(text, &spans, start..end, document_id, chunks.len()));
            }
            start = unit.start;
            end = unit.end;
            continue;
        }

        if end > start && unit.end - start > size {
            chunks.push(make_chunk(text, &spans, start..end, document_id, chunks.len()));
            start = end - overlap.min(end - start);
        }

        while unit.end - start > size {
            end = start + size;
            chunks.push(make_chunk(text, &spans, start..end, document_id, chunks.len()));
            start = end - overlap;
        }

        end = unit.end;
    }

    if end > start {
        chunks.push(make_chunk(text, &spans, start..end, document_id, chunks.len()));
    }

    debug!(
        "Split {} tokens from {} into {} chunks",
        spans.len(),
        document_id,
        chunks.len()
    );

    Ok(chunks)
}

/// Group token indices into separator-delimited units. A token belongs to the
/// unit in which it starts; whitespace-only tokens stay with the unit before
/// them, so no unit is made of whitespace alone.
fn group_into_units(text: &str, spans: &[Range<usize>], separator: &str) -> Vec<Range<usize>> {
    let breaks: Vec<usize> = text
        .match_indices(separator)
        .map(|(i, sep)| i + sep.len())
        .collect();

    let mut units: Vec<Range<usize>> = Vec::new();
    let mut current_unit = usize::MAX;
    let mut next_break = 0;

    for (token, span) in spans.iter().enumerate() {
        while next_break < breaks.len() && breaks[next_break] <= span.start {
            next_break += 1;
        }
        let blank = text[span.clone()].trim().is_empty();

        match units.last_mut() {
            Some(unit) if blank || next_break == current_unit => unit.end = token + 1,
            _ => {
                current_unit = next_break;
                units.push(token..token + 1);
            }
        }
    }

    units
}

fn make_chunk(
    text: &str,
    spans: &[Range<usize>],
    tokens: Range<usize>,
    document_id: &str,
    index: usize,
) -> TextChunk {
    let start_position = spans[tokens.start].start;
    let end_position = spans[tokens.end - 1].end;

    TextChunk {
        text: text[start_position..end_position].to_string(),
        token_count: tokens.len(),
        document_id: document_id.to_string(),
        index,
        start_position,
    }
}
