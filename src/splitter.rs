//! Recursive, overlap-aware text splitter.
//!
//! Splits raw document text into retrieval-sized chunks. Splitting walks a
//! separator hierarchy from coarse to fine (paragraph breaks, line breaks,
//! sentence breaks, words, single characters), re-splitting any piece that
//! still exceeds `chunk_size`, then merges adjacent pieces greedily up to
//! `chunk_size` and carries up to `overlap` characters of trailing pieces
//! into the next chunk. Because the overlap window is rebuilt from whole
//! pieces, it never cuts inside a separator boundary that exists within it.
//!
//! All lengths are measured in chars, so multi-byte text never splits
//! inside a code point. Output is fully deterministic.

use std::collections::VecDeque;

use crate::error::{Error, Result};

/// Separator hierarchy, coarsest first. When none of these occurs in a
/// piece, splitting falls back to single characters.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    chunk_size: usize,
    overlap: usize,
}

impl Splitter {
    /// Create a splitter. `chunk_size` must be positive and `overlap`
    /// strictly smaller than `chunk_size`; degenerate parameters are
    /// rejected before any splitting happens.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk_size must be > 0".into(),
            ));
        }
        if overlap >= chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Split `text` into non-empty chunks of at most `chunk_size` chars.
    ///
    /// Empty input yields an empty sequence; input no longer than
    /// `chunk_size` yields exactly one chunk equal to the full text.
    /// The per-character fallback means even a single token longer than
    /// `chunk_size` is cut down to size rather than emitted oversized.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if char_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }
        let pieces = split_recursive(text, self.chunk_size, &SEPARATORS);
        self.merge(pieces)
    }

    /// Greedily pack length-bounded pieces into chunks. On flush, trailing
    /// pieces totalling at most `overlap` chars are kept as the head of
    /// the next chunk.
    fn merge(&self, pieces: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<String> = VecDeque::new();
        let mut window_len = 0usize;

        for piece in pieces {
            let piece_len = char_len(&piece);
            if window_len + piece_len > self.chunk_size && !window.is_empty() {
                flush(&mut chunks, &window);
                while window_len > self.overlap
                    || (window_len + piece_len > self.chunk_size && window_len > 0)
                {
                    // Window is non-empty whenever window_len > 0.
                    let dropped = window.pop_front().unwrap_or_default();
                    window_len -= char_len(&dropped);
                }
            }
            window_len += piece_len;
            window.push_back(piece);
        }
        if !window.is_empty() {
            flush(&mut chunks, &window);
        }
        chunks
    }
}

/// Join the window into one chunk, trimmed at the edges. Whitespace-only
/// windows produce nothing.
fn flush(chunks: &mut Vec<String>, window: &VecDeque<String>) {
    let joined: String = window.iter().map(String::as_str).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split on the coarsest separator present, recursively re-splitting any
/// piece still longer than `chunk_size` with the finer separators.
/// Separators stay attached to the end of the preceding piece so the
/// original text can be reassembled by plain concatenation.
fn split_recursive(text: &str, chunk_size: usize, separators: &[&str]) -> Vec<String> {
    let chosen = separators
        .iter()
        .position(|sep| text.contains(sep));

    let mut pieces = Vec::new();
    match chosen {
        Some(i) => {
            for piece in text.split_inclusive(separators[i]) {
                if piece.is_empty() {
                    continue;
                }
                if char_len(piece) <= chunk_size {
                    pieces.push(piece.to_string());
                } else {
                    pieces.extend(split_recursive(piece, chunk_size, &separators[i + 1..]));
                }
            }
        }
        None => {
            // Single-character fallback: merged chunks can never exceed
            // chunk_size from here.
            pieces.extend(text.chars().map(String::from));
        }
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
