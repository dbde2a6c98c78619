//! Sliding-window text chunker.
//!
//! Splits unit text into overlapping, fixed-size character windows that
//! are embedded and retrieved independently.
//!
//! # Algorithm
//!
//! 1. Start a window at character offset 0.
//! 2. Take up to `chunk_size` characters and trim surrounding whitespace.
//! 3. Keep the window if anything is left after trimming.
//! 4. Advance by `max(1, chunk_size - overlap)` characters.
//! 5. Stop once the window start passes the end of the text.
//!
//! Sizes are counted in Unicode scalar values, not bytes or tokens, so a
//! boundary may fall mid-word.
//!
//! # Example
//!
//! ```rust
//! use docgate_core::chunk::chunk_text;
//!
//! let text = "a".repeat(2000);
//! let chunks = chunk_text(&text, 900, 150);
//! assert_eq!(chunks.len(), 3);
//! ```

/// Split `text` into trimmed windows of at most `chunk_size` characters.
///
/// Windows start every `max(1, chunk_size - overlap)` characters. Windows
/// that are empty after trimming are dropped, so the returned spans are
/// always non-empty. The final window may be shorter than `chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let stride = chunk_size.saturating_sub(overlap).max(1);

    // Byte offset of every char start, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < char_len {
        let end = (start + chunk_size).min(char_len);
        let window = text[bounds[start]..bounds[end]].trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }
        start += stride;
    }
    chunks
}
