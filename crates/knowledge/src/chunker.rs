//! Text chunking with configurable size and overlap.

use crate::types::ChunkCandidate;

/// Chunk text into overlapping segments of at most `chunk_size` chars.
///
/// Each window ends on the last paragraph break, line break or space in its
/// second half when there is one, so words are not cut mid-way. Consecutive
/// windows share up to `overlap` chars.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<ChunkCandidate> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chunk_size == 0 {
        return vec![];
    }

    let overlap = overlap.min(chunk_size.saturating_sub(1));
    let mut chunks = Vec::new();
    let mut position = 0u32;
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            soft_boundary(&chars, start, hard_end)
        };

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(ChunkCandidate {
                position,
                text: trimmed.to_string(),
            });
            position += 1;
        }

        if end == chars.len() {
            break;
        }

        // Always make progress even with a large overlap
        start = end.saturating_sub(overlap).max(start + 1);
    }

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}

fn soft_boundary(chars: &[char], start: usize, hard_end: usize) -> usize {
    let floor = start + (hard_end - start) / 2;
    let last = |pred: fn(&[char], usize) -> bool| {
        (floor..hard_end).rev().find(|&i| pred(chars, i)).map(|i| i + 1)
    };

    last(|c, i| c[i] == '\n' && i > 0 && c[i - 1] == '\n')
        .or_else(|| last(|c, i| c[i] == '\n'))
        .or_else(|| last(|c, i| c[i].is_whitespace()))
        .unwrap_or(hard_end)
}
