//! Context assembly for prompts.

use crate::types::DocumentChunk;

/// Separator placed between chunk texts.
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// Join chunk texts in relevance order and cut the result to at most
/// `budget` chars.
///
/// The cut is a hard one and may land mid-word. Zero chunks give an empty
/// string.
pub fn assemble_context(chunks: &[DocumentChunk], budget: usize) -> String {
    let joined = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR);

    match joined.char_indices().nth(budget) {
        Some((byte_idx, _)) => {
            tracing::debug!(
                "Truncated context from {} to {} chars",
                joined.chars().count(),
                budget
            );
            joined[..byte_idx].to_string()
        }
        None => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> DocumentChunk {
        DocumentChunk {
            id: text.to_string(),
            source_id: "s".to_string(),
            position: 0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_joins_in_order() {
        let chunks = vec![chunk("first"), chunk("second")];
        assert_eq!(assemble_context(&chunks, 6000), "first\n\nsecond");
    }

    #[test]
    fn test_zero_chunks_is_empty() {
        assert_eq!(assemble_context(&[], 6000), "");
        assert_eq!(assemble_context(&[], 0), "");
    }

    #[test]
    fn test_hard_truncation() {
        let chunks = vec![chunk(&"a".repeat(4000)), chunk(&"b".repeat(4000))];
        let context = assemble_context(&chunks, 6000);

        assert_eq!(context.chars().count(), 6000);
        assert!(context.starts_with(&"a".repeat(4000)));
        assert!(context.ends_with('b'));
    }

    #[test]
    fn test_budget_counts_chars() {
        let chunks = vec![chunk(&"ü".repeat(10))];
        let context = assemble_context(&chunks, 4);
        assert_eq!(context, "üüüü");
    }

    #[test]
    fn test_never_exceeds_budget() {
        let chunks: Vec<DocumentChunk> = (0..20).map(|i| chunk(&format!("chunk {}", i))).collect();
        for budget in [0, 1, 7, 50, 500] {
            assert!(assemble_context(&chunks, budget).chars().count() <= budget);
        }
    }
}
