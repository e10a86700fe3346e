//! Context assembly
//!
//! Turns ranked search results into the bounded context block placed in the
//! system prompt. Each included chunk is rendered as
//!
//! ```text
//! [1] <source>
//! <text>
//! ```
//!
//! and sections are separated by a blank line. The budget counts characters
//! of the whole rendered block, headers and separators included.

use crate::types::{AssembledContext, RetrievedChunk};
use std::collections::HashSet;
use tracing::debug;

const SECTION_SEPARATOR: &str = "\n\n";

/// Select chunks in the given order until the character budget is used up.
///
/// - A chunk id seen before is skipped; the first occurrence wins.
/// - A chunk whose section alone is larger than the budget is skipped.
/// - Otherwise assembly stops at the first chunk that does not fit.
///
/// Chunks are never truncated.
pub fn assemble(chunks: &[RetrievedChunk], budget: usize) -> AssembledContext {
    let mut seen: HashSet<&str> = HashSet::with_capacity(chunks.len());
    let mut selected: Vec<RetrievedChunk> = Vec::new();
    let mut text = String::new();
    let mut used = 0usize;

    for chunk in chunks {
        if !seen.insert(chunk.id.as_str()) {
            debug!(chunk_id = %chunk.id, "Skipping duplicate chunk");
            continue;
        }

        let section = render_section(selected.len() + 1, chunk);
        let section_chars = section.chars().count();

        if section_chars > budget {
            debug!(
                chunk_id = %chunk.id,
                chars = section_chars,
                budget,
                "Chunk larger than the whole budget, skipping"
            );
            continue;
        }

        let separator_chars = if selected.is_empty() {
            0
        } else {
            SECTION_SEPARATOR.len()
        };
        if used + separator_chars + section_chars > budget {
            break;
        }

        if separator_chars > 0 {
            text.push_str(SECTION_SEPARATOR);
        }
        text.push_str(&section);
        used += separator_chars + section_chars;
        selected.push(chunk.clone());
    }

    debug!(
        candidates = chunks.len(),
        selected = selected.len(),
        chars = used,
        budget,
        "Context assembled"
    );

    AssembledContext::new(selected, text)
}

fn render_section(position: usize, chunk: &RetrievedChunk) -> String {
    format!("[{}] {}\n{}", position, chunk.source, chunk.text.trim())
}
