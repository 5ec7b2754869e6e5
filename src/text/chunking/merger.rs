//! Joining of boundary chunks of two consecutive pages

use super::config::PatternSet;
use super::continuation::TRAILING_BLANK_LINE;
use super::types::{Chunk, ChunkType};

/// Metadata key holding the last page a merged chunk spans
pub const CONTINUED_ON_PAGE: &str = "continued_on_page";

/// Merge the first chunk of page N+1 into the last chunk of page N
///
/// The merged chunk keeps the identity (page, sequence, breadcrumbs) of
/// `last`; the breadcrumb trail injected into `first` is dropped. Size and id
/// are derived from the merged text. A line-break join keeps the indentation
/// of the continued line so nested list items stay nested.
pub fn merge_boundary_chunks(last: &Chunk, first: &Chunk, patterns: &PatternSet) -> Chunk {
    let head = last.content.trim_end();
    let tail = skip_blank_lines(first.body()).trim_end();
    let tail = if needs_line_break(head, tail, patterns) {
        format!("\n{tail}")
    } else {
        format!(" {}", tail.trim_start())
    };

    let chunk_type = if last.chunk_type == first.chunk_type {
        last.chunk_type
    } else {
        ChunkType::Mixed
    };
    let mut merged = Chunk::new(
        last.document_id.clone(),
        last.page_number,
        last.sequence_index,
        format!("{head}{tail}"),
        last.breadcrumbs.clone(),
        chunk_type,
    );
    merged.metadata = last.metadata.clone();
    // the merged chunk now ends where `first` ends
    merged.metadata.remove(TRAILING_BLANK_LINE);
    if let Some(flag) = first.get_metadata(TRAILING_BLANK_LINE) {
        merged.add_metadata(TRAILING_BLANK_LINE, flag.clone());
    }
    merged.add_metadata(CONTINUED_ON_PAGE, first.page_number.to_string());
    merged
}

fn skip_blank_lines(text: &str) -> &str {
    let mut rest = text;
    while let Some((line, after)) = rest.split_once('\n') {
        if !line.trim().is_empty() {
            break;
        }
        rest = after;
    }
    rest
}

fn needs_line_break(head: &str, tail: &str, patterns: &PatternSet) -> bool {
    let tail_of_head = head.lines().last().unwrap_or_default();
    let head_of_tail = tail.lines().next().unwrap_or_default();
    patterns.is_list_item(tail_of_head)
        || patterns.is_list_item(head_of_tail)
        || patterns.starts_block(head_of_tail)
}
