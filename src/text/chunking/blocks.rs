//! Detection of atomic spans (fenced code, tables, images) that must never be split

use super::config::{ChunkerConfig, PatternSet};
use super::types::{BlockKind, ProtectedBlock};
use std::cmp::Reverse;
use tracing::debug;

/// One physical line: byte offset of its first char, byte offset of its end
/// (line terminator excluded) and the content
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

pub(crate) fn lines_with_offsets(text: &str) -> Vec<Line<'_>> {
    let mut offset = 0;
    text.split_inclusive('\n')
        .map(|raw| {
            let start = offset;
            offset += raw.len();
            let content = raw.strip_suffix('\n').unwrap_or(raw);
            let content = content.strip_suffix('\r').unwrap_or(content);
            Line {
                start,
                end: start + content.len(),
                text: content,
            }
        })
        .collect()
}

/// Find all protected blocks of the page, sorted by start and non-overlapping
pub fn identify_protected_blocks(text: &str, config: &ChunkerConfig) -> Vec<ProtectedBlock> {
    if text.is_empty() {
        return Vec::new();
    }
    let patterns = config.patterns();
    let lines = lines_with_offsets(text);

    let mut raw = find_code_fences(text, &lines, patterns);
    raw.extend(find_tables(text, &lines, patterns));
    raw.extend(find_images(text, patterns));
    let detected = raw.len();

    let blocks = coalesce_blocks(text, raw);
    debug!(
        "Identified {} protected blocks ({} raw matches) in {} bytes",
        blocks.len(),
        detected,
        text.len()
    );
    blocks
}

fn find_code_fences(text: &str, lines: &[Line<'_>], patterns: &PatternSet) -> Vec<ProtectedBlock> {
    let mut blocks = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        let Some((fence_char, fence_len)) = fence_marker(line.text, patterns) else {
            index += 1;
            continue;
        };

        let closing = lines[index + 1..]
            .iter()
            .position(|candidate| is_closing_fence(candidate.text, fence_char, fence_len, patterns));
        match closing {
            Some(relative) => {
                let close_index = index + 1 + relative;
                blocks.push(ProtectedBlock::new(
                    text,
                    line.start,
                    lines[close_index].end,
                    BlockKind::Code,
                ));
                index = close_index + 1;
            }
            None => {
                // unterminated: protect everything up to end of text
                debug!("Unterminated code fence at byte {}", line.start);
                blocks.push(ProtectedBlock::new(text, line.start, text.len(), BlockKind::Code));
                break;
            }
        }
    }
    blocks
}

fn fence_marker(line: &str, patterns: &PatternSet) -> Option<(char, usize)> {
    let caps = patterns.code_fence.captures(line)?;
    let marker = caps.get(1)?.as_str();
    let fence_char = marker.chars().next()?;
    Some((fence_char, marker.len()))
}

fn is_closing_fence(line: &str, fence_char: char, fence_len: usize, patterns: &PatternSet) -> bool {
    let Some(caps) = patterns.code_fence.captures(line) else {
        return false;
    };
    let marker = caps.get(1).map_or("", |m| m.as_str());
    let info = caps.get(2).map_or("", |m| m.as_str());
    marker.starts_with(fence_char) && marker.len() >= fence_len && info.trim().is_empty()
}

fn find_tables(text: &str, lines: &[Line<'_>], patterns: &PatternSet) -> Vec<ProtectedBlock> {
    let mut blocks = Vec::new();
    let mut index = 0;

    while index + 1 < lines.len() {
        let header = lines[index];
        let separator = lines[index + 1];
        let starts_table = header.text.contains('|')
            && separator.text.contains('|')
            && patterns.table_separator.is_match(separator.text);
        if !starts_table {
            index += 1;
            continue;
        }

        let mut last = index + 1;
        while last + 1 < lines.len() && is_table_row(lines[last + 1].text) {
            last += 1;
        }
        blocks.push(ProtectedBlock::new(
            text,
            header.start,
            lines[last].end,
            BlockKind::Table,
        ));
        index = last + 1;
    }
    blocks
}

fn is_table_row(line: &str) -> bool {
    !line.trim().is_empty() && line.contains('|')
}

fn find_images(text: &str, patterns: &PatternSet) -> Vec<ProtectedBlock> {
    patterns
        .image
        .find_iter(text)
        .map(|m| ProtectedBlock::new(text, m.start(), m.end(), BlockKind::Image))
        .collect()
}

/// Merge overlapping or abutting detections into disjoint blocks
///
/// A span strictly containing another keeps its own kind, otherwise the
/// kind with the higher precedence wins.
fn coalesce_blocks(text: &str, mut raw: Vec<ProtectedBlock>) -> Vec<ProtectedBlock> {
    raw.sort_by_key(|block| (block.start, Reverse(block.end)));

    let mut merged: Vec<ProtectedBlock> = Vec::with_capacity(raw.len());
    for block in raw {
        match merged.last_mut() {
            Some(current) if block.start <= current.end => {
                let kind = if current.strictly_contains(&block) {
                    current.kind
                } else if block.strictly_contains(current) {
                    block.kind
                } else if block.kind.precedence() > current.kind.precedence() {
                    block.kind
                } else {
                    current.kind
                };
                current.end = current.end.max(block.end);
                current.kind = kind;
            }
            _ => merged.push(block),
        }
    }

    merged
        .into_iter()
        .map(|block| {
            let end = block.end.min(text.len());
            let start = block.start.min(end);
            ProtectedBlock::new(text, start, end, block.kind)
        })
        .filter(|block| !block.is_empty())
        .collect()
}
