//! Line-oriented semantic parser producing breadcrumb-tagged sections

use super::breadcrumbs::BreadcrumbStack;
use super::config::{ChunkerConfig, PatternSet};
use super::types::{ProtectedBlock, Section, SectionKind};
use tracing::{debug, warn};

/// Unit of the scan: a physical line outside protected spans, or a whole block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Line(&'a str),
    Block(&'a ProtectedBlock),
}

/// Accumulator threaded through the scan
#[derive(Debug, Clone, Default)]
pub(crate) struct ParseState {
    pub stack: BreadcrumbStack,
    pub sections: Vec<Section>,
}

/// Split the page into sections in text order
pub fn parse_semantic_sections(
    text: &str,
    blocks: &[ProtectedBlock],
    config: &ChunkerConfig,
) -> Vec<Section> {
    let patterns = config.patterns();
    let state = segments(text, blocks)
        .into_iter()
        .fold(ParseState::default(), |state, segment| {
            parse_segment(state, segment, patterns)
        });

    debug!(
        "Parsed {} sections ({} protected), final breadcrumb depth {}",
        state.sections.len(),
        state
            .sections
            .iter()
            .filter(|section| section.kind.is_protected())
            .count(),
        state.stack.depth()
    );
    state.sections
}

/// Interleave the lines between protected spans with the spans themselves.
/// A block starting mid-line cuts the line; the prefix is scanned on its own.
pub(crate) fn segments<'a>(text: &'a str, blocks: &'a [ProtectedBlock]) -> Vec<Segment<'a>> {
    let mut out = Vec::new();
    let mut cursor = 0;

    for block in blocks {
        let before = match text.get(cursor..block.start) {
            Some(before) if block.end <= text.len() => before,
            _ => {
                warn!(
                    "Ignoring protected block [{}, {}) outside the scan window (cursor {})",
                    block.start, block.end, cursor
                );
                continue;
            }
        };
        push_lines(before, &mut out);
        out.push(Segment::Block(block));
        cursor = block.end;
    }
    if let Some(rest) = text.get(cursor..) {
        push_lines(rest, &mut out);
    }
    out
}

fn push_lines<'a>(text: &'a str, out: &mut Vec<Segment<'a>>) {
    if text.is_empty() {
        return;
    }
    out.extend(
        text.split('\n')
            .map(|line| Segment::Line(line.strip_suffix('\r').unwrap_or(line))),
    );
}

/// One fold step: classify a segment and return the updated state
pub(crate) fn parse_segment(
    mut state: ParseState,
    segment: Segment<'_>,
    patterns: &PatternSet,
) -> ParseState {
    match segment {
        Segment::Block(block) => {
            let section = Section::new(
                SectionKind::Protected(block.kind),
                block.raw_text.clone(),
                state.stack.titles(),
            );
            state.sections.push(section);
        }
        Segment::Line(line) if line.trim().is_empty() => {}
        Segment::Line(line) => {
            if let Some((level, title)) = patterns.header_of(line) {
                let (stack, ancestors) = state.stack.enter(level, title);
                state.stack = stack;
                state
                    .sections
                    .push(Section::new(SectionKind::Header(level), line.trim(), ancestors));
            } else if patterns.is_list_item(line) {
                // indentation is kept so nesting depth survives into chunk text
                state.sections.push(Section::new(
                    SectionKind::ListItem,
                    line.trim_end(),
                    state.stack.titles(),
                ));
            } else {
                state.sections.push(Section::new(
                    SectionKind::Paragraph,
                    line.trim(),
                    state.stack.titles(),
                ));
            }
        }
    }
    state
}
