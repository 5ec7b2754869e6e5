//! Greedy, size-bounded packing of parsed sections into chunks

use super::config::ChunkerConfig;
use super::error::{ChunkingError, Result};
use super::types::{breadcrumb_prefix, Chunk, ChunkType, Page, Section, SectionKind};
use crate::text::SENTENCE_BOUNDARIES;
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, warn};

/// Number of recently emitted chunk ids checked for duplicates
pub const DEDUP_WINDOW: usize = 5;

/// Fixed-capacity window of the most recent chunk ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentChunkIds {
    ids: VecDeque<String>,
    capacity: usize,
}

impl Default for RecentChunkIds {
    fn default() -> Self {
        Self::new()
    }
}

impl RecentChunkIds {
    pub fn new() -> Self {
        Self::with_capacity(DEDUP_WINDOW)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ids: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|recent| recent == id)
    }

    /// Remember an id, evicting the oldest one when full
    pub fn record(&mut self, id: String) {
        if self.ids.len() == self.capacity {
            self.ids.pop_front();
        }
        self.ids.push_back(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Chunks emitted for one page plus what was dropped on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageChunks {
    pub chunks: Vec<Chunk>,
    pub duplicates_skipped: usize,
    pub rejected: usize,
}

/// Split point finders for oversized text, tried in `FALLBACK_CHAIN` order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    SentenceBoundary,
    Whitespace,
    HardCut,
}

impl SplitStrategy {
    pub const FALLBACK_CHAIN: [SplitStrategy; 3] = [
        SplitStrategy::SentenceBoundary,
        SplitStrategy::Whitespace,
        SplitStrategy::HardCut,
    ];

    /// Byte offset splitting `text` so the leading piece has at most `limit`
    /// characters and is not blank
    pub fn split_point(&self, text: &str, limit: usize) -> Option<usize> {
        let point = match self {
            SplitStrategy::SentenceBoundary => SENTENCE_BOUNDARIES.last_boundary_within(text, limit),
            SplitStrategy::Whitespace => text
                .char_indices()
                .take(limit + 1)
                .filter(|(_, c)| c.is_whitespace())
                .map(|(offset, _)| offset)
                .last(),
            SplitStrategy::HardCut => text.char_indices().nth(limit).map(|(offset, _)| offset),
        };
        point.filter(|&offset| !text[..offset].trim().is_empty())
    }
}

/// Cut `text` into pieces of at most `first_limit` characters for the first
/// piece and `limit` for the rest
pub fn smart_split(text: &str, first_limit: usize, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut remaining = text.trim();
    let mut current_limit = first_limit.max(1);

    while remaining.chars().count() > current_limit {
        let Some(point) = SplitStrategy::FALLBACK_CHAIN
            .iter()
            .find_map(|strategy| strategy.split_point(remaining, current_limit))
        else {
            break;
        };
        pieces.push(remaining[..point].trim_end().to_string());
        remaining = remaining[point..].trim_start();
        current_limit = limit.max(1);
    }
    if !remaining.is_empty() {
        pieces.push(remaining.to_string());
    }
    pieces
}

/// Reject chunks with blank content or missing document id
pub fn validate_chunk(chunk: &Chunk) -> Result<()> {
    if chunk.body().trim().is_empty() {
        return Err(ChunkingError::validation(format!(
            "chunk {} of page {} has no content",
            chunk.sequence_index, chunk.page_number
        )));
    }
    if chunk.document_id.trim().is_empty() {
        return Err(ChunkingError::validation(format!(
            "chunk {} of page {} has no document_id",
            chunk.sequence_index, chunk.page_number
        )));
    }
    Ok(())
}

/// Pack the sections of one page into chunks
///
/// Sections are appended to a buffer that is flushed once it reaches
/// `target_size`, before it would pass `max_size`, and before a header that
/// follows body content. Protected blocks are never split; oversized plain
/// sections are smart-split. Ids found in `recent_chunk_ids` are skipped.
pub fn build_chunks(
    sections: Vec<Section>,
    page: &Page,
    config: &ChunkerConfig,
    recent_chunk_ids: &mut RecentChunkIds,
) -> PageChunks {
    let section_count = sections.len();
    let mut builder = PageChunkBuilder {
        page,
        config,
        recent: recent_chunk_ids,
        buffer: ChunkBuffer::default(),
        output: PageChunks::default(),
    };
    for section in sections {
        builder.push_section(section);
    }
    builder.flush();

    let output = builder.output;
    debug!(
        "Page {}: {} sections -> {} chunks ({} duplicates, {} rejected)",
        page.page_number,
        section_count,
        output.chunks.len(),
        output.duplicates_skipped,
        output.rejected
    );
    output
}

fn prefix_len(breadcrumbs: &[String]) -> usize {
    breadcrumb_prefix(breadcrumbs).map_or(0, |prefix| prefix.chars().count())
}

#[derive(Debug, Default)]
struct ChunkBuffer {
    text: String,
    breadcrumbs: Vec<String>,
    char_count: usize,
    body_types: BTreeSet<ChunkType>,
}

impl ChunkBuffer {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn has_body(&self) -> bool {
        !self.body_types.is_empty()
    }

    /// Character count after appending `text`
    fn projected_len(&self, text: &str, breadcrumbs: &[String]) -> usize {
        let added = text.chars().count();
        if self.is_empty() {
            prefix_len(breadcrumbs) + added
        } else {
            self.char_count + 2 + added
        }
    }

    fn append(&mut self, kind: SectionKind, text: &str, breadcrumbs: &[String]) {
        if self.is_empty() {
            self.breadcrumbs = breadcrumbs.to_vec();
            if let Some(prefix) = breadcrumb_prefix(breadcrumbs) {
                self.text.push_str(&prefix);
            }
        } else {
            self.text.push_str("\n\n");
        }
        self.text.push_str(text);
        self.char_count = self.text.chars().count();
        if !kind.is_header() {
            self.body_types.insert(kind.chunk_type());
        }
    }

    fn chunk_type(&self) -> ChunkType {
        let mut types = self.body_types.iter();
        match (types.next(), types.next()) {
            (None, _) => ChunkType::Header,
            (Some(only), None) => *only,
            _ => ChunkType::Mixed,
        }
    }
}

struct PageChunkBuilder<'a> {
    page: &'a Page,
    config: &'a ChunkerConfig,
    recent: &'a mut RecentChunkIds,
    buffer: ChunkBuffer,
    output: PageChunks,
}

impl PageChunkBuilder<'_> {
    fn push_section(&mut self, section: Section) {
        let max_size = self.config.max_size();

        // one chunk never spans two titled sections
        if section.kind.is_header() && self.buffer.has_body() {
            self.flush();
        }

        let projected = self
            .buffer
            .projected_len(&section.text, &section.breadcrumbs);

        if section.kind.is_protected() {
            if !self.buffer.is_empty() && projected > max_size {
                self.flush();
                self.buffer
                    .append(section.kind, &section.text, &section.breadcrumbs);
                self.flush();
                return;
            }
        } else if prefix_len(&section.breadcrumbs) + section.char_count() > max_size {
            self.split_oversized(section);
            return;
        } else if !self.buffer.is_empty() && projected > max_size {
            self.flush();
        }

        self.buffer
            .append(section.kind, &section.text, &section.breadcrumbs);
        if self.buffer.char_count >= self.config.target_size() {
            self.flush();
        }
    }

    fn split_oversized(&mut self, section: Section) {
        let max_size = self.config.max_size();
        let limit = max_size
            .saturating_sub(prefix_len(&section.breadcrumbs))
            .max(max_size / 4)
            .max(1);

        // a buffer holding only headers takes the first piece if room allows
        let mut first_limit = limit;
        if !self.buffer.is_empty() {
            let room = max_size.saturating_sub(self.buffer.char_count + 2);
            if self.buffer.has_body() || room < max_size / 4 {
                self.flush();
            } else {
                first_limit = room;
            }
        }

        let pieces = smart_split(&section.text, first_limit, limit);
        debug!(
            "Smart-split section of {} chars into {} pieces",
            section.char_count(),
            pieces.len()
        );
        for piece in pieces {
            self.buffer.append(section.kind, &piece, &section.breadcrumbs);
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let buffer = std::mem::take(&mut self.buffer);
        let chunk_type = buffer.chunk_type();
        let chunk = Chunk::new(
            self.page.document_id.clone(),
            self.page.page_number,
            self.output.chunks.len(),
            buffer.text,
            buffer.breadcrumbs,
            chunk_type,
        );

        if let Err(e) = validate_chunk(&chunk) {
            warn!("Dropping chunk: {}", e);
            self.output.rejected += 1;
            return;
        }
        if self.recent.contains(&chunk.id) {
            debug!(
                "Skipping duplicate chunk {} on page {}",
                chunk.id, self.page.page_number
            );
            self.output.duplicates_skipped += 1;
            return;
        }

        self.recent.record(chunk.id.clone());
        debug!(
            "Emitting chunk {} ({}, {} chars)",
            chunk.sequence_index, chunk.chunk_type, chunk.char_count
        );
        self.output.chunks.push(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::chunking::blocks::identify_protected_blocks;
    use crate::text::chunking::config::ChunkerSettings;
    use crate::text::chunking::consolidator::consolidate_paragraphs;
    use crate::text::chunking::parser::parse_semantic_sections;
    use crate::text::chunking::types::{normalize_content, BlockKind};
    use itertools::Itertools;

    fn config(min_size: usize, target_size: usize, max_size: usize) -> ChunkerConfig {
        ChunkerConfig::new(ChunkerSettings {
            target_size,
            min_size,
            max_size,
            enable_page_merging: true,
        })
        .unwrap()
    }

    fn default_config() -> ChunkerConfig {
        ChunkerConfig::new(ChunkerSettings::default()).unwrap()
    }

    fn run_page(page: &Page, config: &ChunkerConfig) -> PageChunks {
        let blocks = identify_protected_blocks(&page.raw_text, config);
        let sections =
            consolidate_paragraphs(parse_semantic_sections(&page.raw_text, &blocks, config));
        build_chunks(sections, page, config, &mut RecentChunkIds::new())
    }

    fn run(text: &str, config: &ChunkerConfig) -> PageChunks {
        run_page(&Page::new("doc", 1, text), config)
    }

    fn build(sections: Vec<Section>, config: &ChunkerConfig) -> PageChunks {
        build_chunks(
            sections,
            &Page::new("doc", 1, ""),
            config,
            &mut RecentChunkIds::new(),
        )
    }

    fn para(text: &str, crumbs: &[&str]) -> Section {
        Section::new(
            SectionKind::Paragraph,
            text,
            crumbs.iter().map(|s| s.to_string()).collect(),
        )
    }

    // 29 chars per sentence, 30 with the trailing space
    fn filler_sentences(count: usize) -> String {
        (1..=count)
            .map(|i| format!("Sentence number {i:02} is filler. "))
            .collect()
    }

    fn sizes(output: &PageChunks) -> Vec<usize> {
        output.chunks.iter().map(|c| c.char_count).collect()
    }

    #[test]
    fn test_table_only_page_is_single_chunk() {
        let mut table = String::from("| id | name | description |\n|----|------|-------------|\n");
        for row in 1..=10 {
            table.push_str(&format!(
                "| {row} | item {row} | a fairly long description of item number {row} |\n"
            ));
        }
        let table = table.trim_end().to_string();
        let config = config(20, 100, 200);
        assert!(table.chars().count() > config.max_size());

        let output = run(&table, &config);
        assert_eq!(output.chunks.len(), 1);
        assert_eq!(output.chunks[0].chunk_type, ChunkType::Table);
        assert_eq!(output.chunks[0].content, table);
    }

    #[test]
    fn test_flush_at_target_size() {
        let sections = (1..=5)
            .map(|i| para(&format!("Paragraph number {i} has some words."), &[]))
            .collect();
        let output = build(sections, &config(20, 80, 150));
        assert_eq!(sizes(&output), vec![106, 70]);
        assert_eq!(output.chunks[1].sequence_index, 1);
    }

    #[test]
    fn test_flush_before_exceeding_max() {
        let sections = vec![para(&"a".repeat(60), &[]), para(&"b".repeat(70), &[])];
        let output = build(sections, &config(20, 100, 120));
        assert_eq!(sizes(&output), vec![60, 70]);
    }

    #[test]
    fn test_header_flushes_body_content() {
        let sections = vec![
            para("Intro text.", &[]),
            Section::new(SectionKind::Header(2), "## Next", vec![]),
            para("Body.", &["Next"]),
        ];
        let output = build(sections, &default_config());
        assert_eq!(output.chunks.len(), 2);
        assert_eq!(output.chunks[0].content, "Intro text.");
        assert_eq!(output.chunks[1].content, "## Next\n\nBody.");
        assert_eq!(output.chunks[1].chunk_type, ChunkType::Paragraph);
    }

    #[test]
    fn test_breadcrumb_prefix_injected() {
        let output = build(vec![para("Body text.", &["Guide", "Install"])], &default_config());
        let chunk = &output.chunks[0];
        assert_eq!(chunk.content, "Guide > Install\n\nBody text.");
        assert_eq!(chunk.body(), "Body text.");
        assert_eq!(chunk.breadcrumbs, vec!["Guide".to_string(), "Install".to_string()]);
    }

    #[test]
    fn test_oversized_paragraph_is_smart_split() {
        let text = filler_sentences(12);
        let output = build(vec![para(&text, &["Doc"])], &config(50, 100, 150));

        assert_eq!(output.chunks.len(), 3);
        for chunk in &output.chunks {
            assert!(chunk.char_count <= 150);
            assert!(chunk.body().ends_with('.'));
            assert_eq!(chunk.breadcrumbs, vec!["Doc".to_string()]);
        }
        let rebuilt = output.chunks.iter().map(|c| c.body()).join(" ");
        assert_eq!(rebuilt, text.trim());
    }

    #[test]
    fn test_header_only_buffer_takes_first_piece() {
        let text = filler_sentences(12);
        let sections = vec![
            Section::new(SectionKind::Header(1), "# Title", vec![]),
            para(&text, &["Title"]),
        ];
        let output = build(sections, &config(50, 100, 150));

        assert_eq!(output.chunks.len(), 3);
        assert!(output.chunks[0].content.starts_with("# Title\n\nSentence number 01"));
        assert!(output.chunks[0].breadcrumbs.is_empty());
        assert!(output.chunks[1].content.starts_with("Title\n\nSentence number 05"));
        assert!(output.chunks.iter().all(|c| c.char_count <= 150));
    }

    #[test]
    fn test_protected_block_never_split() {
        let code = format!("```\n{}\n```", "x".repeat(150));
        let sections = vec![
            para(&"a".repeat(50), &[]),
            Section::new(SectionKind::Protected(BlockKind::Code), code.clone(), vec![]),
            para("tail words", &[]),
        ];
        let output = build(sections, &config(20, 60, 100));

        let types: Vec<ChunkType> = output.chunks.iter().map(|c| c.chunk_type).collect();
        assert_eq!(
            types,
            vec![ChunkType::Paragraph, ChunkType::Code, ChunkType::Paragraph]
        );
        assert_eq!(output.chunks[1].content, code);
        assert!(output.chunks[1].char_count > 100);
    }

    #[test]
    fn test_duplicates_are_skipped() {
        let same = "Same paragraph repeated for the test ok.";
        let other = "A different paragraph for the dedup test.";
        let sections = vec![
            para(same, &[]),
            para(same, &[]),
            para(other, &[]),
            para(&same.to_uppercase(), &[]),
        ];
        let output = build(sections, &config(20, 40, 80));
        assert_eq!(output.chunks.len(), 2);
        assert_eq!(output.duplicates_skipped, 2);
        assert_eq!(output.chunks[1].sequence_index, 1);
    }

    #[test]
    fn test_recent_ids_window_is_bounded() {
        let mut recent = RecentChunkIds::new();
        for i in 0..6 {
            recent.record(i.to_string());
        }
        assert_eq!(recent.len(), DEDUP_WINDOW);
        assert!(!recent.contains("0"));
        assert!(recent.contains("1"));
        assert!(recent.contains("5"));
    }

    #[test]
    fn test_blank_document_id_is_rejected() {
        let output = run_page(&Page::new("  ", 1, "Some text here."), &default_config());
        assert!(output.chunks.is_empty());
        assert_eq!(output.rejected, 1);
    }

    #[test]
    fn test_validate_chunk() {
        let chunk = Chunk::new(
            "d",
            1,
            0,
            "Crumb\n\n".to_string(),
            vec!["Crumb".to_string()],
            ChunkType::Header,
        );
        let err = validate_chunk(&chunk).unwrap_err();
        assert!(matches!(err, ChunkingError::Validation(_)));
    }

    #[test]
    fn test_split_strategies() {
        assert_eq!(
            SplitStrategy::SentenceBoundary.split_point("One two. Three four.", 12),
            Some(8)
        );
        assert_eq!(SplitStrategy::SentenceBoundary.split_point("no stops here", 8), None);
        assert_eq!(SplitStrategy::Whitespace.split_point("alpha beta gamma", 12), Some(10));
        assert_eq!(SplitStrategy::Whitespace.split_point("unbroken", 4), None);
        assert_eq!(SplitStrategy::HardCut.split_point("abcdefgh", 3), Some(3));
    }

    #[test]
    fn test_smart_split_fallbacks() {
        let pieces = smart_split(&"a".repeat(100), 40, 40);
        assert_eq!(pieces.iter().map(|p| p.len()).collect::<Vec<_>>(), vec![40, 40, 20]);

        let pieces = smart_split("alpha beta gamma delta", 12, 12);
        assert_eq!(pieces, vec!["alpha beta", "gamma delta"]);

        let pieces = smart_split(&"日本語".repeat(10), 7, 7);
        let counts: Vec<usize> = pieces.iter().map(|p| p.chars().count()).collect();
        assert_eq!(counts, vec![7, 7, 7, 7, 2]);
    }

    #[test]
    fn test_chunk_types() {
        let config = default_config();
        assert_eq!(run("- one\n- two\n- three", &config).chunks[0].chunk_type, ChunkType::List);
        assert_eq!(
            run("Paragraph intro.\n- item", &config).chunks[0].chunk_type,
            ChunkType::Mixed
        );
        assert_eq!(run("# Only header", &config).chunks[0].chunk_type, ChunkType::Header);
    }

    #[test]
    fn test_short_lines_consolidate_into_one_chunk() {
        let text = "# Notes\nFirst short line about the topic.\nSecond short line with more.\nThird line adds detail here.\nFourth line continues on.\nFifth line wraps it all up.";
        let config = config(100, 400, 600);
        let output = run(text, &config);
        assert_eq!(output.chunks.len(), 1);
        assert!(output.chunks[0].char_count >= config.min_size());
    }

    fn sample_document() -> String {
        let long: String = (1..=8)
            .map(|i| format!("Step {i} in this section is described in plain words. "))
            .collect();
        [
            "# Manual",
            "",
            "Intro paragraph explaining the manual in a few words.",
            "Second line of the intro that keeps going a bit.",
            "",
            "## Install",
            "",
            "- download the archive",
            "- unpack it somewhere",
            "  - nested detail here",
            "",
            "| step | action |",
            "|------|--------|",
            "| 1    | run    |",
            "",
            long.trim(),
            "",
            "## Usage",
            "",
            "```sh",
            "manual --help",
            "```",
            "",
            "Final words of the usage section.",
        ]
        .join("\n")
    }

    #[test]
    fn test_page_properties() {
        let text = sample_document();
        let config = config(50, 120, 200);
        let output = run(&text, &config);
        assert!(output.chunks.len() > 3);

        // size bound
        assert!(output.chunks.iter().all(|c| c.char_count <= config.max_size()));

        // completeness
        let rebuilt = output.chunks.iter().map(|c| c.body()).join("\n");
        assert_eq!(normalize_content(&rebuilt), normalize_content(&text));

        // no-split
        for block in identify_protected_blocks(&text, &config) {
            let holders = output
                .chunks
                .iter()
                .filter(|c| c.content.contains(&block.raw_text))
                .count();
            assert_eq!(holders, 1, "block split or duplicated: {:?}", block.raw_text);
        }

        // sequence
        for (i, chunk) in output.chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
        }
    }

    #[test]
    fn test_idempotent_ids() {
        let text = sample_document();
        let config = config(50, 120, 200);
        let first: Vec<String> = run(&text, &config).chunks.into_iter().map(|c| c.id).collect();
        let second: Vec<String> = run(&text, &config).chunks.into_iter().map(|c| c.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_breadcrumbs_extend_without_headers() {
        let text = sample_document();
        let output = run(&text, &config(50, 120, 200));
        let has_header = |chunk: &Chunk| chunk.body().lines().any(|l| l.starts_with('#'));
        for pair in output.chunks.windows(2) {
            if !has_header(&pair[0]) && !has_header(&pair[1]) {
                assert!(pair[1].breadcrumbs.starts_with(&pair[0].breadcrumbs));
            }
        }
    }

    #[test]
    fn test_dedup_bound_within_page() {
        let text = "Repeated block of text that is long enough.\n\n- list\n\nRepeated block of text that is long enough.";
        let output = run(text, &config(10, 20, 50));
        assert_eq!(output.chunks.len(), 2);
        assert!(output.chunks.iter().map(|c| &c.id).all_unique());
        assert_eq!(output.duplicates_skipped, 1);
    }
}
