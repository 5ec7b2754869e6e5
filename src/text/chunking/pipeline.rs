//! Document-level pipeline: per-page chunking followed by cross-page merging

use super::blocks::identify_protected_blocks;
use super::chunker::{build_chunks, PageChunks, RecentChunkIds};
use super::config::ChunkerConfig;
use super::consolidator::consolidate_paragraphs;
use super::continuation::{detect_continuation, ends_with_blank_line, TRAILING_BLANK_LINE};
use super::error::{ChunkingError, Result};
use super::merger::merge_boundary_chunks;
use super::parser::parse_semantic_sections;
use super::statistics::{calculate_statistics, ChunkingStatistics, StatsReport};
use super::types::{Chunk, Page};
use crate::util::cancel::CancelToken;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Final chunk list of a document with the counters of the run
#[derive(Debug, Clone, Default)]
pub struct DocumentChunks {
    pub chunks: Vec<Chunk>,
    pub statistics: ChunkingStatistics,
    /// Processing stopped early; `chunks` covers the pages seen so far
    pub cancelled: bool,
}

/// Classify, parse, consolidate and pack a single page
pub fn chunk_single_page(page: &Page, config: &ChunkerConfig) -> PageChunks {
    let blocks = identify_protected_blocks(&page.raw_text, config);
    let sections = parse_semantic_sections(&page.raw_text, &blocks, config);
    let sections = consolidate_paragraphs(sections);
    // dedup window is per page so page results do not depend on each other
    let mut page_chunks = build_chunks(sections, page, config, &mut RecentChunkIds::new());
    if ends_with_blank_line(&page.raw_text) {
        if let Some(last) = page_chunks.chunks.last_mut() {
            last.add_metadata(TRAILING_BLANK_LINE, "true");
        }
    }
    page_chunks
}

/// Runs the chunking pipeline over the pages of one document
#[derive(Debug, Clone)]
pub struct DocumentChunker {
    config: Arc<ChunkerConfig>,
}

impl DocumentChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn with_shared_config(config: Arc<ChunkerConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn chunk_page(&self, page: &Page) -> PageChunks {
        chunk_single_page(page, &self.config)
    }

    pub fn chunk_document(&self, pages: &[Page]) -> DocumentChunks {
        self.chunk_document_until(pages, &CancelToken::never())
    }

    /// Process pages in order, stopping before the next page once `cancel`
    /// fires; the result then holds the pages chunked and merged so far
    pub fn chunk_document_until<'p, I>(&self, pages: I, cancel: &CancelToken) -> DocumentChunks
    where
        I: IntoIterator<Item = &'p Page>,
    {
        let mut assembler = DocumentAssembler::new(&self.config);
        let started = assembler.statistics.start_total_timing();

        for page in pages {
            if cancel.is_cancelled() {
                info!(
                    "Chunking cancelled before page {} ({} pages done)",
                    page.page_number, assembler.statistics.pages_processed
                );
                return assembler.finish(started, true);
            }
            assembler.push_page(self.chunk_page(page));
        }
        assembler.finish(started, false)
    }

    /// Build pages on the blocking pool, then merge serially in page order
    pub async fn chunk_document_concurrent(&self, pages: Vec<Page>) -> Result<DocumentChunks> {
        let started = Instant::now();
        let page_count = pages.len();

        let mut join_set = JoinSet::new();
        for (index, page) in pages.into_iter().enumerate() {
            let config = Arc::clone(&self.config);
            join_set.spawn_blocking(move || (index, chunk_single_page(&page, &config)));
        }

        let mut slots: Vec<Option<PageChunks>> = (0..page_count).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (index, page_chunks) = joined
                .map_err(|e| ChunkingError::internal(format!("page worker failed: {e}")))?;
            slots[index] = Some(page_chunks);
        }

        let mut assembler = DocumentAssembler::new(&self.config);
        for (index, slot) in slots.into_iter().enumerate() {
            let page_chunks = slot.ok_or_else(|| {
                ChunkingError::internal(format!("missing result for page index {index}"))
            })?;
            assembler.push_page(page_chunks);
        }
        Ok(assembler.finish(started, false))
    }

    pub fn report(&self, chunks: &[Chunk]) -> StatsReport {
        calculate_statistics(chunks, &self.config)
    }
}

/// Ordered assembly of page results with continuation merging
struct DocumentAssembler<'a> {
    config: &'a ChunkerConfig,
    chunks: Vec<Chunk>,
    statistics: ChunkingStatistics,
    previous_page_contributed: bool,
}

impl<'a> DocumentAssembler<'a> {
    fn new(config: &'a ChunkerConfig) -> Self {
        Self {
            config,
            chunks: Vec::new(),
            statistics: ChunkingStatistics::new(),
            previous_page_contributed: false,
        }
    }

    fn push_page(&mut self, page: PageChunks) {
        self.statistics.record_page(&page);
        let mut incoming = page.chunks;
        let contributed = !incoming.is_empty();

        if self.config.enable_page_merging() && self.previous_page_contributed && contributed {
            self.merge_boundary(&mut incoming);
        }
        self.chunks.extend(incoming);
        self.previous_page_contributed = contributed;
    }

    fn merge_boundary(&mut self, incoming: &mut Vec<Chunk>) {
        let (Some(last), Some(first)) = (self.chunks.last_mut(), incoming.first()) else {
            return;
        };
        if !detect_continuation(last, first, self.config) {
            return;
        }

        let merged = merge_boundary_chunks(last, first, self.config.patterns());
        if merged.char_count > self.config.max_size() {
            warn!(
                "Refusing merge of page {} into page {}: {} chars exceeds max_size {}",
                first.page_number,
                last.page_number,
                merged.char_count,
                self.config.max_size()
            );
            self.statistics.record_refused_merge();
            return;
        }

        debug!(
            "Merged first chunk of page {} into page {} ({} chars)",
            first.page_number, last.page_number, merged.char_count
        );
        *last = merged;
        incoming.remove(0);
        for (index, chunk) in incoming.iter_mut().enumerate() {
            chunk.sequence_index = index;
        }
        self.statistics.record_merge();
    }

    fn finish(mut self, started: Instant, cancelled: bool) -> DocumentChunks {
        self.statistics.finish_total_timing(started);
        info!("{}", self.statistics.summary());
        DocumentChunks {
            chunks: self.chunks,
            statistics: self.statistics,
            cancelled,
        }
    }
}
