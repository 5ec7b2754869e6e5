//! Size/type distribution of a chunk list and run counters of the pipeline

use super::chunker::PageChunks;
use super::config::ChunkerConfig;
use super::types::{Chunk, ChunkType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Quality score penalty per fraction of chunks below `min_size`
pub const BELOW_MIN_PENALTY: f64 = 0.40;
/// Quality score penalty per fraction of chunks above `max_size`
pub const ABOVE_MAX_PENALTY: f64 = 0.40;
/// Quality score penalty per fraction of `Mixed` chunks
pub const MIXED_PENALTY: f64 = 0.20;

/// Chunk counts against the configured size thresholds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SizeHistogram {
    pub below_min: usize,
    pub in_range: usize,
    pub above_max: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsReport {
    pub total_chunks: usize,
    pub total_chars: usize,
    pub min_chars: usize,
    pub max_chars: usize,
    pub mean_chars: f64,
    pub histogram: SizeHistogram,
    pub type_distribution: BTreeMap<ChunkType, usize>,
    /// 0 (worst) to 100 (best)
    pub quality_score: f64,
}

/// Read-only pass over the final chunk list
pub fn calculate_statistics(chunks: &[Chunk], config: &ChunkerConfig) -> StatsReport {
    if chunks.is_empty() {
        return StatsReport::default();
    }

    let mut report = StatsReport {
        total_chunks: chunks.len(),
        min_chars: usize::MAX,
        ..Default::default()
    };
    for chunk in chunks {
        report.total_chars += chunk.char_count;
        report.min_chars = report.min_chars.min(chunk.char_count);
        report.max_chars = report.max_chars.max(chunk.char_count);
        *report.type_distribution.entry(chunk.chunk_type).or_insert(0) += 1;

        if chunk.char_count < config.min_size() {
            report.histogram.below_min += 1;
        } else if chunk.char_count > config.max_size() {
            report.histogram.above_max += 1;
        } else {
            report.histogram.in_range += 1;
        }
    }
    report.mean_chars = report.total_chars as f64 / report.total_chunks as f64;

    let mixed = report
        .type_distribution
        .get(&ChunkType::Mixed)
        .copied()
        .unwrap_or(0);
    report.quality_score = quality_score(
        report.histogram.below_min,
        report.histogram.above_max,
        mixed,
        report.total_chunks,
    );
    report
}

/// `100 * (1 - 0.4 * below - 0.4 * above - 0.2 * mixed)` over fractions of
/// `total`, clamped to `[0, 100]`; 0 for an empty list
pub fn quality_score(below_min: usize, above_max: usize, mixed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let fraction = |count: usize| count as f64 / total as f64;
    let penalty = BELOW_MIN_PENALTY * fraction(below_min)
        + ABOVE_MAX_PENALTY * fraction(above_max)
        + MIXED_PENALTY * fraction(mixed);
    (100.0 * (1.0 - penalty)).clamp(0.0, 100.0)
}

/// Counters collected while running the document pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkingStatistics {
    pub pages_processed: usize,
    /// Chunks emitted by the per-page engine, before cross-page merges
    pub chunks_emitted: usize,
    pub duplicates_skipped: usize,
    pub chunks_rejected: usize,
    pub merges_performed: usize,
    /// Continuations detected but not merged because of `max_size`
    pub merges_refused: usize,
    pub total_processing_time: Duration,
}

impl ChunkingStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_total_timing(&self) -> Instant {
        Instant::now()
    }

    pub fn finish_total_timing(&mut self, start: Instant) {
        self.total_processing_time = start.elapsed();
    }

    pub fn record_page(&mut self, page: &PageChunks) {
        self.pages_processed += 1;
        self.chunks_emitted += page.chunks.len();
        self.duplicates_skipped += page.duplicates_skipped;
        self.chunks_rejected += page.rejected;
    }

    pub fn record_merge(&mut self) {
        self.merges_performed += 1;
    }

    pub fn record_refused_merge(&mut self) {
        self.merges_refused += 1;
    }

    /// Chunks left after cross-page merging
    pub fn final_chunk_count(&self) -> usize {
        self.chunks_emitted.saturating_sub(self.merges_performed)
    }

    /// One line for logging
    pub fn summary(&self) -> String {
        format!(
            "Chunking Stats: {} pages -> {} chunks ({} emitted, {} merged, {} merges refused) | \
            {} duplicates skipped, {} rejected | {:.2}ms",
            self.pages_processed,
            self.final_chunk_count(),
            self.chunks_emitted,
            self.merges_performed,
            self.merges_refused,
            self.duplicates_skipped,
            self.chunks_rejected,
            self.total_processing_time.as_secs_f64() * 1000.0
        )
    }
}
