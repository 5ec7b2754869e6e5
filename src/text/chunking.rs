//! Semantic page chunking for retrieval/embedding
//!
//! A page is classified into protected blocks (code, tables, images), parsed
//! into breadcrumb-tagged sections, consolidated and packed into size-bounded
//! chunks. Across pages, boundary chunks that continue each other are merged.

pub mod blocks;
pub mod breadcrumbs;
pub mod chunker;
pub mod config;
pub mod consolidator;
pub mod continuation;
pub mod error;
pub mod merger;
pub mod parser;
pub mod pipeline;
pub mod statistics;
pub mod types;

// Re-export main public interfaces
pub use blocks::identify_protected_blocks;
pub use chunker::{build_chunks, PageChunks, RecentChunkIds, SplitStrategy};
pub use config::{ChunkerConfig, ChunkerSettings, ContinuationPolicy, PatternSet};
pub use consolidator::consolidate_paragraphs;
pub use continuation::{detect_continuation, ContinuationSignal, SignalKind};
pub use error::{ChunkingError, Result};
pub use merger::merge_boundary_chunks;
pub use parser::parse_semantic_sections;
pub use pipeline::{DocumentChunker, DocumentChunks};
pub use statistics::{calculate_statistics, ChunkingStatistics, StatsReport};
pub use types::{BlockKind, Chunk, ChunkType, Page, ProtectedBlock, Section, SectionKind};
