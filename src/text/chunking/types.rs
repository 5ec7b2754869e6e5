//! Core data structures for semantic page chunking

use crate::text::chunking::error::Result;
use crate::util::encoding::encode_to_utf8_raw;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Separator placed between the breadcrumb trail and the chunk body
pub const BREADCRUMB_SEPARATOR: &str = " > ";

/// One page of a document as handed over by the loader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub document_id: String,
    pub page_number: usize,
    pub raw_text: String,
}

impl Page {
    pub fn new(
        document_id: impl Into<String>,
        page_number: usize,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            page_number,
            raw_text: raw_text.into(),
        }
    }

    /// Build a page from raw bytes of unknown charset (decoded to UTF-8,
    /// undecodable characters dropped)
    pub fn from_bytes(
        document_id: impl Into<String>,
        page_number: usize,
        bytes: &[u8],
    ) -> Result<Self> {
        let raw_text = encode_to_utf8_raw(bytes)?;
        Ok(Self::new(document_id, page_number, raw_text))
    }
}

/// Kind of an atomic block that must never be split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Table,
    Image,
    Code,
}

impl BlockKind {
    /// Which kind wins when two partially overlapping detections coalesce
    pub fn precedence(&self) -> u8 {
        match self {
            BlockKind::Code => 3,
            BlockKind::Table => 2,
            BlockKind::Image => 1,
        }
    }
}

/// Byte span `[start, end)` of the page text treated as atomic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedBlock {
    pub start: usize,
    pub end: usize,
    pub kind: BlockKind,
    pub raw_text: String,
}

impl ProtectedBlock {
    pub fn new(text: &str, start: usize, end: usize, kind: BlockKind) -> Self {
        Self {
            start,
            end,
            kind,
            raw_text: text[start..end].to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// `other` lies inside this span and the spans are not identical
    pub fn strictly_contains(&self, other: &ProtectedBlock) -> bool {
        self.start <= other.start
            && other.end <= self.end
            && (self.start, self.end) != (other.start, other.end)
    }
}

/// Classification of a parsed section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Header(u8),
    ListItem,
    Paragraph,
    Protected(BlockKind),
}

impl SectionKind {
    pub fn is_header(&self) -> bool {
        matches!(self, SectionKind::Header(_))
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, SectionKind::Protected(_))
    }

    /// Chunk type a section of this kind contributes
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            SectionKind::Header(_) => ChunkType::Header,
            SectionKind::ListItem => ChunkType::List,
            SectionKind::Paragraph => ChunkType::Paragraph,
            SectionKind::Protected(BlockKind::Table) => ChunkType::Table,
            SectionKind::Protected(BlockKind::Image) => ChunkType::Image,
            SectionKind::Protected(BlockKind::Code) => ChunkType::Code,
        }
    }
}

/// Intermediate parse unit with its breadcrumb context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub text: String,
    pub breadcrumbs: Vec<String>,
}

impl Section {
    pub fn new(kind: SectionKind, text: impl Into<String>, breadcrumbs: Vec<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            breadcrumbs,
        }
    }

    /// Length in characters (not bytes)
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Content type of an emitted chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Header,
    Paragraph,
    List,
    Table,
    Image,
    Code,
    Mixed,
}

impl ChunkType {
    /// Atomic types hold a single protected block
    pub fn is_atomic(&self) -> bool {
        matches!(self, ChunkType::Table | ChunkType::Image | ChunkType::Code)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChunkType::Header => "Header only",
            ChunkType::Paragraph => "Paragraph text",
            ChunkType::List => "List items",
            ChunkType::Table => "Table",
            ChunkType::Image => "Image reference",
            ChunkType::Code => "Code block",
            ChunkType::Mixed => "Mixed content",
        }
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Output unit consumed by downstream retrieval/embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// SHA-256 of the normalized content
    pub id: String,
    pub document_id: String,
    pub page_number: usize,
    pub sequence_index: usize,
    pub content: String,
    pub breadcrumbs: Vec<String>,
    pub chunk_type: ChunkType,
    pub char_count: usize,
    /// Extended metadata for downstream enrichment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    pub fn new(
        document_id: impl Into<String>,
        page_number: usize,
        sequence_index: usize,
        content: String,
        breadcrumbs: Vec<String>,
        chunk_type: ChunkType,
    ) -> Self {
        Self {
            id: content_id(&content),
            document_id: document_id.into(),
            page_number,
            sequence_index,
            char_count: content.chars().count(),
            content,
            breadcrumbs,
            chunk_type,
            metadata: BTreeMap::new(),
        }
    }

    /// Content without the injected breadcrumb trail
    pub fn body(&self) -> &str {
        match breadcrumb_prefix(&self.breadcrumbs) {
            Some(prefix) => self.content.strip_prefix(&prefix).unwrap_or(&self.content),
            None => &self.content,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<&String> {
        self.metadata.get(key)
    }
}

/// Header line injected at the top of a chunk, `None` for an empty trail
pub fn breadcrumb_prefix(breadcrumbs: &[String]) -> Option<String> {
    if breadcrumbs.is_empty() {
        None
    } else {
        Some(format!("{}\n\n", breadcrumbs.join(BREADCRUMB_SEPARATOR)))
    }
}

/// Case and whitespace insensitive form used for hashing
pub fn normalize_content(content: &str) -> String {
    content.split_whitespace().map(str::to_lowercase).join(" ")
}

/// Deterministic chunk id (hex SHA-256 of the normalized content)
pub fn content_id(content: &str) -> String {
    let digest = Sha256::digest(normalize_content(content).as_bytes());
    format!("{digest:x}")
}
