//! Configuration for semantic page chunking

use super::error::{ChunkingError, Result};
use anyhow::Context;
use regex::Regex;
use serde::Deserialize;

/// Compiled markdown patterns shared by the classifier, parser and detector
#[derive(Debug, Clone)]
pub struct PatternSet {
    /// `#`..`######` followed by whitespace and a title
    pub header: Regex,
    /// bullet (`-`, `*`, `+`, `•`) or numbered (`1.`, `1)`) list marker
    pub list_item: Regex,
    /// opening or closing code fence (``` or ~~~)
    pub code_fence: Regex,
    /// table separator row such as `|---|:---:|`
    pub table_separator: Regex,
    /// `![alt](target)` image reference
    pub image: Regex,
}

impl PatternSet {
    pub fn compile() -> Result<Self> {
        Ok(Self {
            header: Regex::new(r"^\s{0,3}(#{1,6})\s+(.*?)(?:\s+#+)?\s*$")?,
            list_item: Regex::new(r"^(\s*)(?:[-*+•]|\d{1,9}[.)])\s+\S")?,
            code_fence: Regex::new(r"^\s{0,3}(`{3,}|~{3,})(.*)$")?,
            table_separator: Regex::new(
                r"^\s*\|?\s*:?-+:?\s*(?:\|\s*:?-+:?\s*)*\|?\s*$",
            )?,
            image: Regex::new(r"!\[[^\]\n]*\]\([^)\n]*\)")?,
        })
    }

    /// Header level and title of a header line
    pub fn header_of<'a>(&self, line: &'a str) -> Option<(u8, &'a str)> {
        let caps = self.header.captures(line)?;
        let level = caps.get(1)?.as_str().len() as u8;
        let title = caps.get(2)?.as_str().trim();
        if title.is_empty() {
            None
        } else {
            Some((level, title))
        }
    }

    pub fn is_list_item(&self, line: &str) -> bool {
        self.list_item.is_match(line)
    }

    /// Line opens markup rather than prose: header, fence, table row or image
    pub fn starts_block(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        self.header_of(line).is_some()
            || self.code_fence.is_match(line)
            || trimmed.starts_with('|')
            || trimmed.starts_with("![")
    }

    /// Nesting depth of a list item line (two columns of indentation per level)
    pub fn list_depth(&self, line: &str) -> Option<usize> {
        let caps = self.list_item.captures(line)?;
        let indent = caps.get(1)?.as_str();
        let width: usize = indent.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum();
        Some(width / 2)
    }
}

/// Weights of the page-continuation signals and the decision threshold
///
/// Continuation fires only when the summed weight of fired signals is
/// strictly greater than `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContinuationPolicy {
    pub open_sentence: f32,
    pub resumed_sentence: f32,
    pub open_list: f32,
    pub no_leading_header: f32,
    pub threshold: f32,
}

impl Default for ContinuationPolicy {
    fn default() -> Self {
        Self {
            open_sentence: 0.35,
            resumed_sentence: 0.30,
            open_list: 0.40,
            no_leading_header: 0.15,
            threshold: 0.50,
        }
    }
}

impl ContinuationPolicy {
    pub fn validate(&self) -> std::result::Result<(), String> {
        let weights = [
            self.open_sentence,
            self.resumed_sentence,
            self.open_list,
            self.no_leading_header,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("continuation weights must be finite and non-negative".to_string());
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err("continuation threshold must be greater than 0".to_string());
        }
        if weights.iter().any(|w| *w > self.threshold) {
            return Err("a single continuation signal must not clear the threshold".to_string());
        }
        Ok(())
    }
}

/// Plain-data chunking settings (deserializable, unvalidated)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChunkerSettings {
    pub target_size: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub enable_page_merging: bool,
}

impl Default for ChunkerSettings {
    fn default() -> Self {
        Self {
            target_size: 1000,
            min_size: 200,
            max_size: 1500,
            enable_page_merging: true,
        }
    }
}

impl ChunkerSettings {
    /// Settings for small-context embedding models
    pub fn for_compact_embedding() -> Self {
        Self {
            target_size: 500,
            min_size: 100,
            max_size: 800,
            enable_page_merging: true,
        }
    }

    /// Settings for long-context retrieval
    pub fn for_long_context() -> Self {
        Self {
            target_size: 2000,
            min_size: 400,
            max_size: 3000,
            enable_page_merging: true,
        }
    }

    /// Read `CHUNKER_TARGET_SIZE`, `CHUNKER_MIN_SIZE`, `CHUNKER_MAX_SIZE`,
    /// `CHUNKER_ENABLE_PAGE_MERGING` (missing ones fall back to defaults)
    pub fn from_env() -> anyhow::Result<Self> {
        envy::prefixed("CHUNKER_")
            .from_env::<ChunkerSettings>()
            .context("cannot read chunker settings from env:")
    }

    pub fn from_env_iter<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("CHUNKER_")
            .from_iter::<_, ChunkerSettings>(vars)
            .context("cannot read chunker settings:")
    }

    /// Validate size thresholds: all positive and `min < target < max`
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.min_size == 0 || self.target_size == 0 || self.max_size == 0 {
            return Err("min_size, target_size and max_size must be greater than 0".to_string());
        }

        if self.min_size >= self.max_size {
            return Err(format!(
                "min_size ({}) must be less than max_size ({})",
                self.min_size, self.max_size
            ));
        }

        if self.min_size >= self.target_size {
            return Err(format!(
                "min_size ({}) must be less than target_size ({})",
                self.min_size, self.target_size
            ));
        }

        if self.target_size >= self.max_size {
            return Err(format!(
                "target_size ({}) must be less than max_size ({})",
                self.target_size, self.max_size
            ));
        }

        Ok(())
    }
}

/// Immutable, validated run-wide configuration
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    target_size: usize,
    min_size: usize,
    max_size: usize,
    enable_page_merging: bool,
    continuation: ContinuationPolicy,
    patterns: PatternSet,
}

impl ChunkerConfig {
    /// Validate sizes and compile patterns; an invalid configuration is
    /// refused, never corrected
    pub fn new(settings: ChunkerSettings) -> Result<Self> {
        Self::with_continuation_policy(settings, ContinuationPolicy::default())
    }

    pub fn with_continuation_policy(
        settings: ChunkerSettings,
        continuation: ContinuationPolicy,
    ) -> Result<Self> {
        settings.validate().map_err(ChunkingError::configuration)?;
        continuation
            .validate()
            .map_err(ChunkingError::configuration)?;

        Ok(Self {
            target_size: settings.target_size,
            min_size: settings.min_size,
            max_size: settings.max_size,
            enable_page_merging: settings.enable_page_merging,
            continuation,
            patterns: PatternSet::compile()?,
        })
    }

    pub fn from_env() -> Result<Self> {
        let settings = ChunkerSettings::from_env()
            .map_err(|e| ChunkingError::configuration(format!("{e:#}")))?;
        Self::new(settings)
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn enable_page_merging(&self) -> bool {
        self.enable_page_merging
    }

    pub fn continuation(&self) -> &ContinuationPolicy {
        &self.continuation
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn settings(&self) -> ChunkerSettings {
        ChunkerSettings {
            target_size: self.target_size,
            min_size: self.min_size,
            max_size: self.max_size,
            enable_page_merging: self.enable_page_merging,
        }
    }
}
