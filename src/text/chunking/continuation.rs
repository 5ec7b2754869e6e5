//! Heuristic detection of content that runs across a page boundary

use super::config::{ChunkerConfig, ContinuationPolicy, PatternSet};
use super::types::Chunk;
use crate::text::SENTENCE_BOUNDARIES;
use tracing::debug;

/// Words that typically resume a sentence cut by a page break
pub const CONNECTOR_WORDS: [&str; 12] = [
    "and", "or", "but", "nor", "so", "yet", "then", "which", "that", "because", "whereas", "while",
];

/// Metadata key set on a page's last chunk when a blank line closes the page
pub const TRAILING_BLANK_LINE: &str = "trailing_blank_line";

// sums within this distance of the threshold count as a tie
const TIE_TOLERANCE: f32 = 1e-6;

// punctuation that cannot start a fresh sentence
const CONTINUING_PUNCTUATION: [char; 4] = [',', ';', ':', ')'];

/// Independent textual signals suggesting a continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Last chunk ends without terminal punctuation
    OpenSentence,
    /// Next chunk starts lowercase, with a connector or continuing punctuation
    ResumedSentence,
    /// List item at page end followed by a list item at the same depth
    OpenList,
    /// Next chunk does not open with a header
    NoLeadingHeader,
}

impl SignalKind {
    pub const ALL: [SignalKind; 4] = [
        SignalKind::OpenSentence,
        SignalKind::ResumedSentence,
        SignalKind::OpenList,
        SignalKind::NoLeadingHeader,
    ];

    pub fn weight(&self, policy: &ContinuationPolicy) -> f32 {
        match self {
            SignalKind::OpenSentence => policy.open_sentence,
            SignalKind::ResumedSentence => policy.resumed_sentence,
            SignalKind::OpenList => policy.open_list,
            SignalKind::NoLeadingHeader => policy.no_leading_header,
        }
    }

    pub fn evaluate(&self, last: &Chunk, first: &Chunk, patterns: &PatternSet) -> bool {
        match self {
            SignalKind::OpenSentence => open_sentence(last, patterns),
            SignalKind::ResumedSentence => resumed_sentence(first, patterns),
            SignalKind::OpenList => open_list(last, first, patterns),
            SignalKind::NoLeadingHeader => first_line(first.body())
                .is_some_and(|line| patterns.header_of(line).is_none()),
        }
    }
}

/// One evaluated signal of a page-boundary decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuationSignal {
    pub kind: SignalKind,
    pub weight: f32,
    pub fired: bool,
}

pub fn evaluate_signals(last: &Chunk, first: &Chunk, config: &ChunkerConfig) -> Vec<ContinuationSignal> {
    SignalKind::ALL
        .iter()
        .map(|kind| ContinuationSignal {
            kind: *kind,
            weight: kind.weight(config.continuation()),
            fired: kind.evaluate(last, first, config.patterns()),
        })
        .collect()
}

/// Continuation only when the fired weight is strictly above `threshold`;
/// a tie means no continuation
pub fn decide(signals: &[ContinuationSignal], threshold: f32) -> bool {
    let score: f32 = signals
        .iter()
        .filter(|signal| signal.fired)
        .map(|signal| signal.weight)
        .sum();
    score - threshold > TIE_TOLERANCE
}

/// Whether `first` (first chunk of page N+1) continues `last` (last chunk of page N)
pub fn detect_continuation(last: &Chunk, first: &Chunk, config: &ChunkerConfig) -> bool {
    let signals = evaluate_signals(last, first, config);
    let decision = decide(&signals, config.continuation().threshold);
    debug!(
        "Continuation page {} -> {}: {} (fired: {:?})",
        last.page_number,
        first.page_number,
        decision,
        signals
            .iter()
            .filter(|signal| signal.fired)
            .map(|signal| signal.kind)
            .collect::<Vec<_>>()
    );
    decision
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().find(|line| !line.trim().is_empty())
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().find(|line| !line.trim().is_empty())
}

/// A blank line follows the last content of the page text
pub fn ends_with_blank_line(text: &str) -> bool {
    let trailing = &text[text.trim_end().len()..];
    !text.trim().is_empty() && trailing.matches('\n').count() >= 2
}

fn open_sentence(last: &Chunk, patterns: &PatternSet) -> bool {
    if last.chunk_type.is_atomic() {
        return false;
    }
    match last_line(last.body()) {
        Some(line) if !patterns.starts_block(line) => !SENTENCE_BOUNDARIES.ends_sentence(line),
        _ => false,
    }
}

fn resumed_sentence(first: &Chunk, patterns: &PatternSet) -> bool {
    let Some(line) = first_line(first.body()) else {
        return false;
    };
    if patterns.starts_block(line) {
        return false;
    }
    let line = line.trim_start();
    let Some(lead) = line.chars().next() else {
        return false;
    };
    if lead.is_lowercase() || CONTINUING_PUNCTUATION.contains(&lead) {
        return true;
    }
    line.split_whitespace()
        .next()
        .map(|word| word.trim_end_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .is_some_and(|word| CONNECTOR_WORDS.contains(&word.as_str()))
}

fn open_list(last: &Chunk, first: &Chunk, patterns: &PatternSet) -> bool {
    // a blank line after the final item closes the list
    if last.get_metadata(TRAILING_BLANK_LINE).is_some() {
        return false;
    }
    let tail_depth = last_line(last.body()).and_then(|line| patterns.list_depth(line));
    let head_depth = first_line(first.body()).and_then(|line| patterns.list_depth(line));
    matches!((tail_depth, head_depth), (Some(a), Some(b)) if a == b)
}
