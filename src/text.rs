pub mod chunking;

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Shared detector with the default stop and closing characters
pub static SENTENCE_BOUNDARIES: Lazy<SentenceBoundaries> =
    Lazy::new(|| SentenceBoundaries::new(None, None));

/// Sentence boundary detection over plain text
///
/// A boundary sits right after a stop character (plus any closing quotes or
/// brackets) that is followed by whitespace or the end of text. Full-width
/// stops end a sentence on their own since CJK text rarely puts a space after
/// them.
pub struct SentenceBoundaries {
    stop_chars: HashSet<char>,
    closers: HashSet<char>,
}

impl SentenceBoundaries {
    pub const STOP_CHARS: [char; 6] = ['.', '?', '!', '。', '！', '？'];

    // closing marks that may trail the stop char: `end."` `(see above.)`
    pub const CLOSERS: [char; 10] = ['"', '\'', ')', ']', '”', '’', '」', '』', '】', '*'];

    pub fn new(stop_chars: Option<HashSet<char>>, closers: Option<HashSet<char>>) -> Self {
        Self {
            stop_chars: stop_chars.unwrap_or_else(|| Self::STOP_CHARS.iter().cloned().collect()),
            closers: closers.unwrap_or_else(|| Self::CLOSERS.iter().cloned().collect()),
        }
    }

    /// Whether the text ends on terminal punctuation (trailing whitespace
    /// and closing marks ignored)
    pub fn ends_sentence(&self, text: &str) -> bool {
        text.trim_end()
            .chars()
            .rev()
            .find(|c| !self.closers.contains(c))
            .is_some_and(|c| self.stop_chars.contains(&c))
    }

    /// Byte offset of the last sentence boundary that keeps the leading part
    /// within `max_chars` characters
    pub fn last_boundary_within(&self, text: &str, max_chars: usize) -> Option<usize> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut best = None;

        for (i, &(_, c)) in chars.iter().enumerate().take(max_chars) {
            if !self.stop_chars.contains(&c) {
                continue;
            }
            let mut end = i + 1;
            while end < chars.len() && self.closers.contains(&chars[end].1) {
                end += 1;
            }
            if end > max_chars {
                continue;
            }
            let followed_by_space = chars.get(end).is_none_or(|(_, next)| next.is_whitespace());
            if followed_by_space || !c.is_ascii() {
                best = Some(chars.get(end).map_or(text.len(), |(offset, _)| *offset));
            }
        }
        best
    }
}
