//! Header trail tracked while scanning a page

/// Stack of open headers, strictly increasing in level from the bottom
///
/// Used as a fold accumulator: each header produces a new stack value
/// instead of mutating shared parser state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreadcrumbStack {
    entries: Vec<(u8, String)>,
}

impl BreadcrumbStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a header of `level`: pop every entry at that level or deeper,
    /// then push the new title.
    ///
    /// Returns the updated stack together with the header's ancestors (the
    /// trail after popping and before pushing).
    pub fn enter(mut self, level: u8, title: impl Into<String>) -> (Self, Vec<String>) {
        while self.entries.last().is_some_and(|(l, _)| *l >= level) {
            self.entries.pop();
        }
        let ancestors = self.titles();
        self.entries.push((level, title.into()));
        (self, ancestors)
    }

    /// Snapshot of the open titles from the outermost level down
    pub fn titles(&self) -> Vec<String> {
        self.entries.iter().map(|(_, title)| title.clone()).collect()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Level of the innermost open header
    pub fn current_level(&self) -> Option<u8> {
        self.entries.last().map(|(level, _)| *level)
    }
}
