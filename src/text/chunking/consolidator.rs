//! Merging of consecutive plain paragraphs under the same breadcrumb trail

use super::types::{Section, SectionKind};
use tracing::debug;

/// Join consecutive `Paragraph` sections sharing identical breadcrumbs into
/// one section (blank-line separated). Any other kind is a hard boundary.
pub fn consolidate_paragraphs(sections: Vec<Section>) -> Vec<Section> {
    let before = sections.len();
    let mut out: Vec<Section> = Vec::with_capacity(before);

    for section in sections {
        match out.last_mut() {
            Some(previous)
                if previous.kind == SectionKind::Paragraph
                    && section.kind == SectionKind::Paragraph
                    && previous.breadcrumbs == section.breadcrumbs =>
            {
                previous.text.push_str("\n\n");
                previous.text.push_str(&section.text);
            }
            _ => out.push(section),
        }
    }

    if out.len() != before {
        debug!("Consolidated {} sections into {}", before, out.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::chunking::types::BlockKind;

    fn para(text: &str, crumbs: &[&str]) -> Section {
        Section::new(
            SectionKind::Paragraph,
            text,
            crumbs.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_consecutive_paragraphs_merge() {
        let sections = vec![
            para("One.", &["H"]),
            para("Two.", &["H"]),
            para("Three.", &["H"]),
        ];
        let merged = consolidate_paragraphs(sections);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "One.\n\nTwo.\n\nThree.");
        assert_eq!(merged[0].breadcrumbs, vec!["H".to_string()]);
    }

    #[test]
    fn test_different_breadcrumbs_do_not_merge() {
        let merged = consolidate_paragraphs(vec![para("a", &["X"]), para("b", &["Y"])]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_other_kinds_are_boundaries() {
        let sections = vec![
            para("a", &[]),
            Section::new(SectionKind::ListItem, "- item", vec![]),
            para("b", &[]),
            Section::new(SectionKind::Protected(BlockKind::Code), "```\nx\n```", vec![]),
            para("c", &[]),
            Section::new(SectionKind::Header(2), "## H", vec![]),
            para("d", &[]),
        ];
        let merged = consolidate_paragraphs(sections);
        assert_eq!(merged.len(), 7);
    }

    #[test]
    fn test_list_items_are_never_merged() {
        let sections = vec![
            Section::new(SectionKind::ListItem, "- a", vec![]),
            Section::new(SectionKind::ListItem, "- b", vec![]),
        ];
        assert_eq!(consolidate_paragraphs(sections).len(), 2);
        assert!(consolidate_paragraphs(Vec::new()).is_empty());
    }
}
