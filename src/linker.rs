//! Cross-reference linking.
//!
//! Turns a record's raw reference list into link targets for the note
//! renderer by joining each entry against the resolved-title cache.
//! Citation order is meaningful to the reader, so output order and length
//! always match the input list; an entry with neither DOI nor title
//! degrades to the unresolved literal instead of being dropped.

use crate::cache::{TitleCache, UNRESOLVED_LITERAL};
use crate::records::{normalize_doi, Record, ReferenceEntry};
use crate::slug::{safe_slug, DEFAULT_SLUG_LEN};
use serde::Serialize;

/// One reference resolved to a display title and a link target.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedReference {
    /// Normalized DOI, when the entry carried one
    pub doi: Option<String>,
    /// Display title chosen by priority: inline title, cached
    /// resolution, unresolved literal
    pub title: String,
    /// Identifier of the note this reference points at
    pub link_target: String,
}

/// Link every reference of `record` against the cache, in citation order.
pub fn link_references(record: &Record, cache: &TitleCache) -> Vec<LinkedReference> {
    record
        .references
        .iter()
        .map(|entry| link_entry(entry, cache))
        .collect()
}

fn link_entry(entry: &ReferenceEntry, cache: &TitleCache) -> LinkedReference {
    let (doi, inline_title) = match entry {
        ReferenceEntry::Structured { doi, article_title } => (
            doi.as_deref().map(normalize_doi).filter(|d| !d.is_empty()),
            article_title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from),
        ),
        ReferenceEntry::Plain(text) => {
            let trimmed = text.trim();
            (
                None,
                (!trimmed.is_empty()).then(|| trimmed.to_string()),
            )
        }
    };

    let title = inline_title
        .or_else(|| {
            doi.as_ref()
                .and_then(|d| cache.title(d))
                .map(String::from)
        })
        .unwrap_or_else(|| UNRESOLVED_LITERAL.to_string());

    LinkedReference {
        link_target: safe_slug(&title, DEFAULT_SLUG_LEN),
        title,
        doi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Resolution;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn cache_with_title_a() -> TitleCache {
        let dir = tempdir().expect("tempdir");
        let mut cache = TitleCache::open(dir.path().join("cache.json"));
        cache.merge(HashMap::from([
            ("10.1/a".to_string(), Resolution::Resolved("Title A".to_string())),
            ("10.1/failed".to_string(), Resolution::Unresolved),
        ]));
        cache
    }

    fn structured(doi: Option<&str>, title: Option<&str>) -> ReferenceEntry {
        ReferenceEntry::Structured {
            doi: doi.map(String::from),
            article_title: title.map(String::from),
        }
    }

    fn record_with(references: Vec<ReferenceEntry>) -> Record {
        Record {
            references,
            ..Default::default()
        }
    }

    #[test]
    fn test_doi_resolved_from_cache() {
        let record = record_with(vec![structured(Some("10.1/a"), None)]);
        let links = link_references(&record, &cache_with_title_a());
        assert_eq!(links[0].title, "Title A");
        assert_eq!(links[0].doi.as_deref(), Some("10.1/a"));
        assert_eq!(links[0].link_target, "Title_A");
    }

    #[test]
    fn test_mixed_case_doi_hits_cache() {
        let record = record_with(vec![structured(Some("10.1/A"), None)]);
        let links = link_references(&record, &cache_with_title_a());
        assert_eq!(links[0].title, "Title A");
    }

    #[test]
    fn test_inline_title_beats_cache() {
        let record = record_with(vec![structured(Some("10.1/a"), Some("Explicit Title"))]);
        let links = link_references(&record, &cache_with_title_a());
        assert_eq!(links[0].title, "Explicit Title");
    }

    #[test]
    fn test_inline_title_without_doi() {
        let record = record_with(vec![structured(None, Some("Explicit Title"))]);
        let links = link_references(&record, &cache_with_title_a());
        assert_eq!(links[0].title, "Explicit Title");
        assert_eq!(links[0].doi, None);
    }

    #[test]
    fn test_sentinel_and_unknown_dois_degrade() {
        let record = record_with(vec![
            structured(Some("10.1/failed"), None),
            structured(Some("10.1/never-seen"), None),
        ]);
        let links = link_references(&record, &cache_with_title_a());
        assert_eq!(links[0].title, UNRESOLVED_LITERAL);
        assert_eq!(links[1].title, UNRESOLVED_LITERAL);
    }

    #[test]
    fn test_malformed_entry_kept_as_unknown() {
        let record = record_with(vec![structured(None, None)]);
        let links = link_references(&record, &cache_with_title_a());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, UNRESOLVED_LITERAL);
    }

    #[test]
    fn test_plain_entry_uses_its_text() {
        let record = record_with(vec![ReferenceEntry::Plain(
            "Smith, Handbook of Slopes".to_string(),
        )]);
        let links = link_references(&record, &cache_with_title_a());
        assert_eq!(links[0].title, "Smith, Handbook of Slopes");
        assert_eq!(links[0].link_target, "Smith_Handbook_of_Slopes");
    }

    #[test]
    fn test_order_and_length_preserved() {
        let record = record_with(vec![
            structured(Some("10.1/a"), None),
            ReferenceEntry::Plain("Middle".to_string()),
            structured(None, None),
        ]);
        let links = link_references(&record, &cache_with_title_a());
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].title, "Title A");
        assert_eq!(links[1].title, "Middle");
        assert_eq!(links[2].title, UNRESOLVED_LITERAL);

        let empty = record_with(Vec::new());
        assert!(link_references(&empty, &cache_with_title_a()).is_empty());
    }
}
