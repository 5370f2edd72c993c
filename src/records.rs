//! Bibliographic record model.
//!
//! Records are the JSON documents produced by the upstream export
//! ingestion step: one file per paper with title, DOI, year, abstract,
//! authors, and the raw reference list. This module deserializes them
//! and extracts the cited DOIs that drive resolution.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One bibliographic entry as written by the ingestion step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub doi: String,
    #[serde(default)]
    pub year: Option<Year>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub references: Vec<ReferenceEntry>,
}

/// Publication year; exports carry it as either a number or a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Year {
    Number(i64),
    Text(String),
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Year::Number(n) => write!(f, "{}", n),
            Year::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Author entry; partial names are common in registry data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub given: String,
    #[serde(default)]
    pub family: String,
}

/// One citation inside a record's reference list.
///
/// Registry reference entries are objects keyed `DOI` / `article-title`
/// (either may be missing or null); legacy exports carry bare strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceEntry {
    Structured {
        #[serde(rename = "DOI", default, skip_serializing_if = "Option::is_none")]
        doi: Option<String>,
        #[serde(rename = "article-title", default, skip_serializing_if = "Option::is_none")]
        article_title: Option<String>,
    },
    Plain(String),
}

/// Normalize a raw DOI to its cache-key form.
///
/// Trims, strips a `doi:` or `doi.org` URL prefix, and lower-cases, so
/// every case/whitespace variant of the same DOI keys identically.
pub fn normalize_doi(raw: &str) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    for prefix in ["https://doi.org/", "http://doi.org/", "doi:"] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            return rest.trim().to_string();
        }
    }
    lower
}

impl Record {
    /// Read one record file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Normalized DOIs of every structured reference that carries one.
    pub fn cited_dois(&self) -> Vec<String> {
        self.references
            .iter()
            .filter_map(|r| match r {
                ReferenceEntry::Structured { doi: Some(d), .. } if !d.trim().is_empty() => {
                    Some(normalize_doi(d))
                }
                _ => None,
            })
            .collect()
    }
}

/// Load every `.json` record in a directory, in path order.
///
/// A file that fails to read or parse is logged and skipped so one bad
/// export cannot abort the run.
pub fn load_records(dir: &Path) -> Result<Vec<(PathBuf, Record)>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match Record::from_path(&path) {
            Ok(record) => records.push((path, record)),
            Err(e) => warn!(file = %path.display(), error = %e, "Skipping unreadable record"),
        }
    }
    debug!(count = records.len(), dir = %dir.display(), "Loaded records");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "title": "A Study",
        "doi": "10.1/XYZ",
        "year": 2021,
        "abstract": "Text.",
        "authors": [{"name": "Ada Lovelace", "given": "Ada", "family": "Lovelace"}],
        "references": [
            {"DOI": "10.1/A", "article-title": "First"},
            {"article-title": "Only Title"},
            {"DOI": "10.1/B"},
            {"key": "ref4", "unstructured": "no doi, no title"},
            "Bare string reference"
        ]
    }"#;

    #[test]
    fn test_parse_record() -> Result<()> {
        let record: Record = serde_json::from_str(SAMPLE)?;
        assert_eq!(record.title, "A Study");
        assert_eq!(record.references.len(), 5);
        assert!(matches!(record.year, Some(Year::Number(2021))));
        assert_eq!(record.authors[0].family, "Lovelace");
        Ok(())
    }

    #[test]
    fn test_year_as_string() -> Result<()> {
        let record: Record = serde_json::from_str(r#"{"title": "t", "year": "2020"}"#)?;
        assert_eq!(record.year.map(|y| y.to_string()), Some("2020".to_string()));
        Ok(())
    }

    #[test]
    fn test_cited_dois_normalized() -> Result<()> {
        let record: Record = serde_json::from_str(SAMPLE)?;
        assert_eq!(record.cited_dois(), vec!["10.1/a", "10.1/b"]);
        Ok(())
    }

    #[test]
    fn test_bare_string_reference() -> Result<()> {
        let record: Record = serde_json::from_str(SAMPLE)?;
        match &record.references[4] {
            ReferenceEntry::Plain(s) => assert_eq!(s, "Bare string reference"),
            other => panic!("expected plain entry, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_normalize_doi() {
        assert_eq!(normalize_doi("10.1/ABC"), "10.1/abc");
        assert_eq!(normalize_doi("  10.1/a  "), "10.1/a");
        assert_eq!(normalize_doi("https://doi.org/10.1/A"), "10.1/a");
        assert_eq!(normalize_doi("DOI:10.1/a"), "10.1/a");
    }
}
