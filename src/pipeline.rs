//! Record enrichment pipeline.
//!
//! End-to-end run: scan the record directory, collect every cited DOI,
//! resolve the unknown ones through the batch scheduler, then render one
//! markdown note per record with its reference list rewritten into
//! cross-document links.

use crate::cache::TitleCache;
use crate::error::Result;
use crate::linker::{link_references, LinkedReference};
use crate::records::{load_records, Record};
use crate::resolver::{RegistryClient, ResolutionMode};
use crate::scheduler::{BatchScheduler, ChunkReport, DEFAULT_CHUNK_SIZE};
use crate::slug::{safe_slug, DEFAULT_SLUG_LEN};
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory of record JSON files
    pub records_dir: PathBuf,
    /// Output directory for markdown notes
    pub notes_dir: PathBuf,
    /// Path of the persistent DOI → title cache
    pub cache_path: PathBuf,
    pub mode: ResolutionMode,
    pub chunk_size: usize,
    pub retry_unresolved: bool,
}

impl PipelineConfig {
    pub fn new(
        records_dir: impl Into<PathBuf>,
        notes_dir: impl Into<PathBuf>,
        cache_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            records_dir: records_dir.into(),
            notes_dir: notes_dir.into(),
            cache_path: cache_path.into(),
            mode: ResolutionMode::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_unresolved: false,
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub records: usize,
    pub notes_written: usize,
    pub cited_dois: usize,
    pub resolved_titles: usize,
    pub cache_entries: usize,
    pub chunk_reports: Vec<ChunkReport>,
}

/// Full pipeline: resolve cited DOIs, then write one note per record.
pub async fn run(config: &PipelineConfig) -> Result<PipelineSummary> {
    let (records, cache, mut summary) = resolve_phase(config).await?;

    std::fs::create_dir_all(&config.notes_dir)?;
    for (path, record) in &records {
        if record.title.trim().is_empty() {
            warn!(file = %path.display(), "Record has no title, skipping note");
            continue;
        }
        let links = link_references(record, &cache);
        let note = render_note(record, &links);
        let note_path = config.notes_dir.join(note_filename(&record.title));
        match std::fs::write(&note_path, note) {
            Ok(()) => summary.notes_written += 1,
            Err(e) => warn!(file = %note_path.display(), error = %e, "Failed to write note"),
        }
    }

    info!(
        records = summary.records,
        notes = summary.notes_written,
        resolved = summary.resolved_titles,
        cached = summary.cache_entries,
        "Pipeline complete"
    );
    Ok(summary)
}

/// Resolution without note output; leaves an updated cache behind.
pub async fn resolve_only(config: &PipelineConfig) -> Result<PipelineSummary> {
    let (_records, _cache, summary) = resolve_phase(config).await?;
    info!(
        records = summary.records,
        resolved = summary.resolved_titles,
        cached = summary.cache_entries,
        "Resolution complete"
    );
    Ok(summary)
}

async fn resolve_phase(
    config: &PipelineConfig,
) -> Result<(Vec<(PathBuf, Record)>, TitleCache, PipelineSummary)> {
    let records = load_records(&config.records_dir)?;
    info!(
        records = records.len(),
        dir = %config.records_dir.display(),
        "Scanned record directory"
    );

    let cited: HashSet<String> = records
        .iter()
        .flat_map(|(_, record)| record.cited_dois())
        .collect();
    info!(dois = cited.len(), "Collected cited DOIs");

    let mut cache = TitleCache::open(&config.cache_path);
    let scheduler = BatchScheduler::new(RegistryClient::new(config.mode)?)
        .with_chunk_size(config.chunk_size)
        .retry_unresolved(config.retry_unresolved);
    let chunk_reports = scheduler.run(&cited, &mut cache).await?;

    let summary = PipelineSummary {
        records: records.len(),
        notes_written: 0,
        cited_dois: cited.len(),
        resolved_titles: cache.resolved_count(),
        cache_entries: cache.len(),
        chunk_reports,
    };
    Ok((records, cache, summary))
}

/// Render one record as a markdown note.
pub fn render_note(record: &Record, links: &[LinkedReference]) -> String {
    let mut note = String::new();
    note.push_str("# ");
    note.push_str(record.title.trim());
    note.push('\n');

    let byline = byline(record);
    if !byline.is_empty() {
        note.push('\n');
        note.push_str(&byline);
        note.push('\n');
    }

    let abstract_text = strip_html_tags(record.abstract_text.trim());
    let abstract_text = abstract_text.trim();
    if !abstract_text.is_empty() {
        note.push_str("\n## Abstract\n\n");
        note.push_str(abstract_text);
        note.push('\n');
    }

    if !links.is_empty() {
        note.push_str("\n## References\n\n");
        for link in links {
            match &link.doi {
                Some(doi) => {
                    note.push_str("- DOI: ");
                    note.push_str(doi);
                    note.push_str("\n  - [[");
                    note.push_str(&link.link_target);
                    note.push_str("]]\n");
                }
                None => {
                    note.push_str("- [[");
                    note.push_str(&link.link_target);
                    note.push_str("]]\n");
                }
            }
        }
    }

    note
}

fn byline(record: &Record) -> String {
    let authors: Vec<String> = record
        .authors
        .iter()
        .map(|a| {
            if a.name.is_empty() {
                format!("{} {}", a.given, a.family).trim().to_string()
            } else {
                a.name.clone()
            }
        })
        .filter(|n| !n.is_empty())
        .collect();
    let authors = authors.join(", ");

    match (&record.year, authors.is_empty()) {
        (Some(year), false) => format!("{} ({})", authors, year),
        (Some(year), true) => year.to_string(),
        (None, false) => authors,
        (None, true) => String::new(),
    }
}

/// Strip HTML/JATS markup from registry abstracts
fn strip_html_tags(text: &str) -> String {
    match Regex::new(r"<[^>]+>") {
        Ok(re) => re.replace_all(text, "").to_string(),
        Err(_) => text.to_string(),
    }
}

/// Note filename for a record title, without directory.
pub fn note_filename(title: &str) -> String {
    format!("{}.md", safe_slug(title, DEFAULT_SLUG_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Resolution;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html_tags("<jats:p>Hello</jats:p>"), "Hello");
        assert_eq!(strip_html_tags("No tags"), "No tags");
    }

    #[test]
    fn test_render_note_sections() -> Result<()> {
        let record: Record = serde_json::from_str(
            r#"{
                "title": "A Study of Slopes",
                "year": 2021,
                "abstract": "<jats:p>Important findings.</jats:p>",
                "authors": [{"name": "Ada Lovelace"}],
                "references": [
                    {"DOI": "10.1/a"},
                    {"article-title": "Known Inline"}
                ]
            }"#,
        )?;
        let dir = tempdir()?;
        let mut cache = TitleCache::open(dir.path().join("cache.json"));
        cache.merge(HashMap::from([(
            "10.1/a".to_string(),
            Resolution::Resolved("Title A".to_string()),
        )]));

        let links = link_references(&record, &cache);
        let note = render_note(&record, &links);

        assert!(note.starts_with("# A Study of Slopes\n"));
        assert!(note.contains("Ada Lovelace (2021)"));
        assert!(note.contains("## Abstract\n\nImportant findings.\n"));
        assert!(note.contains("- DOI: 10.1/a\n  - [[Title_A]]\n"));
        assert!(note.contains("- [[Known_Inline]]\n"));
        Ok(())
    }

    #[test]
    fn test_render_note_minimal_record() {
        let record = Record {
            title: "Bare".to_string(),
            ..Default::default()
        };
        let note = render_note(&record, &[]);
        assert_eq!(note, "# Bare\n");
    }

    #[tokio::test]
    async fn test_run_offline_with_warm_cache() -> Result<()> {
        let dir = tempdir()?;
        let records_dir = dir.path().join("records");
        std::fs::create_dir_all(&records_dir)?;
        std::fs::write(
            records_dir.join("a.json"),
            r#"{
                "title": "Citing Paper",
                "abstract": "Cites one thing.",
                "references": [{"DOI": "10.1/B"}]
            }"#,
        )?;
        std::fs::write(
            records_dir.join("b.json"),
            r#"{"title": "Cited Paper", "references": []}"#,
        )?;
        std::fs::write(records_dir.join("broken.json"), "{ nope")?;

        // warm cache covering every cited DOI, so no network is touched
        let cache_path = dir.path().join("cache.json");
        let mut cache = TitleCache::open(&cache_path);
        cache.merge(HashMap::from([(
            "10.1/b".to_string(),
            Resolution::Resolved("Cited Paper".to_string()),
        )]));
        cache.flush()?;

        let config = PipelineConfig::new(&records_dir, dir.path().join("notes"), &cache_path);
        let summary = run(&config).await?;

        assert_eq!(summary.records, 2);
        assert_eq!(summary.notes_written, 2);
        assert_eq!(summary.cited_dois, 1);
        assert!(summary.chunk_reports.is_empty());

        let note = std::fs::read_to_string(dir.path().join("notes").join("Citing_Paper.md"))?;
        assert!(note.contains("- DOI: 10.1/b\n  - [[Cited_Paper]]\n"));
        assert!(dir.path().join("notes").join("Cited_Paper.md").exists());
        Ok(())
    }
}
