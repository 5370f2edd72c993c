//! Persistent DOI → title cache.
//!
//! The cache is a single JSON object mapping lower-cased DOIs to titles,
//! kept human-inspectable on disk. A resolution that was attempted and
//! failed is stored as the reserved literal `"Unknown"`; in memory that
//! state is a tagged variant so it can never be confused with a real
//! title. The file is rewritten after every batch, so interrupting a run
//! loses at most one batch of work.

use crate::error::Result;
use crate::records::normalize_doi;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reserved literal meaning "resolution attempted and failed".
///
/// Only used at the persistence boundary; a genuine title equal to this
/// literal would round-trip as unresolved.
pub const UNRESOLVED_LITERAL: &str = "Unknown";

/// Outcome of resolving one DOI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The registry returned a non-empty title.
    Resolved(String),
    /// Both endpoints were tried and neither yielded a title.
    Unresolved,
}

impl Resolution {
    /// Display form; the sentinel literal for unresolved entries.
    pub fn as_str(&self) -> &str {
        match self {
            Resolution::Resolved(title) => title,
            Resolution::Unresolved => UNRESOLVED_LITERAL,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == UNRESOLVED_LITERAL {
            Ok(Resolution::Unresolved)
        } else {
            Ok(Resolution::Resolved(raw))
        }
    }
}

/// Persistent map of every DOI resolution attempted so far.
///
/// Owned mutably by the batch scheduler during a run; the linker only
/// reads it. All keys are normalized on the way in and out.
pub struct TitleCache {
    path: PathBuf,
    entries: HashMap<String, Resolution>,
}

impl TitleCache {
    /// Load the cache at `path`, or start empty.
    ///
    /// A corrupt or unreadable file is reported loudly and treated as
    /// empty: losing entries only costs re-resolution time.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load_entries(&path);
        Self { path, entries }
    }

    fn load_entries(path: &Path) -> HashMap<String, Resolution> {
        if !path.exists() {
            debug!(path = %path.display(), "No cache file, starting empty");
            return HashMap::new();
        }
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read cache, starting empty");
                return HashMap::new();
            }
        };
        match serde_json::from_str::<HashMap<String, Resolution>>(&content) {
            Ok(raw) => {
                let entries: HashMap<String, Resolution> = raw
                    .into_iter()
                    .map(|(doi, res)| (normalize_doi(&doi), res))
                    .collect();
                info!(path = %path.display(), entries = entries.len(), "Loaded title cache");
                entries
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Corrupt cache file, starting empty; previous resolutions will be re-attempted"
                );
                HashMap::new()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries holding a real title.
    pub fn resolved_count(&self) -> usize {
        self.entries.values().filter(|r| r.is_resolved()).count()
    }

    /// Whether this DOI has been attempted, successfully or not.
    pub fn contains(&self, doi: &str) -> bool {
        self.entries.contains_key(&normalize_doi(doi))
    }

    /// Whether this DOI holds a real title.
    pub fn is_resolved(&self, doi: &str) -> bool {
        matches!(
            self.entries.get(&normalize_doi(doi)),
            Some(Resolution::Resolved(_))
        )
    }

    pub fn get(&self, doi: &str) -> Option<&Resolution> {
        self.entries.get(&normalize_doi(doi))
    }

    /// Resolved title for this DOI, if any.
    pub fn title(&self, doi: &str) -> Option<&str> {
        match self.entries.get(&normalize_doi(doi)) {
            Some(Resolution::Resolved(title)) => Some(title),
            _ => None,
        }
    }

    /// Union `updates` into the cache; later values win per key.
    pub fn merge(&mut self, updates: HashMap<String, Resolution>) {
        for (doi, resolution) in updates {
            self.entries.insert(normalize_doi(&doi), resolution);
        }
    }

    /// Drop every sentinel entry so those DOIs become candidates again.
    pub fn clear_unresolved(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, r| r.is_resolved());
        before - self.entries.len()
    }

    /// Persist the cache atomically.
    ///
    /// Writes a sibling temp file and renames it over the target, so a
    /// crash mid-write can never leave an unparseable cache. This is the
    /// one fatal error path of a run.
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.entries)?;

        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "doi_title_cache.json".into());
        name.push(".tmp");
        let tmp = self.path.with_file_name(name);

        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = self.entries.len(), "Flushed title cache");
        Ok(())
    }
}
