//! Chunked scheduling of DOI resolution.
//!
//! The scheduler owns the cache for the duration of a run. It computes
//! which DOIs still need an attempt, partitions them into fixed-size
//! chunks, and drives the registry client one chunk at a time: resolve,
//! merge into the cache, flush, report. Flushing after every chunk bounds
//! the cost of an interrupted run to one chunk of lookups. A chunk where
//! every lookup fails is recorded and the run continues; only a cache
//! flush failure aborts.

use crate::cache::TitleCache;
use crate::error::Result;
use crate::records::normalize_doi;
use crate::resolver::RegistryClient;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default number of DOIs per resolution chunk
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Politeness pause between chunks
const INTER_CHUNK_PAUSE: Duration = Duration::from_secs(1);

/// Outcome counts for one completed chunk.
#[derive(Debug, Clone)]
pub struct ChunkReport {
    /// 1-based chunk number
    pub index: usize,
    pub total_chunks: usize,
    pub attempted: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub elapsed: Duration,
}

/// Drives chunked resolution against a registry client.
pub struct BatchScheduler {
    client: RegistryClient,
    chunk_size: usize,
    retry_unresolved: bool,
}

impl BatchScheduler {
    pub fn new(client: RegistryClient) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_unresolved: false,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Also re-attempt DOIs that already hold the sentinel.
    ///
    /// Off by default: an attempted-and-failed DOI is "known" and is not
    /// retried until explicitly requested.
    pub fn retry_unresolved(mut self, retry: bool) -> Self {
        self.retry_unresolved = retry;
        self
    }

    /// Resolve everything in `all_dois` that the cache does not know yet.
    ///
    /// Returns one report per processed chunk. The cache is flushed after
    /// each chunk; a flush error is the only fatal outcome.
    pub async fn run(
        &self,
        all_dois: &HashSet<String>,
        cache: &mut TitleCache,
    ) -> Result<Vec<ChunkReport>> {
        let need = pending_dois(all_dois, cache, self.retry_unresolved);
        if need.is_empty() {
            info!(known = cache.len(), "No DOIs need resolution");
            return Ok(Vec::new());
        }

        let total_chunks = (need.len() + self.chunk_size - 1) / self.chunk_size;
        info!(
            pending = need.len(),
            chunks = total_chunks,
            chunk_size = self.chunk_size,
            "Starting batch resolution"
        );

        let mut reports = Vec::with_capacity(total_chunks);
        for (idx, chunk) in need.chunks(self.chunk_size).enumerate() {
            let index = idx + 1;
            let started = Instant::now();

            let chunk_set: HashSet<String> = chunk.iter().cloned().collect();
            let results = self.client.resolve(&chunk_set).await;

            let attempted = results.len();
            let resolved = results.values().filter(|r| r.is_resolved()).count();
            let unresolved = attempted - resolved;

            cache.merge(results);
            cache.flush()?;

            if resolved == 0 && attempted > 0 {
                warn!(chunk = index, attempted, "Chunk resolved nothing");
            }
            let elapsed = started.elapsed();
            info!(
                chunk = index,
                total_chunks,
                resolved,
                unresolved,
                elapsed_secs = elapsed.as_secs_f64(),
                cached_titles = cache.resolved_count(),
                "Chunk complete"
            );
            reports.push(ChunkReport {
                index,
                total_chunks,
                attempted,
                resolved,
                unresolved,
                elapsed,
            });

            if index < total_chunks {
                tokio::time::sleep(INTER_CHUNK_PAUSE).await;
            }
        }

        Ok(reports)
    }
}

/// DOIs from `all` that still need a resolution attempt.
///
/// Candidates are normalized, deduplicated, and sorted so chunk
/// boundaries are stable between runs. A DOI holding the sentinel counts
/// as known unless `retry_unresolved` is set.
pub fn pending_dois(
    all: &HashSet<String>,
    cache: &TitleCache,
    retry_unresolved: bool,
) -> Vec<String> {
    let mut need: Vec<String> = all
        .iter()
        .map(|doi| normalize_doi(doi))
        .filter(|doi| !doi.is_empty())
        .filter(|doi| {
            if retry_unresolved {
                !cache.is_resolved(doi)
            } else {
                !cache.contains(doi)
            }
        })
        .collect();
    need.sort();
    need.dedup();
    need
}
