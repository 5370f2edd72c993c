//! Registry client for DOI → title resolution.
//!
//! Each DOI is looked up against the works API first and, on any failure,
//! against the content-negotiated doi.org endpoint exactly once. There are
//! no retry loops: a timed-out or malformed response falls through the
//! same way as a 404, and the DOI ends up unresolved. Failures are
//! isolated per key so one bad DOI never affects the rest of a batch.
//!
//! Two execution modes share the per-DOI algorithm: a bounded-concurrency
//! pool for normal operation and a strictly sequential fallback that is an
//! order of magnitude more conservative toward the registry's rate limits.

use crate::cache::Resolution;
use crate::error::{BibnotesError, OptionExt, Result};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

/// Primary works-lookup endpoint
const WORKS_API_URL: &str = "https://api.crossref.org/works";

/// Content-negotiated fallback endpoint
const CONTENT_NEGOTIATION_URL: &str = "https://doi.org";

/// Accept header for the fallback endpoint
const CSL_JSON: &str = "application/vnd.citationstyles.csl+json";

/// Polite pool email for the registry
const MAILTO: &str = "bibnotes@example.com";

/// Per-request timeout; a timeout counts as a plain failure
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum simultaneous in-flight lookups
pub const MAX_CONCURRENT: usize = 8;

/// Inter-request delay in concurrent mode
const CONCURRENT_DELAY: Duration = Duration::from_millis(10);

/// Inter-request delay in sequential mode
const SEQUENTIAL_DELAY: Duration = Duration::from_millis(100);

/// Log progress every this many completed lookups
const PROGRESS_EVERY: usize = 50;

/// Execution mode for a resolution run.
///
/// Selected once at startup; both modes produce the same mapping for the
/// same inputs, only throughput differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    #[default]
    Concurrent,
    Sequential,
}

/// Registry client with rate limiting and a fixed two-endpoint policy.
pub struct RegistryClient {
    client: reqwest::Client,
    mode: ResolutionMode,
}

impl RegistryClient {
    pub fn new(mode: ResolutionMode) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("bibnotes/0.1 (mailto:{})", MAILTO))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BibnotesError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, mode })
    }

    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    /// Resolve a set of DOIs to titles.
    ///
    /// Every input DOI appears as a key in the output, holding either a
    /// resolved title or [`Resolution::Unresolved`].
    pub async fn resolve(&self, dois: &HashSet<String>) -> HashMap<String, Resolution> {
        if dois.is_empty() {
            return HashMap::new();
        }
        match self.mode {
            ResolutionMode::Concurrent => self.resolve_concurrent(dois).await,
            ResolutionMode::Sequential => self.resolve_sequential(dois).await,
        }
    }

    async fn resolve_concurrent(&self, dois: &HashSet<String>) -> HashMap<String, Resolution> {
        let total = dois.len();
        info!(total, workers = MAX_CONCURRENT, "Resolving DOIs (concurrent)");

        let mut out = HashMap::with_capacity(total);
        let mut lookups = stream::iter(dois.iter().cloned())
            .map(|doi| async move {
                let resolution = self.resolve_one(&doi).await;
                tokio::time::sleep(CONCURRENT_DELAY).await;
                (doi, resolution)
            })
            .buffer_unordered(MAX_CONCURRENT);

        while let Some((doi, resolution)) = lookups.next().await {
            out.insert(doi, resolution);
            if out.len() % PROGRESS_EVERY == 0 {
                debug!(completed = out.len(), total, "Resolution progress");
            }
        }

        let resolved = out.values().filter(|r| r.is_resolved()).count();
        info!(total, resolved, "Concurrent resolution complete");
        out
    }

    async fn resolve_sequential(&self, dois: &HashSet<String>) -> HashMap<String, Resolution> {
        let total = dois.len();
        info!(total, "Resolving DOIs (sequential)");

        let mut out = HashMap::with_capacity(total);
        for doi in dois {
            let resolution = self.resolve_one(doi).await;
            out.insert(doi.clone(), resolution);
            if out.len() % PROGRESS_EVERY == 0 {
                debug!(completed = out.len(), total, "Resolution progress");
            }
            tokio::time::sleep(SEQUENTIAL_DELAY).await;
        }

        let resolved = out.values().filter(|r| r.is_resolved()).count();
        info!(total, resolved, "Sequential resolution complete");
        out
    }

    /// Primary endpoint, then the single fallback, then the sentinel.
    async fn resolve_one(&self, doi: &str) -> Resolution {
        match self.fetch_primary(doi).await {
            Ok(title) => return Resolution::Resolved(title),
            Err(e) => debug!(doi, error = %e, "Primary lookup failed"),
        }
        match self.fetch_fallback(doi).await {
            Ok(title) => Resolution::Resolved(title),
            Err(e) => {
                debug!(doi, error = %e, "Fallback lookup failed");
                Resolution::Unresolved
            }
        }
    }

    async fn fetch_primary(&self, doi: &str) -> Result<String> {
        let response = self.client.get(works_url(doi)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BibnotesError::Api {
                code: status.as_u16() as i32,
                message: format!("works endpoint returned {}", status),
            });
        }
        let body: WorksResponse = response.json().await?;
        extract_work_title(body)
    }

    async fn fetch_fallback(&self, doi: &str) -> Result<String> {
        let response = self
            .client
            .get(fallback_url(doi))
            .header(reqwest::header::ACCEPT, CSL_JSON)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BibnotesError::Api {
                code: status.as_u16() as i32,
                message: format!("content negotiation returned {}", status),
            });
        }
        let body: CslWork = response.json().await?;
        extract_csl_title(body)
    }
}

fn works_url(doi: &str) -> String {
    format!("{}/{}", WORKS_API_URL, urlencoding::encode(doi))
}

fn fallback_url(doi: &str) -> String {
    format!("{}/{}", CONTENT_NEGOTIATION_URL, urlencoding::encode(doi))
}

// === Registry response types ===

#[derive(Debug, Deserialize)]
struct WorksResponse {
    message: WorkMessage,
}

#[derive(Debug, Deserialize)]
struct WorkMessage {
    #[serde(default)]
    title: Vec<String>,
}

/// CSL JSON carries `title` as either a string or an array.
#[derive(Debug, Deserialize)]
struct CslWork {
    #[serde(default)]
    title: CslTitle,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CslTitle {
    One(String),
    Many(Vec<String>),
}

impl Default for CslTitle {
    fn default() -> Self {
        CslTitle::One(String::new())
    }
}

fn extract_work_title(response: WorksResponse) -> Result<String> {
    first_nonempty(response.message.title).ok_or_parse("work has no title")
}

fn extract_csl_title(work: CslWork) -> Result<String> {
    let candidates = match work.title {
        CslTitle::One(title) => vec![title],
        CslTitle::Many(titles) => titles,
    };
    first_nonempty(candidates).ok_or_parse("CSL work has no title")
}

fn first_nonempty(titles: Vec<String>) -> Option<String> {
    titles
        .into_iter()
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_works_url_escapes_doi() {
        let url = works_url("10.1016/j.enggeo.2020.105824");
        assert_eq!(
            url,
            "https://api.crossref.org/works/10.1016%2Fj.enggeo.2020.105824"
        );
    }

    #[test]
    fn test_fallback_url_escapes_doi() {
        assert_eq!(fallback_url("10.1/a"), "https://doi.org/10.1%2Fa");
    }

    #[test]
    fn test_extract_work_title() -> Result<()> {
        let body: WorksResponse =
            serde_json::from_str(r#"{"message": {"title": ["A Real Title"]}}"#)?;
        assert_eq!(extract_work_title(body)?, "A Real Title");
        Ok(())
    }

    #[test]
    fn test_work_without_title_is_an_error() -> Result<()> {
        let missing: WorksResponse = serde_json::from_str(r#"{"message": {}}"#)?;
        assert!(extract_work_title(missing).is_err());

        let blank: WorksResponse =
            serde_json::from_str(r#"{"message": {"title": ["", "  "]}}"#)?;
        assert!(extract_work_title(blank).is_err());
        Ok(())
    }

    #[test]
    fn test_extract_csl_title_string_and_array() -> Result<()> {
        let as_string: CslWork = serde_json::from_str(r#"{"title": "From CSL"}"#)?;
        assert_eq!(extract_csl_title(as_string)?, "From CSL");

        let as_array: CslWork = serde_json::from_str(r#"{"title": ["From Array"]}"#)?;
        assert_eq!(extract_csl_title(as_array)?, "From Array");

        let missing: CslWork = serde_json::from_str(r#"{}"#)?;
        assert!(extract_csl_title(missing).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_empty_set_is_noop() -> Result<()> {
        let client = RegistryClient::new(ResolutionMode::Concurrent)?;
        let out = client.resolve(&HashSet::new()).await;
        assert!(out.is_empty());
        Ok(())
    }
}
