//! # bibnotes
//!
//! Bibliographic DOI Resolution & Cross-Linked Notes Pipeline
//!
//! ## Modules
//!
//! - [`records`] - Bibliographic record model and directory scanning
//! - [`cache`] - Persistent DOI → title cache
//! - [`resolver`] - Registry client with concurrent and sequential modes
//! - [`scheduler`] - Chunked batch resolution driving the cache
//! - [`linker`] - Reference list → cross-document links
//! - [`pipeline`] - End-to-end record enrichment
//! - [`slug`] - Filesystem-safe identifiers
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bibnotes::pipeline::{self, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::new("JSON_folder", "md_folder", "doi_title_cache.json");
//!     let summary = pipeline::run(&config).await?;
//!     println!("Wrote {} notes", summary.notes_written);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod linker;
pub mod pipeline;
pub mod records;
pub mod resolver;
pub mod scheduler;
pub mod slug;

pub use error::{BibnotesError, Result};
