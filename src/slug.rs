//! Filesystem-safe identifiers derived from titles.
//!
//! Notes link to each other by filename, so every title must map to a
//! deterministic, collision-resistant identifier that is valid on all
//! platforms. Titles that filter down to nothing fall back to a content
//! hash so distinct degenerate titles never alias.

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Default maximum identifier length
pub const DEFAULT_SLUG_LEN: usize = 120;

/// Length of the hex-digest fallback identifier
const SLUG_HASH_LEN: usize = 32;

/// Characters kept verbatim besides ASCII alphanumerics
const SAFE_PUNCT: &str = "-.()";

/// Derive a filesystem-safe identifier from a title.
///
/// Applies NFKC normalization, whitelists ASCII alphanumerics plus `-_.()`,
/// turns every other character (whitespace included) into `_`, collapses
/// separator runs, trims, and truncates to `max_len`. A title that reduces
/// to nothing yields a truncated SHA-256 hex digest of the original input.
///
/// Pure and total: never fails, never returns an empty string.
pub fn safe_slug(title: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;

    for ch in title.nfkc() {
        let keep = ch.is_ascii_alphanumeric() || SAFE_PUNCT.contains(ch);
        if keep {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch);
        } else {
            // whitespace, '_' itself, and everything outside the whitelist
            // all collapse into a single separator
            pending_sep = true;
        }
    }

    slug.truncate(max_len);
    while slug.ends_with('_') {
        slug.pop();
    }

    if slug.is_empty() {
        let digest = Sha256::digest(title.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        let take = SLUG_HASH_LEN.min(max_len.max(1));
        hex[..take].to_string()
    } else {
        slug
    }
}
