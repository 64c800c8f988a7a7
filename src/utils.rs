//! Utility functions for text cleanup, logging helpers, and file system checks.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse consecutive whitespace to a single space and trim the ends.
///
/// Applied to every extracted field before it lands on a record, so that
/// multi-element text joins and pretty-printed HTML collapse to clean prose.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_ws("  a\n\t b  "), "a b");
/// ```
pub fn normalize_ws(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes with an ellipsis and byte count
/// indicator appended. Used when logging unparseable dates and oversized
/// response bodies.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…(+{} bytes)", &s[..max], s.len() - max)
    }
}

/// Ensure the directory holding `out_path` exists and is writable.
///
/// Creates the parent directory if missing, then performs a write test by
/// creating and immediately deleting a probe file. Called once at startup so
/// a bad output path fails before any network traffic.
#[instrument(level = "info", skip_all, fields(out_path = %out_path.display()))]
pub async fn ensure_writable_parent(out_path: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match out_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    if let Err(e) = fs::create_dir_all(&dir).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = dir.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
