//! On-disk cache for document analysis results.
//!
//! The cache lives next to the PDF as `<file>.pdf.cache.json`.

use crate::models::ExtractedContent;
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const CACHE_SUFFIX: &str = ".cache.json";

/// Cache file path for a given PDF.
pub fn cache_path(pdf_path: &Path) -> PathBuf {
    let mut name: OsString = pdf_path.as_os_str().to_owned();
    name.push(CACHE_SUFFIX);
    PathBuf::from(name)
}

/// Load a cached analysis result if one exists and parses.
pub fn load_cache(pdf_path: &Path) -> Option<ExtractedContent> {
    let path = cache_path(pdf_path);
    if !path.exists() {
        debug!("No cache at {}", path.display());
        return None;
    }

    let parsed = std::fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| serde_json::from_str::<ExtractedContent>(&raw).map_err(Into::into));

    match parsed {
        Ok(content) => {
            info!("Loaded cached analysis from {}", path.display());
            Some(content)
        }
        Err(e) => {
            warn!("Cache file corrupt, ignoring {}: {}", path.display(), e);
            None
        }
    }
}

/// Save an analysis result. Failures are logged, never fatal.
pub fn save_cache(pdf_path: &Path, content: &ExtractedContent) {
    let path = cache_path(pdf_path);
    let result = serde_json::to_vec_pretty(content)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| write_atomic(&path, &bytes));

    match result {
        Ok(()) => info!("Saved analysis cache to {}", path.display()),
        Err(e) => warn!("Failed to save cache {}: {}", path.display(), e),
    }
}

/// Write a file by renaming a fully written temp file over it.
///
/// Readers never observe a partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}
