//! Obsidian vault scanning.
//!
//! A vault is a directory tree of Markdown notes; a note's title is its
//! file stem. Hidden directories such as `.obsidian/` and `.trash/` are
//! skipped.

use crate::models::PaperData;
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("valid word split regex"));

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Collect the sorted titles of all notes under `vault_path`.
pub fn scan_vault(vault_path: &Path) -> Result<Vec<String>> {
    if !vault_path.exists() {
        bail!("Vault path not found: {}", vault_path.display());
    }
    if !vault_path.is_dir() {
        bail!("Vault path is not a directory: {}", vault_path.display());
    }

    let mut titles = Vec::new();
    let walker = WalkDir::new(vault_path).into_iter().filter_entry(|e| !is_hidden(e));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable vault entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if !stem.is_empty() {
                titles.push(stem.to_string());
            }
        }
    }

    titles.sort();
    info!("Scanned {} notes from {}", titles.len(), vault_path.display());
    Ok(titles)
}

/// Keep the `max_notes` titles most related to the paper.
///
/// Titles are scored by how many of their words appear among the keywords
/// and the paper title's words. Ties are broken alphabetically.
pub fn filter_vault_notes(
    titles: Vec<String>,
    keywords: &[String],
    paper_title: &str,
    max_notes: usize,
) -> Vec<String> {
    if titles.len() <= max_notes {
        return titles;
    }

    let mut wanted: HashSet<String> = HashSet::new();
    for keyword in keywords {
        wanted.extend(
            keyword
                .to_lowercase()
                .replace('-', " ")
                .split_whitespace()
                .map(String::from),
        );
    }
    wanted.extend(
        NON_WORD
            .split(&paper_title.to_lowercase())
            .filter(|w| w.chars().count() > 2)
            .map(String::from),
    );

    let total = titles.len();
    let mut scored: Vec<(usize, String)> = titles
        .into_iter()
        .map(|title| {
            let lower = title.to_lowercase();
            let words: HashSet<&str> = NON_WORD.split(&lower).collect();
            let overlap = words.iter().filter(|w| wanted.contains(**w)).count();
            (overlap, title)
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.truncate(max_notes);

    info!("Filtered {} vault notes down to {} relevant notes", total, scored.len());
    scored.into_iter().map(|(_, title)| title).collect()
}

/// Keywords used to pre-filter a large vault before the paper is digested.
///
/// Title words longer than three characters plus the section names.
pub fn paper_keywords(paper: &PaperData) -> Vec<String> {
    paper
        .metadata
        .title
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .map(str::to_lowercase)
        .chain(paper.sections.iter().map(|s| s.name.clone()))
        .collect()
}
