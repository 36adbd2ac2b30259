//! Markdown note generation.
//!
//! This module renders an Obsidian note from the parsed paper, its digest
//! and (optionally) research gaps and linked vault concepts.

use crate::models::{Figure, PaperData, PaperDigest, ResearchGaps};
use crate::paper::cache::write_atomic;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid regex"));

const MAX_FILENAME_LEN: usize = 60;

/// Rendering options taken from the `[note]` configuration.
#[derive(Debug, Clone)]
pub struct NoteOptions {
    pub figures_subdir: String,
    pub include_tables: bool,
}

impl Default for NoteOptions {
    fn default() -> Self {
        Self {
            figures_subdir: "attachments".to_string(),
            include_tables: true,
        }
    }
}

impl From<&crate::config::NoteConfig> for NoteOptions {
    fn from(config: &crate::config::NoteConfig) -> Self {
        Self {
            figures_subdir: config.figures_subdir.clone(),
            include_tables: config.include_tables,
        }
    }
}

/// A figure as embedded in the note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFigure {
    pub filename: String,
    pub caption: Option<String>,
    pub page_number: usize,
}

/// Turn a paper title into a clean file name (without extension).
///
/// `Neural Codec Language Models are Zero-Shot Text to Speech Synthesizers`
/// becomes `neural-codec-language-models-are-zero-shot-text-to-speech`.
pub fn sanitize_filename(title: &str) -> String {
    let lower = title.to_lowercase();
    let name = UNSAFE_CHARS.replace_all(&lower, "");
    let name = WHITESPACE.replace_all(&name, "-");
    let name = DASHES.replace_all(name.trim_matches('-'), "-").into_owned();

    // Only ASCII survives the filter, so byte slicing is safe
    let name = if name.len() > MAX_FILENAME_LEN {
        let head = &name[..MAX_FILENAME_LEN];
        match head.rfind('-') {
            Some(idx) => head[..idx].to_string(),
            None => head.to_string(),
        }
    } else {
        name
    };

    let name = name.trim_matches('-');
    if name.is_empty() {
        "untitled".to_string()
    } else {
        name.to_string()
    }
}

/// Copy figure images into `<output_dir>/<subdir>`. Missing files are skipped.
pub fn copy_figures(figures: &[Figure], output_dir: &Path, subdir: &str) -> Result<Vec<NoteFigure>> {
    let target_dir = output_dir.join(subdir);
    fs::create_dir_all(&target_dir)
        .with_context(|| format!("Failed to create {}", target_dir.display()))?;

    let mut copied = Vec::new();
    for figure in figures {
        let Some(filename) = figure.path.file_name().and_then(|n| n.to_str()) else {
            warn!("Figure has no file name, skipping: {}", figure.path.display());
            continue;
        };
        if !figure.path.exists() {
            warn!("Figure not found, skipping: {}", figure.path.display());
            continue;
        }

        let dest = target_dir.join(filename);
        if !is_same_file(&figure.path, &dest) {
            fs::copy(&figure.path, &dest)
                .with_context(|| format!("Failed to copy figure to {}", dest.display()))?;
        }

        copied.push(NoteFigure {
            filename: filename.to_string(),
            caption: figure.caption.clone(),
            page_number: figure.page_number,
        });
    }

    Ok(copied)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Render the note and write it to `<output_dir>/<sanitized title>.md`.
pub fn render_note(
    paper: &PaperData,
    digest: &PaperDigest,
    gaps: Option<&ResearchGaps>,
    linked_concepts: Option<&[String]>,
    output_dir: &Path,
    options: &NoteOptions,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let figures = copy_figures(&paper.figures, output_dir, &options.figures_subdir)?;
    info!(
        "Copied {} figures to {}",
        figures.len(),
        output_dir.join(&options.figures_subdir).display()
    );

    let created = chrono::Local::now().date_naive();
    let markdown = generate_note_markdown(paper, digest, gaps, &figures, linked_concepts, options, created);

    let note_path = output_dir.join(format!("{}.md", sanitize_filename(&digest.title)));
    write_atomic(&note_path, markdown.as_bytes())?;

    info!("Note written to {}", note_path.display());
    Ok(note_path)
}

/// Generate the complete Markdown note.
pub fn generate_note_markdown(
    paper: &PaperData,
    digest: &PaperDigest,
    gaps: Option<&ResearchGaps>,
    figures: &[NoteFigure],
    linked_concepts: Option<&[String]>,
    options: &NoteOptions,
    created: NaiveDate,
) -> String {
    let mut output = String::new();

    output.push_str(&generate_front_matter(paper, digest, created));

    output.push_str(&format!("# {}\n\n", digest.title));
    output.push_str(&format!(
        "**Authors:** {} | **Venue:** {} | **Date:** {}\n\n",
        digest.authors.join(", "),
        digest.venue,
        digest.date
    ));
    match &digest.arxiv_id {
        Some(id) => output.push_str(&format!(
            "**Source:** [arXiv:{}](https://arxiv.org/abs/{})\n\n",
            id, id
        )),
        None => output.push_str(&format!("**Source:** {}\n\n", paper.source)),
    }

    output.push_str(&prose_section("Key Contribution", &digest.key_contribution));
    output.push_str(&prose_section("Methodology", &digest.methodology));
    output.push_str(&prose_section("Core Results", &digest.core_results));
    output.push_str(&prose_section("Limitations", &digest.limitations));

    output.push_str(&generate_figures_section(figures));
    if options.include_tables {
        output.push_str(&generate_tables_section(&paper.tables));
    }
    if let Some(gaps) = gaps {
        output.push_str(&generate_gaps_section(gaps));
    }
    output.push_str(&generate_connections_section(&digest.connections));
    if let Some(concepts) = linked_concepts {
        output.push_str(&generate_linked_section(concepts));
    }

    output.push_str("---\n\n*Note generated by Distill*\n");

    output
}

/// Quote a value for YAML.
fn yaml_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Generate the YAML front matter.
fn generate_front_matter(paper: &PaperData, digest: &PaperDigest, created: NaiveDate) -> String {
    let mut fm = String::new();

    fm.push_str("---\n");
    fm.push_str(&format!("title: {}\n", yaml_string(&digest.title)));
    fm.push_str("authors:\n");
    for author in &digest.authors {
        fm.push_str(&format!("  - {}\n", yaml_string(author)));
    }
    fm.push_str(&format!("date: {}\n", yaml_string(&digest.date)));
    fm.push_str(&format!("venue: {}\n", yaml_string(&digest.venue)));
    if let Some(id) = &digest.arxiv_id {
        fm.push_str(&format!("arxiv_id: {}\n", yaml_string(id)));
    }
    fm.push_str(&format!("source: {}\n", yaml_string(&paper.source)));
    fm.push_str("tags:\n  - paper\n");
    for tag in &digest.tags {
        fm.push_str(&format!("  - {}\n", yaml_string(tag)));
    }
    fm.push_str(&format!("created: {}\n", created.format("%Y-%m-%d")));
    fm.push_str("---\n\n");

    fm
}

fn prose_section(heading: &str, text: &str) -> String {
    let body = if text.trim().is_empty() { "_Not available._" } else { text.trim() };
    format!("## {}\n\n{}\n\n", heading, body)
}

fn bullet_list(items: &[String]) -> String {
    let mut list = String::new();
    for item in items {
        list.push_str(&format!("- {}\n", item));
    }
    list.push('\n');
    list
}

/// Generate the figures section.
fn generate_figures_section(figures: &[NoteFigure]) -> String {
    if figures.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Figures\n\n");

    for figure in figures {
        section.push_str(&format!("![[{}]]\n", figure.filename));
        match &figure.caption {
            Some(caption) => section.push_str(&format!("*{}* (page {})\n\n", caption, figure.page_number)),
            None => section.push_str(&format!("*Page {}*\n\n", figure.page_number)),
        }
    }

    section
}

/// Generate the tables section.
fn generate_tables_section(tables: &[String]) -> String {
    if tables.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Tables\n\n");

    for (i, table) in tables.iter().enumerate() {
        section.push_str(&format!("### Table {}\n\n", i + 1));
        section.push_str(table.trim_end());
        section.push_str("\n\n");
    }

    section
}

/// Generate the research gaps section.
fn generate_gaps_section(gaps: &ResearchGaps) -> String {
    let mut section = String::new();
    section.push_str("## Research Gaps\n\n");

    if !gaps.open_questions.is_empty() {
        section.push_str("### Open Questions\n\n");
        section.push_str(&bullet_list(&gaps.open_questions));
    }
    if !gaps.extension_ideas.is_empty() {
        section.push_str("### Extension Ideas\n\n");
        section.push_str(&bullet_list(&gaps.extension_ideas));
    }
    if !gaps.scaling_considerations.trim().is_empty() {
        section.push_str("### Scaling Considerations\n\n");
        section.push_str(gaps.scaling_considerations.trim());
        section.push_str("\n\n");
    }
    if !gaps.methodological_gaps.is_empty() {
        section.push_str("### Methodological Gaps\n\n");
        section.push_str(&bullet_list(&gaps.methodological_gaps));
    }

    section
}

/// Generate the connections section as wikilinks.
fn generate_connections_section(connections: &[String]) -> String {
    if connections.is_empty() {
        return String::new();
    }

    let links: Vec<String> = connections.iter().map(|c| format!("[[{}]]", c)).collect();
    format!("## Connections\n\n{}", bullet_list(&links))
}

/// Generate the section listing vault notes linked in the prose.
fn generate_linked_section(concepts: &[String]) -> String {
    if concepts.is_empty() {
        return String::new();
    }

    let links: Vec<String> = concepts.iter().map(|c| format!("[[{}]]", c)).collect();
    format!("## Linked Vault Concepts\n\n{}", bullet_list(&links))
}
