//! Paper acquisition and parsing.
//!
//! This module turns a URL or local PDF into `PaperData`: the PDF is
//! fetched, its layout analysed (with an on-disk cache), metadata derived
//! and embedded figures exported.

pub mod cache;
pub mod extract;
pub mod fetch;
pub mod figures;
pub mod metadata;

pub use extract::extract_content;
pub use fetch::{fetch_pdf, FetchOptions};
pub use figures::{extract_figures, FigureFilter};
pub use metadata::extract_metadata;

use crate::config::{Config, DocumentConfig};
use crate::models::PaperData;
use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

/// Everything `parse_paper` needs besides the source itself.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub document: DocumentConfig,
    pub figures: FigureFilter,
    pub show_progress: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            document: DocumentConfig::default(),
            figures: FigureFilter::default(),
            show_progress: false,
        }
    }
}

impl From<&Config> for ParseOptions {
    fn from(config: &Config) -> Self {
        Self {
            document: config.document.clone(),
            figures: FigureFilter {
                min_bytes: config.note.min_figure_bytes,
                min_side: config.note.min_figure_side,
            },
            show_progress: false,
        }
    }
}

impl ParseOptions {
    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            download_dir: self.document.effective_cache_dir(),
            timeout_seconds: self.document.download_timeout_seconds,
            reuse_downloads: self.document.use_cache,
        }
    }
}

/// Fetch, analyse and assemble a paper.
///
/// Figures are written to `<output_dir>/figures`. Figure extraction
/// failures are logged and yield no figures.
pub async fn parse_paper(source: &str, output_dir: &Path, options: &ParseOptions) -> Result<PaperData> {
    std::fs::create_dir_all(output_dir)?;

    info!("Fetching PDF from: {}", source);
    let pdf_path = fetch_pdf(source, &options.fetch_options()).await?;

    let content = extract_content(&pdf_path, &options.document, options.show_progress).await?;

    let metadata = extract_metadata(&content, source);
    info!("Title: {}", metadata.title);

    let figures_dir = output_dir.join("figures");
    let figures = match extract_figures(&pdf_path, &figures_dir, &options.figures) {
        Ok(figures) => figures,
        Err(e) => {
            warn!("Figure extraction failed (non-fatal): {:#}", e);
            Vec::new()
        }
    };

    let paper = PaperData {
        metadata,
        sections: content.sections,
        full_text: content.full_text,
        figures,
        tables: content.tables,
        source: source.to_string(),
    };

    info!(
        "Parsed paper: {} sections, {} figures, {} tables",
        paper.sections.len(),
        paper.figures.len(),
        paper.tables.len()
    );

    Ok(paper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedContent, RawParagraph, Section};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_parse_paper_from_cache() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("vall-e.pdf");
        // Not a real PDF: figure extraction fails and must not abort parsing
        std::fs::write(&pdf, b"%PDF-1.4 stub").unwrap();

        let content = ExtractedContent {
            sections: vec![Section {
                name: "Abstract".to_string(),
                text: "We introduce VALL-E.\n\n".to_string(),
            }],
            tables: vec![],
            full_text: "Neural Codec Language Models\nWe introduce VALL-E.".to_string(),
            raw_paragraphs: vec![RawParagraph {
                role: Some("title".to_string()),
                content: "Neural Codec Language Models".to_string(),
            }],
        };
        cache::save_cache(&pdf, &content);

        let out = dir.path().join("out");
        let paper = parse_paper(pdf.to_str().unwrap(), &out, &ParseOptions::default())
            .await
            .unwrap();

        assert_eq!(paper.metadata.title, "Neural Codec Language Models");
        assert_eq!(paper.sections.len(), 1);
        assert!(paper.figures.is_empty());
        assert_eq!(paper.source, pdf.to_str().unwrap());
    }

    #[test]
    fn test_parse_options_from_config() {
        let mut config = Config::default();
        config.note.min_figure_side = 50;
        config.document.use_cache = false;

        let options = ParseOptions::from(&config);
        assert_eq!(options.figures.min_side, 50);
        assert!(!options.fetch_options().reuse_downloads);
    }
}
