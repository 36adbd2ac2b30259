//! Best-effort bibliographic metadata from layout output and source URL.

use crate::models::{ExtractedContent, PaperMetadata, UNKNOWN};
use once_cell::sync::Lazy;
use regex::Regex;

static ARXIV_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"arxiv\.org/(?:abs|pdf)/(\d+\.\d+)").expect("valid arXiv regex"));

/// Extract paper metadata from parsed content and the source URL.
pub fn extract_metadata(content: &ExtractedContent, source: &str) -> PaperMetadata {
    let paragraphs = &content.raw_paragraphs;

    let title_idx = paragraphs.iter().position(|p| p.has_role("title"));
    let title = match title_idx {
        Some(idx) => paragraphs[idx].content.trim().to_string(),
        None => content
            .full_text
            .lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string()),
    };

    // Authors: whatever sits between the title and the first heading or abstract
    let mut authors = UNKNOWN.to_string();
    if let Some(idx) = title_idx {
        let mut parts = Vec::new();
        for para in &paragraphs[idx + 1..] {
            let text = para.content.trim();
            if para.has_role("sectionHeading") || text.to_lowercase().starts_with("abstract") {
                break;
            }
            if para.is_furniture() {
                continue;
            }
            if !text.is_empty() {
                parts.push(text);
            }
        }
        if !parts.is_empty() {
            authors = parts.join(" ");
        }
    }

    let arxiv_id = arxiv_id(source);
    let date = arxiv_id.as_deref().and_then(date_from_arxiv_id);

    PaperMetadata {
        title,
        authors,
        date,
        arxiv_id,
        source_url: source.to_string(),
    }
}

/// arXiv identifier (`2301.02111`) from an abs or pdf URL.
pub fn arxiv_id(source: &str) -> Option<String> {
    ARXIV_ID
        .captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// `YYYY-MM` from the `YYMM` prefix of a modern arXiv id.
fn date_from_arxiv_id(id: &str) -> Option<String> {
    let yymm = id.get(..4)?;
    let year: u32 = yymm[..2].parse().ok()?;
    let month: u32 = yymm[2..].parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some(format!("{}-{:02}", 2000 + year, month))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawParagraph;

    fn para(role: Option<&str>, content: &str) -> RawParagraph {
        RawParagraph {
            role: role.map(String::from),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_metadata_from_paragraphs() {
        let content = ExtractedContent {
            raw_paragraphs: vec![
                para(Some("pageHeader"), "Preprint"),
                para(Some("title"), "  Neural Codec Language Models  "),
                para(None, "Chengyi Wang, Sanyuan Chen"),
                para(Some("pageFooter"), "1"),
                para(None, "Microsoft"),
                para(None, "Abstract We introduce..."),
                para(None, "Ignored"),
            ],
            ..Default::default()
        };

        let meta = extract_metadata(&content, "https://arxiv.org/abs/2301.02111");
        assert_eq!(meta.title, "Neural Codec Language Models");
        assert_eq!(meta.authors, "Chengyi Wang, Sanyuan Chen Microsoft");
        assert_eq!(meta.arxiv_id.as_deref(), Some("2301.02111"));
        assert_eq!(meta.date.as_deref(), Some("2023-01"));
        assert_eq!(meta.source_url, "https://arxiv.org/abs/2301.02111");
    }

    #[test]
    fn test_title_falls_back_to_first_line() {
        let content = ExtractedContent {
            full_text: "A Fallback Title\nmore text".to_string(),
            ..Default::default()
        };
        let meta = extract_metadata(&content, "./paper.pdf");
        assert_eq!(meta.title, "A Fallback Title");
        assert_eq!(meta.authors, "Unknown");
        assert!(meta.arxiv_id.is_none());
        assert!(meta.date.is_none());
    }

    #[test]
    fn test_empty_content_is_unknown() {
        let meta = extract_metadata(&ExtractedContent::default(), "./paper.pdf");
        assert_eq!(meta.title, "Unknown");
    }

    #[test]
    fn test_authors_stop_at_heading() {
        let content = ExtractedContent {
            raw_paragraphs: vec![
                para(Some("title"), "T"),
                para(Some("sectionHeading"), "1 Introduction"),
                para(None, "Not an author"),
            ],
            ..Default::default()
        };
        assert_eq!(extract_metadata(&content, "x").authors, "Unknown");
    }

    #[test]
    fn test_arxiv_id_from_pdf_url() {
        assert_eq!(
            arxiv_id("https://arxiv.org/pdf/1706.03762v7.pdf").as_deref(),
            Some("1706.03762")
        );
        assert_eq!(date_from_arxiv_id("1706.03762").as_deref(), Some("2017-06"));
        assert_eq!(date_from_arxiv_id("1799.00001"), None);
    }
}
