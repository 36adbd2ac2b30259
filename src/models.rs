//! Data models for the paper pipeline.
//!
//! This module contains the core data structures passed between
//! pipeline steps: parsed papers, digests, and research gaps.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Layout roles that carry page furniture rather than paper content.
pub const FURNITURE_ROLES: [&str; 3] = ["pageHeader", "pageFooter", "pageNumber"];

/// Placeholder used when a metadata field cannot be determined.
pub const UNKNOWN: &str = "Unknown";

/// A named block of paper text, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub text: String,
}

/// A paragraph as classified by the layout model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParagraph {
    /// Layout role (`title`, `sectionHeading`, `pageHeader`, ...). None for body text.
    #[serde(default)]
    pub role: Option<String>,
    pub content: String,
}

impl RawParagraph {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }

    /// Whether this paragraph is a page header, footer or number.
    pub fn is_furniture(&self) -> bool {
        self.role
            .as_deref()
            .map(|r| FURNITURE_ROLES.contains(&r))
            .unwrap_or(false)
    }
}

/// Structured content extracted from a PDF. This is what gets cached on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub sections: Vec<Section>,
    /// Markdown-formatted tables.
    pub tables: Vec<String>,
    pub full_text: String,
    pub raw_paragraphs: Vec<RawParagraph>,
}

/// Bibliographic metadata of a paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: String,
    /// Raw author line as found in the document.
    pub authors: String,
    /// `YYYY-MM`, derived from the arXiv id.
    pub date: Option<String>,
    pub arxiv_id: Option<String>,
    pub source_url: String,
}

/// An image exported from the PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    pub path: PathBuf,
    pub caption: Option<String>,
    /// 1-indexed page number.
    pub page_number: usize,
}

/// Structured representation of a parsed academic paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperData {
    pub metadata: PaperMetadata,
    pub sections: Vec<Section>,
    /// Concatenated raw text as fallback.
    pub full_text: String,
    pub figures: Vec<Figure>,
    pub tables: Vec<String>,
    /// Original URL or file path.
    pub source: String,
}

/// Structured digest of a research paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperDigest {
    pub title: String,
    pub authors: Vec<String>,
    pub date: String,
    /// Conference or journal if detectable, else "ArXiv".
    pub venue: String,
    pub arxiv_id: Option<String>,
    pub tags: Vec<String>,
    pub key_contribution: String,
    pub methodology: String,
    pub core_results: String,
    pub limitations: String,
    /// Related concepts, phrased as note titles.
    pub connections: Vec<String>,
}

/// Research gaps and extension opportunities for a paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchGaps {
    pub open_questions: Vec<String>,
    pub extension_ideas: Vec<String>,
    /// What breaks at scale.
    pub scaling_considerations: String,
    pub methodological_gaps: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_furniture() {
        let header = RawParagraph {
            role: Some("pageHeader".to_string()),
            content: "arXiv preprint".to_string(),
        };
        let body = RawParagraph {
            role: None,
            content: "We propose".to_string(),
        };
        assert!(header.is_furniture());
        assert!(!body.is_furniture());
        assert!(!body.has_role("title"));
    }

    #[test]
    fn test_raw_paragraph_missing_role_deserializes() {
        let p: RawParagraph = serde_json::from_str(r#"{"content": "text"}"#).unwrap();
        assert_eq!(p.role, None);
    }
}
