//! Layout extraction through Azure Document Intelligence.
//!
//! The PDF is submitted to the `prebuilt-layout` model, the long-running
//! operation is polled until it settles, and the resulting paragraphs and
//! tables are folded into sections and Markdown tables.

use crate::config::DocumentConfig;
use crate::error::DistillError;
use crate::models::{ExtractedContent, RawParagraph, Section};
use crate::paper::cache::{load_cache, save_cache};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION: &str = "operation-location";

/// Status document of a long-running analysis.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<Value>,
}

/// The subset of `analyzeResult` this tool reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub paragraphs: Vec<RawParagraph>,
    #[serde(default)]
    pub tables: Vec<DocumentTable>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTable {
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default)]
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    pub row_index: usize,
    pub column_index: usize,
    #[serde(default)]
    pub row_span: Option<usize>,
    #[serde(default)]
    pub column_span: Option<usize>,
    #[serde(default)]
    pub content: String,
}

/// Client for the Document Intelligence REST API.
pub struct DocumentClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    model_id: String,
    poll_interval: Duration,
    max_polls: usize,
    request_timeout_seconds: u64,
    show_progress: bool,
}

impl DocumentClient {
    /// Create a client, failing if the endpoint or key is missing.
    pub fn new(config: &DocumentConfig, show_progress: bool) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(DistillError::MissingCredential("AZURE_DOC_INTEL_ENDPOINT"))?;
        let api_key = config
            .api_key
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(DistillError::MissingCredential("AZURE_DOC_INTEL_KEY"))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_version: config.api_version.clone(),
            model_id: config.model_id.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls,
            request_timeout_seconds: config.request_timeout_seconds,
            show_progress,
        })
    }

    /// Submit a PDF and wait for the analysis result.
    pub async fn analyze(&self, pdf: Vec<u8>) -> Result<AnalyzeResult> {
        let url = format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model_id, self.api_version
        );
        debug!("Submitting {} bytes to {}", pdf.len(), url);

        let response = self
            .http_client
            .post(&url)
            .header(KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/pdf")
            .body(pdf)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!(
                        "Document Intelligence request timed out after {}s",
                        self.request_timeout_seconds
                    )
                } else if e.is_connect() {
                    anyhow::anyhow!("Cannot connect to Document Intelligence at {}", self.endpoint)
                } else {
                    anyhow::anyhow!("Failed to submit document: {}", e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DistillError::Api {
                service: "Document Intelligence",
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let operation_url = response
            .headers()
            .get(OPERATION_LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .context("Document Intelligence response has no Operation-Location header")?;
        let mut delay = retry_after(response.headers()).unwrap_or(self.poll_interval);

        let spinner = self.spinner();
        let result = self.poll(&operation_url, &mut delay, spinner.as_ref()).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        result
    }

    async fn poll(
        &self,
        operation_url: &str,
        delay: &mut Duration,
        spinner: Option<&ProgressBar>,
    ) -> Result<AnalyzeResult> {
        for attempt in 1..=self.max_polls {
            tokio::time::sleep(*delay).await;

            let response = self
                .http_client
                .get(operation_url)
                .header(KEY_HEADER, &self.api_key)
                .send()
                .await
                .context("Failed to poll analysis status")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DistillError::Api {
                    service: "Document Intelligence",
                    status: status.as_u16(),
                    body,
                }
                .into());
            }

            *delay = retry_after(response.headers()).unwrap_or(self.poll_interval);
            let operation: AnalyzeOperation = response
                .json()
                .await
                .context("Failed to parse analysis status")?;

            if let Some(pb) = spinner {
                pb.set_message(format!("Analysing layout ({}, poll {})", operation.status, attempt));
            }

            match operation.status.as_str() {
                "succeeded" => {
                    return operation
                        .analyze_result
                        .context("Analysis succeeded but returned no analyzeResult");
                }
                "failed" | "canceled" => {
                    let message = operation
                        .error
                        .as_ref()
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .unwrap_or(&operation.status)
                        .to_string();
                    return Err(DistillError::AnalysisFailed(message).into());
                }
                other => debug!("Analysis status after poll {}: {}", attempt, other),
            }
        }

        Err(DistillError::AnalysisTimeout(self.max_polls).into())
    }

    fn spinner(&self) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Analysing layout");
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

/// Parse a `Retry-After` header given in seconds.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Extract structured content from a PDF, using the cache when allowed.
pub async fn extract_content(
    pdf_path: &Path,
    config: &DocumentConfig,
    show_progress: bool,
) -> Result<ExtractedContent> {
    if config.use_cache {
        if let Some(cached) = load_cache(pdf_path) {
            return Ok(cached);
        }
    }

    let client = DocumentClient::new(config, show_progress)?;
    let bytes = std::fs::read(pdf_path)
        .with_context(|| format!("Failed to read PDF: {}", pdf_path.display()))?;

    info!("Sending PDF to Azure Document Intelligence...");
    let result = client.analyze(bytes).await?;
    info!("Analysis complete.");

    let content = build_content(result);
    save_cache(pdf_path, &content);
    Ok(content)
}

/// Fold an analysis result into sections, tables and raw paragraphs.
pub fn build_content(result: AnalyzeResult) -> ExtractedContent {
    let sections = group_sections(&result.paragraphs);
    let tables = result.tables.iter().map(table_to_markdown).collect();

    ExtractedContent {
        sections,
        tables,
        full_text: result.content,
        raw_paragraphs: result.paragraphs,
    }
}

/// Group paragraphs under the most recent section heading.
pub fn group_sections(paragraphs: &[RawParagraph]) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current = "Abstract".to_string();

    for para in paragraphs {
        if para.is_furniture() {
            continue;
        }

        if para.has_role("sectionHeading") {
            current = para.content.trim().to_string();
            section_mut(&mut sections, &current);
            continue;
        }

        if para.has_role("title") {
            current = "Title".to_string();
            let section = section_mut(&mut sections, &current);
            section.text.push_str(&para.content);
            section.text.push('\n');
            continue;
        }

        let section = section_mut(&mut sections, &current);
        section.text.push_str(&para.content);
        section.text.push_str("\n\n");
    }

    sections
}

fn section_mut<'a>(sections: &'a mut Vec<Section>, name: &str) -> &'a mut Section {
    let idx = match sections.iter().position(|s| s.name == name) {
        Some(idx) => idx,
        None => {
            sections.push(Section {
                name: name.to_string(),
                text: String::new(),
            });
            sections.len() - 1
        }
    };
    &mut sections[idx]
}

/// Render a table as a Markdown grid. Spanned cells beyond the origin stay empty.
pub fn table_to_markdown(table: &DocumentTable) -> String {
    let mut grid = vec![vec![String::new(); table.column_count]; table.row_count];

    for cell in &table.cells {
        let content = cell.content.replace('\n', " ").trim().to_string();
        for dr in 0..cell.row_span.unwrap_or(1).max(1) {
            for dc in 0..cell.column_span.unwrap_or(1).max(1) {
                let (r, c) = (cell.row_index + dr, cell.column_index + dc);
                if r < table.row_count && c < table.column_count {
                    grid[r][c] = if dr == 0 && dc == 0 {
                        content.clone()
                    } else {
                        String::new()
                    };
                }
            }
        }
    }

    let mut lines = Vec::with_capacity(table.row_count + 1);
    for (row_idx, row) in grid.iter().enumerate() {
        lines.push(format!("| {} |", row.join(" | ")));
        if row_idx == 0 {
            lines.push(format!("| {} |", vec!["---"; table.column_count].join(" | ")));
        }
    }

    lines.join("\n")
}
