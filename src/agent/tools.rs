//! Tool definitions for the paper analysis agent.
//!
//! Each tool wraps one pipeline step. Tools share a `PipelineState` so later
//! steps can use what earlier ones produced; the model only ever sees a
//! compact JSON summary of each result.

use crate::analysis::{digest_paper, identify_gaps, link_concepts};
use crate::llm::{LlmClient, ToolDefinition};
use crate::models::{PaperData, PaperDigest, ResearchGaps};
use crate::paper::{parse_paper, ParseOptions};
use crate::report::{render_note, NoteOptions};
use crate::vault::{filter_vault_notes, paper_keywords, scan_vault};
use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of vault titles echoed back to the model.
const VAULT_SAMPLE_SIZE: usize = 10;

/// Length of the key contribution preview in the digest summary.
const CONTRIBUTION_PREVIEW_CHARS: usize = 200;

/// Settings shared by every tool invocation of a run.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub parse: ParseOptions,
    pub note: NoteOptions,
    /// Vaults larger than this are pre-filtered for relevance.
    pub max_vault_notes: usize,
    pub digest_max_chars: usize,
    pub gaps_max_chars: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            parse: ParseOptions::default(),
            note: NoteOptions::default(),
            max_vault_notes: 500,
            digest_max_chars: 200_000,
            gaps_max_chars: 100_000,
        }
    }
}

impl From<&crate::config::Config> for ToolSettings {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            parse: ParseOptions::from(config),
            note: NoteOptions::from(&config.note),
            max_vault_notes: config.vault.max_notes,
            digest_max_chars: config.model.digest_max_chars,
            gaps_max_chars: config.model.gaps_max_chars,
        }
    }
}

/// What the pipeline has produced so far.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub paper: Option<PaperData>,
    pub vault_notes: Option<Vec<String>>,
    pub digest: Option<PaperDigest>,
    pub linked_concepts: Option<Vec<String>>,
    pub gaps: Option<ResearchGaps>,
    pub note_path: Option<PathBuf>,
}

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        Self {
            success: true,
            output: output.to_string(),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            output: json!({ "error": message }).to_string(),
            error: Some(message),
        }
    }
}

/// The tools executor that handles tool calls.
pub struct ToolExecutor<'a> {
    client: &'a LlmClient,
    settings: &'a ToolSettings,
    state: PipelineState,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(client: &'a LlmClient, settings: &'a ToolSettings) -> Self {
        Self {
            client,
            settings,
            state: PipelineState::default(),
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn into_state(self) -> PipelineState {
        self.state
    }

    /// Execute a tool call by name. Failures are reported in the result.
    pub async fn execute(&mut self, name: &str, args: &Value) -> ToolResult {
        debug!("Executing tool: {} with args: {}", name, args);

        let result = match name {
            "parse_paper" => match (str_arg(args, "source"), str_arg(args, "output_dir")) {
                (Ok(source), Ok(output_dir)) => self.parse_paper(source, Path::new(output_dir)).await,
                (Err(e), _) | (_, Err(e)) => Err(e),
            },
            "scan_vault" => match str_arg(args, "vault_path") {
                Ok(vault_path) => self.scan_vault(Path::new(vault_path)),
                Err(e) => Err(e),
            },
            "digest_paper" => self.digest_paper().await,
            "link_concepts" => self.link_concepts().await,
            "identify_gaps" => self.identify_gaps().await,
            "write_note" => match str_arg(args, "output_dir") {
                Ok(output_dir) => self.write_note(Path::new(output_dir)),
                Err(e) => Err(e),
            },
            _ => return ToolResult::error(format!("Unknown tool: {}", name)),
        };

        match result {
            Ok(summary) => ToolResult::success(summary),
            Err(e) => ToolResult::error(format!("{:#}", e)),
        }
    }

    /// Fetch and parse the paper.
    pub async fn parse_paper(&mut self, source: &str, output_dir: &Path) -> Result<Value> {
        let paper = parse_paper(source, output_dir, &self.settings.parse).await?;
        let summary = json!({
            "status": "success",
            "title": paper.metadata.title,
            "sections": paper.sections.len(),
            "figures": paper.figures.len(),
            "tables": paper.tables.len(),
        });
        self.state.paper = Some(paper);
        Ok(summary)
    }

    /// Collect vault note titles, pre-filtering large vaults once a paper is known.
    pub fn scan_vault(&mut self, vault_path: &Path) -> Result<Value> {
        let mut titles = scan_vault(vault_path)?;

        if let Some(paper) = &self.state.paper {
            if titles.len() > self.settings.max_vault_notes {
                titles = filter_vault_notes(
                    titles,
                    &paper_keywords(paper),
                    &paper.metadata.title,
                    self.settings.max_vault_notes,
                );
            }
        }

        let summary = json!({
            "status": "success",
            "note_count": titles.len(),
            "sample": titles.iter().take(VAULT_SAMPLE_SIZE).collect::<Vec<_>>(),
        });
        self.state.vault_notes = Some(titles);
        Ok(summary)
    }

    pub async fn digest_paper(&mut self) -> Result<Value> {
        let paper = self
            .state
            .paper
            .as_ref()
            .ok_or_else(|| anyhow!("Must call parse_paper first"))?;

        let digest = digest_paper(self.client, paper, self.settings.digest_max_chars).await?;
        let summary = json!({
            "status": "success",
            "title": digest.title,
            "tags": digest.tags,
            "key_contribution": digest
                .key_contribution
                .chars()
                .take(CONTRIBUTION_PREVIEW_CHARS)
                .collect::<String>(),
            "connections": digest.connections,
        });
        self.state.digest = Some(digest);
        Ok(summary)
    }

    pub async fn link_concepts(&mut self) -> Result<Value> {
        let digest = self
            .state
            .digest
            .clone()
            .ok_or_else(|| anyhow!("Must call digest_paper first"))?;
        let vault_notes = self
            .state
            .vault_notes
            .as_deref()
            .ok_or_else(|| anyhow!("Must call scan_vault first"))?;

        let (linked_digest, concepts) = link_concepts(self.client, digest, vault_notes).await?;
        let summary = json!({
            "status": "success",
            "linked_concepts": concepts,
            "count": concepts.len(),
        });
        self.state.digest = Some(linked_digest);
        self.state.linked_concepts = Some(concepts);
        Ok(summary)
    }

    pub async fn identify_gaps(&mut self) -> Result<Value> {
        let digest = self
            .state
            .digest
            .as_ref()
            .ok_or_else(|| anyhow!("Must call digest_paper first"))?;
        let sections = self.state.paper.as_ref().map(|p| p.sections.as_slice());

        let gaps = identify_gaps(self.client, digest, sections, self.settings.gaps_max_chars).await?;
        let summary = json!({
            "status": "success",
            "open_questions": gaps.open_questions.len(),
            "extension_ideas": gaps.extension_ideas.len(),
            "methodological_gaps": gaps.methodological_gaps.len(),
        });
        self.state.gaps = Some(gaps);
        Ok(summary)
    }

    /// Render the note from everything gathered so far.
    pub fn write_note(&mut self, output_dir: &Path) -> Result<Value> {
        let digest = self
            .state
            .digest
            .as_ref()
            .ok_or_else(|| anyhow!("Must call digest_paper first"))?;
        let paper = self
            .state
            .paper
            .as_ref()
            .ok_or_else(|| anyhow!("Must call parse_paper first"))?;

        let note_path = render_note(
            paper,
            digest,
            self.state.gaps.as_ref(),
            self.state.linked_concepts.as_deref(),
            output_dir,
            &self.settings.note,
        )?;

        let summary = json!({
            "status": "success",
            "note_path": note_path.display().to_string(),
        });
        self.state.note_path = Some(note_path);
        Ok(summary)
    }
}

fn str_arg<'v>(args: &'v Value, key: &str) -> Result<&'v str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Missing required parameter: {}", key))
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn no_params() -> Value {
    json!({ "type": "object", "properties": {}, "required": [] })
}

/// Tool definitions for the Messages API, in the order they should be used.
///
/// Without a vault the `scan_vault` and `link_concepts` tools are left out.
pub fn get_tool_definitions(include_vault: bool) -> Vec<ToolDefinition> {
    let all = vec![
        tool(
            "parse_paper",
            "Parse an academic paper from an arXiv URL or local PDF path. Extracts text, \
             sections, metadata, figures and tables. Must be called first.",
            json!({
                "type": "object",
                "properties": {
                    "source": {
                        "type": "string",
                        "description": "arXiv URL (e.g. https://arxiv.org/abs/2301.12345) or local PDF path"
                    },
                    "output_dir": {
                        "type": "string",
                        "description": "Directory to save extracted figures"
                    }
                },
                "required": ["source", "output_dir"]
            }),
        ),
        tool(
            "scan_vault",
            "Scan an Obsidian vault directory for existing note titles that can be used for \
             concept linking. Call after parse_paper when a vault path is available.",
            json!({
                "type": "object",
                "properties": {
                    "vault_path": {
                        "type": "string",
                        "description": "Path to the root of the Obsidian vault directory"
                    }
                },
                "required": ["vault_path"]
            }),
        ),
        tool(
            "digest_paper",
            "Generate a structured digest of the parsed paper: key contribution, methodology, \
             results, limitations, tags and connections. Requires parse_paper first.",
            no_params(),
        ),
        tool(
            "link_concepts",
            "Embed [[wikilinks]] to existing vault notes inline within the digest text. \
             Requires digest_paper and scan_vault first.",
            no_params(),
        ),
        tool(
            "identify_gaps",
            "Identify research gaps, open questions, extension ideas and methodological \
             weaknesses. Requires digest_paper first.",
            no_params(),
        ),
        tool(
            "write_note",
            "Write the final Obsidian markdown note combining all analysis. Requires \
             digest_paper first; call identify_gaps before it.",
            json!({
                "type": "object",
                "properties": {
                    "output_dir": {
                        "type": "string",
                        "description": "Directory to write the Obsidian note and figures"
                    }
                },
                "required": ["output_dir"]
            }),
        ),
    ];

    all.into_iter()
        .filter(|t| include_vault || !matches!(t.name.as_str(), "scan_vault" | "link_concepts"))
        .collect()
}
