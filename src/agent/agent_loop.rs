//! Agent loop for paper analysis.
//!
//! This module implements both:
//! - Pipeline mode: run every step in a fixed order (the default)
//! - Tool-calling mode: the model drives the steps through tools

use crate::agent::tools::{get_tool_definitions, PipelineState, ToolExecutor, ToolSettings};
use crate::llm::{ContentBlock, LlmClient, Message, Role};
use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Let the model drive the tools instead of running the fixed pipeline
    pub tool_calling: bool,
    pub max_iterations: usize,
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tool_calling: false,
            max_iterations: 20,
            max_tokens: 4096,
        }
    }
}

/// A paper to process.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// arXiv URL, PDF URL or local PDF path.
    pub source: String,
    pub output_dir: PathBuf,
    pub vault_path: Option<PathBuf>,
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub note_path: PathBuf,
    pub title: String,
    pub linked_concepts: Vec<String>,
    pub figures: usize,
}

impl RunOutcome {
    fn from_state(state: PipelineState) -> Result<Self> {
        let Some(note_path) = state.note_path else {
            bail!("Run finished without writing a note");
        };

        Ok(Self {
            note_path,
            title: state
                .digest
                .map(|d| d.title)
                .unwrap_or_else(|| crate::models::UNKNOWN.to_string()),
            linked_concepts: state.linked_concepts.unwrap_or_default(),
            figures: state.paper.map(|p| p.figures.len()).unwrap_or(0),
        })
    }
}

/// The paper analysis agent.
pub struct DistillAgent {
    config: AgentConfig,
    client: LlmClient,
    settings: ToolSettings,
}

impl DistillAgent {
    pub fn new(config: AgentConfig, client: LlmClient, settings: ToolSettings) -> Self {
        info!(
            "Initializing agent with model {} ({} mode)",
            client.model_name(),
            if config.tool_calling { "tool-calling" } else { "pipeline" }
        );

        Self {
            config,
            client,
            settings,
        }
    }

    /// Process one paper into a note.
    pub async fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        let state = if self.config.tool_calling {
            self.run_tool_calling(request).await?
        } else {
            self.run_pipeline(request).await?
        };

        RunOutcome::from_state(state)
    }

    /// Pipeline mode: every step in order, stopping at the first failure.
    async fn run_pipeline(&self, request: &RunRequest) -> Result<PipelineState> {
        info!("Starting pipeline run for {}", request.source);
        let mut executor = ToolExecutor::new(&self.client, &self.settings);

        executor.parse_paper(&request.source, &request.output_dir).await?;

        if let Some(vault) = &request.vault_path {
            let summary = executor.scan_vault(vault)?;
            debug!("Vault scan: {}", summary);
        }

        executor.digest_paper().await?;

        if request.vault_path.is_some() {
            executor.link_concepts().await?;
        }

        executor.identify_gaps().await?;
        executor.write_note(&request.output_dir)?;

        Ok(executor.into_state())
    }

    /// Tool-calling mode: the model decides which tools to call.
    async fn run_tool_calling(&self, request: &RunRequest) -> Result<PipelineState> {
        info!("Starting agentic paper analysis (tool-calling mode)");

        let has_vault = request.vault_path.is_some();
        let tools = get_tool_definitions(has_vault);
        let system = build_system_prompt(has_vault);
        let mut executor = ToolExecutor::new(&self.client, &self.settings);
        let mut messages = vec![Message::user(build_initial_message(request))];

        let mut finished = false;
        for iteration in 0..self.config.max_iterations {
            debug!("Agent iteration {}", iteration + 1);

            let response = self
                .client
                .converse(&system, &messages, &tools, self.config.max_tokens)
                .await?;

            let text = response.text();
            if !text.trim().is_empty() {
                info!("Agent: {}", text.trim());
            }

            // Echo the turn back without block types we cannot round-trip
            let echoed: Vec<ContentBlock> = response
                .content
                .iter()
                .filter(|b| !matches!(b, ContentBlock::Unknown))
                .cloned()
                .collect();
            messages.push(Message::blocks(Role::Assistant, echoed));

            if response.is_end_turn() {
                finished = true;
                break;
            }

            let calls = response.tool_uses();
            if calls.is_empty() {
                info!("No tool calls in response, stopping");
                finished = true;
                break;
            }

            let mut results = Vec::with_capacity(calls.len());
            for (id, name, input) in calls {
                info!("Calling tool: {}", name);
                let result = executor.execute(name, input).await;
                if !result.success {
                    warn!("Tool {} failed: {}", name, result.error.as_deref().unwrap_or(""));
                }
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id.to_string(),
                    content: result.output,
                    is_error: !result.success,
                });
            }
            messages.push(Message::blocks(Role::User, results));
        }

        if !finished {
            warn!("Reached maximum of {} iterations", self.config.max_iterations);
        }

        Ok(executor.into_state())
    }
}

/// System prompt listing the tools in the order they should be used.
fn build_system_prompt(has_vault: bool) -> String {
    if has_vault {
        "You are Distill, a research paper analysis agent. Your job is to take an academic \
         paper and produce a structured Obsidian markdown note with links to existing vault \
         concepts.\n\n\
         You have 6 tools available. Use them in this order:\n\
         1. parse_paper: extract text, sections, figures and metadata from the PDF\n\
         2. scan_vault: scan the Obsidian vault for existing note titles\n\
         3. digest_paper: generate a structured analysis of the paper\n\
         4. link_concepts: embed [[wikilinks]] to vault concepts inline in the digest text\n\
         5. identify_gaps: find research gaps, open questions and extension ideas\n\
         6. write_note: render everything into an Obsidian markdown note\n\n\
         Call each tool in sequence. After write_note completes, summarize what you created \
         and list which vault concepts were linked."
            .to_string()
    } else {
        "You are Distill, a research paper analysis agent. Your job is to take an academic \
         paper and produce a structured Obsidian markdown note.\n\n\
         You have 4 tools available. Use them in this order:\n\
         1. parse_paper: extract text, sections, figures and metadata from the PDF\n\
         2. digest_paper: generate a structured analysis of the paper\n\
         3. identify_gaps: find research gaps, open questions and extension ideas\n\
         4. write_note: render everything into an Obsidian markdown note\n\n\
         Call each tool in sequence. After write_note completes, summarize what you created."
            .to_string()
    }
}

fn build_initial_message(request: &RunRequest) -> String {
    let mut message = format!(
        "Analyze this paper and create an Obsidian note: {}\nOutput directory: {}",
        request.source,
        request.output_dir.display()
    );
    if let Some(vault) = &request.vault_path {
        message.push_str(&format!("\nObsidian vault path: {}", vault.display()));
    }
    message
}
