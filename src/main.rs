//! Distill - research paper to Obsidian note
//!
//! A CLI tool that parses an academic paper (arXiv URL or local PDF),
//! analyses it with Claude and writes a structured Obsidian note linked
//! to the concepts already in your vault.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing credentials, download, analysis, API failure, etc.)

mod agent;
mod analysis;
mod cli;
mod config;
mod error;
mod llm;
mod models;
mod paper;
mod report;
mod vault;

use agent::{AgentConfig, DistillAgent, RunRequest, ToolSettings};
use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use llm::{LlmClient, LlmConfig};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config comes first: `[general] verbose` feeds the log level
    let loaded = load_config(&args);
    let mut config = loaded.config;
    config.merge_with_args(&args);

    init_logging(&args, config.general.verbose)?;

    info!("Distill v{}", env!("CARGO_PKG_VERSION"));
    match loaded.origin {
        ConfigOrigin::File(path) => info!("Loaded config from {}", path.display()),
        ConfigOrigin::Defaults => debug!("No config file found, using defaults"),
        ConfigOrigin::Invalid(e) => warn!("Failed to load config, using defaults: {:#}", e),
    }
    debug!("Source: {}, dry run: {}", args.source(), args.dry_run);

    if let Err(e) = run(args, config).await {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .distill.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the model, vault path, document service endpoint and more.");
    println!("   Keys are read from ANTHROPIC_API_KEY and AZURE_DOC_INTEL_KEY.");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` overrides them.
fn init_logging(args: &Args, config_verbose: bool) -> Result<()> {
    let default_level = LevelFilter::from_level(args.log_level(config_verbose));
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")
}

/// Run the complete paper workflow.
async fn run(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    let mut settings = ToolSettings::from(&config);
    settings.parse.show_progress = !args.quiet;

    let source = args.source().to_string();
    let output_dir = config.general.output_dir.clone();

    if args.dry_run {
        return handle_dry_run(&source, &output_dir, &config, &settings).await;
    }

    // Fail before any download when the model key is missing
    let llm_config = LlmConfig::from_model_config(&config.model)?;
    let client = LlmClient::new(llm_config)?;

    let mode_str = if config.model.agent_mode {
        "Tool-calling (agentic)"
    } else {
        "Pipeline"
    };

    println!("🤖 Initializing Distill...");
    println!("   Model: {}", config.model.name);
    println!("   Mode: {}", mode_str);
    match &config.vault.path {
        Some(vault) => println!("   Vault: {}", vault.display()),
        None => println!("   Vault: (none, concept linking disabled)"),
    }
    println!("   Output: {}", output_dir.display());

    if args.is_remote_source() {
        println!("\n📥 Downloading paper: {}", source);
    } else {
        println!("\n📄 Reading paper: {}", source);
    }
    println!("   ⏳ Layout analysis and model calls may take a few minutes.\n");

    let agent_config = AgentConfig {
        tool_calling: config.model.agent_mode,
        max_iterations: config.model.max_iterations,
        ..Default::default()
    };
    let agent = DistillAgent::new(agent_config, client, settings);

    let request = RunRequest {
        source,
        output_dir,
        vault_path: config.vault.path.clone(),
    };
    let outcome = agent.run(&request).await?;

    let duration = start_time.elapsed().as_secs_f64();

    println!("\n📊 Summary:");
    println!("   Title: {}", outcome.title);
    println!("   Figures: {}", outcome.figures);
    if config.vault.path.is_some() {
        if outcome.linked_concepts.is_empty() {
            println!("   Linked concepts: none");
        } else {
            println!(
                "   Linked concepts ({}): {}",
                outcome.linked_concepts.len(),
                outcome.linked_concepts.join(", ")
            );
        }
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Note saved to: {}", outcome.note_path.display());

    Ok(())
}

/// Handle --dry-run: parse the paper and scan the vault, no model calls.
async fn handle_dry_run(source: &str, output_dir: &Path, config: &Config, settings: &ToolSettings) -> Result<()> {
    println!("\n🔍 Dry run: parsing paper (no LLM calls)...\n");

    let paper = paper::parse_paper(source, output_dir, &settings.parse).await?;

    println!("   Title: {}", paper.metadata.title);
    println!("   Authors: {}", paper.metadata.authors);
    if let Some(ref id) = paper.metadata.arxiv_id {
        println!("   arXiv: {}", id);
    }
    println!("   Sections ({}):", paper.sections.len());
    for section in &paper.sections {
        println!("     📑 {} ({} chars)", section.name, section.text.chars().count());
    }
    println!("   Figures: {}", paper.figures.len());
    println!("   Tables: {}", paper.tables.len());

    if let Some(ref vault_path) = config.vault.path {
        let titles = vault::scan_vault(vault_path)?;
        let total = titles.len();
        let kept = vault::filter_vault_notes(
            titles,
            &vault::paper_keywords(&paper),
            &paper.metadata.title,
            config.vault.max_notes,
        );
        println!("   Vault notes: {} ({} would be sent for linking)", total, kept.len());
    }

    println!("\n✅ Dry run complete. No LLM calls were made.");
    Ok(())
}

/// Where the configuration came from, logged once logging is set up.
enum ConfigOrigin {
    File(PathBuf),
    Defaults,
    Invalid(anyhow::Error),
}

struct LoadedConfig {
    config: Config,
    origin: ConfigOrigin,
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` that fails to load is fatal; a broken default
/// file falls back to defaults with a warning.
fn load_config(args: &Args) -> LoadedConfig {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return match Config::load(config_path) {
            Ok(config) => LoadedConfig {
                config,
                origin: ConfigOrigin::File(config_path.clone()),
            },
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        };
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => LoadedConfig {
            config,
            origin: ConfigOrigin::File(PathBuf::from(CONFIG_FILE_NAME)),
        },
        Ok(None) => LoadedConfig {
            config: Config::default(),
            origin: ConfigOrigin::Defaults,
        },
        Err(e) => LoadedConfig {
            config: Config::default(),
            origin: ConfigOrigin::Invalid(e),
        },
    }
}
