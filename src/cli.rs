//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::{Path, PathBuf};

/// Distill - turn academic papers into structured Obsidian notes
///
/// Parses a paper with Azure Document Intelligence, digests it with
/// Claude, links it against your vault, and writes a Markdown note.
///
/// Examples:
///   distill https://arxiv.org/abs/2301.02111
///   distill ./paper.pdf --output ~/vault/papers --vault ~/vault/concepts
///   distill https://arxiv.org/abs/2301.02111 --no-vault --agent
///   distill ./paper.pdf --dry-run
///   distill --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true, disable_version_flag = true)]
pub struct Args {
    /// arXiv URL (e.g. https://arxiv.org/abs/2301.12345) or local PDF path
    #[arg(value_name = "SOURCE", required_unless_present = "init_config")]
    pub source: Option<String>,

    /// Output directory for the note and figures
    ///
    /// Default: from config or ./notes
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Obsidian vault directory used for concept linking
    #[arg(short = 'V', long, value_name = "DIR", env = "DISTILL_VAULT")]
    pub vault: Option<PathBuf>,

    /// Skip vault scanning and concept linking
    #[arg(long)]
    pub no_vault: bool,

    /// Claude model to use
    #[arg(short, long, env = "DISTILL_MODEL")]
    pub model: Option<String>,

    /// Messages API base URL
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true, hide = true)]
    pub anthropic_api_key: Option<String>,

    /// Azure Document Intelligence endpoint
    #[arg(long, env = "AZURE_DOC_INTEL_ENDPOINT", hide = true)]
    pub azure_endpoint: Option<String>,

    /// Azure Document Intelligence key
    #[arg(long, env = "AZURE_DOC_INTEL_KEY", hide_env_values = true, hide = true)]
    pub azure_key: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .distill.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Request timeout in seconds for model calls
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Let the model decide the order of steps through tool calls
    #[arg(long, conflicts_with = "no_agent")]
    pub agent: bool,

    /// Run the steps in a fixed order (default)
    #[arg(long, conflicts_with = "agent")]
    pub no_agent: bool,

    /// Ignore any cached document analysis and re-run it
    #[arg(long)]
    pub no_cache: bool,

    /// Dry run: fetch and analyse the document without calling the model
    ///
    /// Prints the detected structure and exits.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .distill.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    pub version: Option<bool>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the source, empty if not set (should be validated first).
    pub fn source(&self) -> &str {
        self.source.as_deref().unwrap_or("")
    }

    /// Whether the source points at a remote document.
    pub fn is_remote_source(&self) -> bool {
        is_remote(self.source())
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let source = self.source();
        if source.is_empty() {
            return Err("A paper URL or PDF path is required".to_string());
        }

        if !is_remote(source) {
            let path = Path::new(source);
            if !path.exists() {
                return Err(format!("Local PDF not found: {}", source));
            }
            if !path.is_file() {
                return Err(format!("Source is not a file: {}", source));
            }
        }

        if let Some(ref api_url) = self.api_url {
            if !is_remote(api_url) {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if !self.no_vault {
            if let Some(ref vault) = self.vault {
                if !vault.is_dir() {
                    return Err(format!(
                        "Vault path is not a directory: {}",
                        vault.display()
                    ));
                }
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the `[general] verbose` setting; `-q` overrides it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn is_remote(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    pub(crate) fn make_args() -> Args {
        Args {
            source: Some("https://arxiv.org/abs/2301.02111".to_string()),
            output: None,
            vault: None,
            no_vault: false,
            model: None,
            api_url: None,
            anthropic_api_key: None,
            azure_endpoint: None,
            azure_key: None,
            config: None,
            verbose: false,
            quiet: false,
            timeout: None,
            agent: false,
            no_agent: false,
            no_cache: false,
            dry_run: false,
            init_config: false,
            version: None,
        }
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_short_v_is_vault() {
        let dir = TempDir::new().unwrap();
        let vault = dir.path().to_string_lossy().to_string();
        let args = Args::try_parse_from(["distill", "https://arxiv.org/abs/2301.02111", "-V", vault.as_str()]).unwrap();
        assert_eq!(args.vault.as_deref(), Some(dir.path()));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_long_version_flag() {
        let err = Args::try_parse_from(["distill", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_validation_remote_source() {
        let args = make_args();
        assert!(args.validate().is_ok());
        assert!(args.is_remote_source());
    }

    #[test]
    fn test_validation_missing_local_file() {
        let mut args = make_args();
        args.source = Some("/definitely/not/here.pdf".to_string());
        let err = args.validate().unwrap_err();
        assert!(err.contains("Local PDF not found"));
    }

    #[test]
    fn test_validation_local_directory_rejected() {
        let dir = TempDir::new().unwrap();
        let mut args = make_args();
        args.source = Some(dir.path().to_string_lossy().to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bad_vault_ignored_with_no_vault() {
        let mut args = make_args();
        args.vault = Some(PathBuf::from("/no/such/vault"));
        assert!(args.validate().is_err());

        args.no_vault = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.source = None;
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
    }

    #[test]
    fn test_log_level_config_verbose() {
        let mut args = make_args();
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
