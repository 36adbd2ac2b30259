//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.distill.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".distill.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Language model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Document analysis settings.
    #[serde(default)]
    pub document: DocumentConfig,

    /// Vault settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Note rendering settings.
    #[serde(default)]
    pub note: NoteConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory the note and its attachments are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            verbose: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("notes")
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Messages API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key. Normally supplied through ANTHROPIC_API_KEY.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on rate limiting or server errors.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Let the model drive the pipeline through tool calls.
    /// If false: run the steps in a fixed order.
    #[serde(default)]
    pub agent_mode: bool,

    /// Upper bound on model turns in agent mode.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Character budget for paper content sent with the digest request.
    #[serde(default = "default_digest_max_chars")]
    pub digest_max_chars: usize,

    /// Character budget for raw sections sent with the gaps request.
    #[serde(default = "default_gaps_max_chars")]
    pub gaps_max_chars: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            api_key: None,
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            agent_mode: false,
            max_iterations: default_max_iterations(),
            digest_max_chars: default_digest_max_chars(),
            gaps_max_chars: default_gaps_max_chars(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_api_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_retries() -> usize {
    3
}

fn default_max_iterations() -> usize {
    20
}

fn default_digest_max_chars() -> usize {
    200_000
}

fn default_gaps_max_chars() -> usize {
    100_000
}

/// Azure Document Intelligence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Resource endpoint, e.g. `https://<name>.cognitiveservices.azure.com`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Subscription key. Normally supplied through AZURE_DOC_INTEL_KEY.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// REST API version.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Analysis model.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Delay between status polls when the service gives no Retry-After.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of status polls before giving up.
    #[serde(default = "default_max_polls")]
    pub max_polls: usize,

    /// Timeout for each request to the analysis service.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Timeout for PDF downloads.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_seconds: u64,

    /// Reuse cached analysis results.
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Where downloaded PDFs (and their caches) are stored.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: default_api_version(),
            model_id: default_model_id(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            request_timeout_seconds: default_request_timeout(),
            download_timeout_seconds: default_download_timeout(),
            use_cache: true,
            cache_dir: None,
        }
    }
}

impl DocumentConfig {
    /// Effective download/cache directory.
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("distill"))
    }
}

fn default_api_version() -> String {
    "2024-11-30".to_string()
}

fn default_model_id() -> String {
    "prebuilt-layout".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_polls() -> usize {
    150
}

fn default_request_timeout() -> u64 {
    120
}

fn default_download_timeout() -> u64 {
    30
}

/// Knowledge-base settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Vault directory. Linking is skipped when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Vaults larger than this are pre-filtered before linking.
    #[serde(default = "default_max_notes")]
    pub max_notes: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_notes: default_max_notes(),
        }
    }
}

fn default_max_notes() -> usize {
    500
}

/// Note rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteConfig {
    /// Subdirectory of the output dir that figures are copied into.
    #[serde(default = "default_figures_subdir")]
    pub figures_subdir: String,

    /// Render extracted tables into the note.
    #[serde(default = "default_true")]
    pub include_tables: bool,

    /// Images smaller than this many bytes are skipped.
    #[serde(default = "default_min_figure_bytes")]
    pub min_figure_bytes: usize,

    /// Images narrower or shorter than this many pixels are skipped.
    #[serde(default = "default_min_figure_side")]
    pub min_figure_side: i64,
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            figures_subdir: default_figures_subdir(),
            include_tables: true,
            min_figure_bytes: default_min_figure_bytes(),
            min_figure_side: default_min_figure_side(),
        }
    }
}

fn default_figures_subdir() -> String {
    "attachments".to_string()
}

fn default_min_figure_bytes() -> usize {
    10 * 1024
}

fn default_min_figure_side() -> i64 {
    100
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output_dir = output.clone();
        }
        if args.verbose {
            self.general.verbose = true;
        }

        // Model settings
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref api_url) = args.api_url {
            self.model.api_url = api_url.clone();
        }
        if args.anthropic_api_key.is_some() {
            self.model.api_key = args.anthropic_api_key.clone();
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if args.agent {
            self.model.agent_mode = true;
        } else if args.no_agent {
            self.model.agent_mode = false;
        }

        // Document service
        if args.azure_endpoint.is_some() {
            self.document.endpoint = args.azure_endpoint.clone();
        }
        if args.azure_key.is_some() {
            self.document.api_key = args.azure_key.clone();
        }
        if args.no_cache {
            self.document.use_cache = false;
        }

        // Vault: --no-vault wins over everything
        if args.no_vault {
            self.vault.path = None;
        } else if let Some(ref vault) = args.vault {
            self.vault.path = Some(vault.clone());
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "claude-sonnet-4-20250514");
        assert_eq!(config.vault.max_notes, 500);
        assert_eq!(config.note.figures_subdir, "attachments");
        assert!(config.document.use_cache);
        assert!(!config.model.agent_mode);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output_dir = "papers"
verbose = true

[model]
name = "claude-opus-4-1"
agent_mode = true

[document]
endpoint = "https://example.cognitiveservices.azure.com"
max_polls = 10
request_timeout_seconds = 45

[vault]
path = "/home/me/vault"
max_notes = 50
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output_dir, PathBuf::from("papers"));
        assert!(config.general.verbose);
        assert_eq!(config.model.name, "claude-opus-4-1");
        assert!(config.model.agent_mode);
        assert_eq!(config.model.retries, 3);
        assert_eq!(config.document.max_polls, 10);
        assert_eq!(config.document.request_timeout_seconds, 45);
        assert_eq!(config.document.download_timeout_seconds, 30);
        assert_eq!(config.document.api_version, "2024-11-30");
        assert_eq!(config.vault.path, Some(PathBuf::from("/home/me/vault")));
        assert_eq!(config.vault.max_notes, 50);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[document]"));
        assert!(toml_str.contains("[note]"));
        // Secrets never end up in a generated file
        assert!(!toml_str.contains("api_key"));
    }

    #[test]
    fn test_merge_with_args_overrides() {
        let mut config = Config::default();
        config.vault.path = Some(PathBuf::from("/from/config"));

        let mut args = make_args();
        args.model = Some("claude-3-5-haiku-latest".to_string());
        args.timeout = Some(60);
        args.agent = true;
        args.no_cache = true;
        config.merge_with_args(&args);

        assert_eq!(config.model.name, "claude-3-5-haiku-latest");
        assert_eq!(config.model.timeout_seconds, 60);
        assert!(config.model.agent_mode);
        assert!(!config.document.use_cache);
        assert_eq!(config.vault.path, Some(PathBuf::from("/from/config")));
    }

    #[test]
    fn test_merge_no_vault_clears_path() {
        let mut config = Config::default();
        config.vault.path = Some(PathBuf::from("/from/config"));

        let mut args = make_args();
        args.no_vault = true;
        config.merge_with_args(&args);

        assert!(config.vault.path.is_none());
    }
}
