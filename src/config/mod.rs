mod demo;
mod env_manager;
mod run;

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{DocGenError, Result};
use crate::utils::RetryPolicy;
use std::fs;

pub use demo::DemoLimits;
pub use env_manager::{get_env_value, is_valid_api_key, resolve_api_key, ApiKeys, ResolvedKey};
pub use run::{normalize_extension, DetailLevel, ModeKind, ProcessingMode, RunConfig, RunOptions, TruncationPolicy};

/// Default model used for documentation calls
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
/// Extensions selected when nothing else is configured
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".ts", ".java", ".cpp", ".c", ".cs", ".go", ".rb", ".php",
    ".swift", ".rs", ".html", ".css", ".sql", ".sh", ".yaml", ".yml", ".json", ".md",
];

/// Main configuration struct for the application
///
/// Every section falls back to its defaults, so a config file only needs
/// the keys it wants to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Main output directory for exported documents
    pub output_dir: PathBuf,
    /// Extensions documented by default
    pub selected_extensions: Vec<String>,
    /// Directory names pruned while walking a project
    pub excluded_dirs: Vec<String>,
    /// Number of runs kept in the documentation history
    pub history_capacity: usize,
    /// Generation endpoint settings
    pub api: ApiSettings,
    /// API keys, read from `[api_keys]` but never serialized
    #[serde(skip_serializing)]
    pub api_keys: ApiKeys,
    /// Processing mode defaults and bounds
    pub processing: ProcessingConfig,
    /// File and archive size limits
    pub limits: Limits,
    /// Retry budget for endpoint failures
    pub retry: RetryPolicy,
    /// Input budget handling for large files
    pub truncation: TruncationPolicy,
    /// HTTP server settings
    pub server: ServerConfig,
    /// Restrictions for runs made with the demo key
    pub demo: DemoLimits,
}

/// Settings for the text generation endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the Messages API
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Token budget for basic documentation
    pub basic_max_tokens: u32,
    /// Token budget for comprehensive documentation
    pub comprehensive_max_tokens: u32,
    /// Token budget for expert documentation
    pub expert_max_tokens: u32,
    /// Token budget for the project overview
    pub overview_max_tokens: u32,
    /// Character budget for the condensed overview input
    pub overview_input_chars: usize,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

/// Processing mode defaults and their allowed bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Mode used when the caller does not choose one
    pub default_mode: ModeKind,
    /// Default batch size
    pub batch_size: usize,
    /// Default worker count in concurrent mode
    pub max_workers: usize,
    /// Largest accepted batch size
    pub max_batch_size: usize,
    /// Largest accepted worker count
    pub max_workers_limit: usize,
}

/// Size limits for files and archives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Default per-file size limit in MB
    pub max_file_size_mb: u64,
    /// Largest per-file size limit a run may request, in MB
    pub max_file_size_limit_mb: u64,
    /// Largest accepted archive file in bytes
    pub max_upload_bytes: u64,
    /// Largest total uncompressed size in bytes
    pub max_extract_bytes: u64,
    /// Largest number of archive entries
    pub max_archive_entries: usize,
}

/// Settings of the `server` binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directories `/api/process` may read projects from; empty disables the route
    pub allowed_roots: Vec<PathBuf>,
    /// Origins allowed to call the API from a browser; empty allows none
    pub cors_origins: Vec<String>,
    /// Finished jobs kept in memory; the oldest are dropped first
    pub max_finished_jobs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_roots: Vec::new(),
            cors_origins: Vec::new(),
            max_finished_jobs: 50,
        }
    }
}

impl ServerConfig {
    /// Checks if `path` lies under one of the allowed roots, after resolving symlinks and `..`
    pub fn allows_path(&self, path: &Path) -> bool {
        let Ok(path) = path.canonicalize() else {
            return false;
        };
        self.allowed_roots
            .iter()
            .filter_map(|root| root.canonicalize().ok())
            .any(|root| path.starts_with(root))
    }
}

impl Config {
    /// Creates a new configuration with the specified output directory
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            api: ApiSettings::default(),
            api_keys: ApiKeys::default(),
            output_dir,
            processing: ProcessingConfig::default(),
            limits: Limits::default(),
            retry: RetryPolicy::default(),
            truncation: TruncationPolicy::default(),
            server: ServerConfig::default(),
            demo: DemoLimits::default(),
            selected_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            excluded_dirs: [
                ".git", ".svn", ".hg", "node_modules", "target", "__pycache__",
                ".venv", "venv", ".idea", ".vscode", ".pytest_cache", ".tox",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
            history_capacity: 10,
        }
    }

    /// Loads configuration from the default config file location
    ///
    /// If the config file doesn't exist, returns the default configuration.
    /// Environment overrides are applied in both cases.
    pub fn load() -> Result<Self> {
        let config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_path(&path)?,
            _ => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Loads configuration from an explicit TOML file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| DocGenError::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DocGenError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Serializes the configuration to TOML; API keys are left out
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DocGenError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Location of the user config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("autodocgen").join("config.toml"))
    }

    /// Applies `ANTHROPIC_API_KEY`, `AUTODOCGEN_MODEL`, `AUTODOCGEN_BASE_URL` and `OUTPUT_DIR`
    pub fn with_env_overrides(mut self) -> Self {
        self.api_keys = ApiKeys::from_env_or(&self.api_keys);
        if let Some(model) = get_env_value("AUTODOCGEN_MODEL") {
            self.api.model = model;
        }
        if let Some(base_url) = get_env_value("AUTODOCGEN_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Some(output_dir) = get_env_value("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(output_dir);
        }
        self
    }

    /// Ensures all output directories required by the application exist
    pub async fn ensure_directories_exist(&self) -> Result<()> {
        if !tokio::fs::try_exists(&self.output_dir).await? {
            tokio::fs::create_dir_all(&self.output_dir).await?;
        }
        Ok(())
    }

    /// Checks if a directory name is pruned from the walk
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.excluded_dirs.iter().any(|d| d == name)
    }

    /// Default run settings derived from this configuration
    pub fn run_config(&self) -> RunConfig {
        RunConfig::from_config(self)
    }
}

impl ApiSettings {
    /// Token budget for a detail level
    pub fn max_tokens_for(&self, level: DetailLevel) -> u32 {
        match level {
            DetailLevel::Basic => self.basic_max_tokens,
            DetailLevel::Comprehensive => self.comprehensive_max_tokens,
            DetailLevel::Expert => self.expert_max_tokens,
        }
    }

    /// Per-call timeout
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            basic_max_tokens: 2_000,
            comprehensive_max_tokens: 4_000,
            expert_max_tokens: 8_000,
            overview_max_tokens: 4_000,
            overview_input_chars: 45_000,
            timeout_secs: 120,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            default_mode: ModeKind::Batch,
            batch_size: 3,
            max_workers: 3,
            max_batch_size: 5,
            max_workers_limit: 8,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size_mb: 5,
            max_file_size_limit_mb: 20,
            max_upload_bytes: 100 * 1024 * 1024,
            max_extract_bytes: 500 * 1024 * 1024,
            max_archive_entries: 10_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from("output"))
    }
}
