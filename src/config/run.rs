use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::{DocGenError, Result};
use crate::utils::RetryPolicy;
use super::Config;

const MB: u64 = 1024 * 1024;

/// How much prose the endpoint is asked to produce per file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Essential information only
    Basic,
    /// Balanced level of detail
    #[default]
    Comprehensive,
    /// Advanced insights and best practices
    Expert,
}

impl DetailLevel {
    /// Lower-case name used in prompts and exports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Comprehensive => "comprehensive",
            Self::Expert => "expert",
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetailLevel {
    type Err = DocGenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "comprehensive" => Ok(Self::Comprehensive),
            "expert" => Ok(Self::Expert),
            other => Err(DocGenError::Validation(format!("Unknown detail level: {}", other))),
        }
    }
}

/// Name of a processing mode without its concurrency limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    /// One file at a time
    Sequential,
    /// Fixed-size groups, each group finished before the next starts
    #[default]
    Batch,
    /// Everything admitted at once, bounded by the worker count
    Concurrent,
}

/// Scheduling policy of a run, carrying its concurrency limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProcessingMode {
    /// Concurrency bound of one
    Sequential,
    /// Groups of `size` files
    Batch {
        /// Files per group
        size: usize,
    },
    /// Up to `max_workers` calls in flight
    Concurrent {
        /// Worker cap
        max_workers: usize,
    },
}

impl ProcessingMode {
    /// Builds a mode from its name and the configured limits
    pub fn from_kind(kind: ModeKind, batch_size: usize, max_workers: usize) -> Self {
        match kind {
            ModeKind::Sequential => Self::Sequential,
            ModeKind::Batch => Self::Batch { size: batch_size },
            ModeKind::Concurrent => Self::Concurrent { max_workers },
        }
    }

    /// Maximum number of calls in flight
    pub fn concurrency_bound(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Batch { size } => *size,
            Self::Concurrent { max_workers } => *max_workers,
        }
    }

    /// Group boundary size, only set in batch mode
    pub fn group_size(&self) -> Option<usize> {
        match self {
            Self::Batch { size } => Some(*size),
            _ => None,
        }
    }

    /// Name of the mode
    pub fn kind(&self) -> ModeKind {
        match self {
            Self::Sequential => ModeKind::Sequential,
            Self::Batch { .. } => ModeKind::Batch,
            Self::Concurrent { .. } => ModeKind::Concurrent,
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Batch { size } => write!(f, "batch (size {})", size),
            Self::Concurrent { max_workers } => write!(f, "concurrent ({} workers)", max_workers),
        }
    }
}

/// How oversized file content is cut before it is sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruncationPolicy {
    /// Character budget for file content inside one prompt
    pub max_input_chars: usize,
    /// A sentence or line boundary is used only past this share of the budget
    pub boundary_ratio: f32,
}

impl Default for TruncationPolicy {
    fn default() -> Self {
        Self {
            max_input_chars: 100_000,
            boundary_ratio: 0.7,
        }
    }
}

/// Settings fixed for the duration of one documentation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Prompt verbosity
    pub detail_level: DetailLevel,
    /// Allow-listed extensions, lower-case with a leading dot
    pub selected_extensions: BTreeSet<String>,
    /// Largest file size accepted, in bytes
    pub max_file_size: u64,
    /// Scheduling policy
    pub mode: ProcessingMode,
    /// Back-off and retry budget
    pub retry: RetryPolicy,
    /// Input budget handling
    pub truncation: TruncationPolicy,
    /// Ask for a project overview once the files are documented
    pub generate_overview: bool,
    /// Attach the ASCII/Mermaid directory structure
    pub generate_directory_structure: bool,
}

impl RunConfig {
    /// Derives the default run settings from the application configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            detail_level: DetailLevel::default(),
            selected_extensions: config
                .selected_extensions
                .iter()
                .map(|e| normalize_extension(e))
                .collect(),
            max_file_size: config.limits.max_file_size_mb.saturating_mul(MB),
            mode: ProcessingMode::from_kind(
                config.processing.default_mode,
                config.processing.batch_size,
                config.processing.max_workers,
            ),
            retry: config.retry.clone(),
            truncation: config.truncation.clone(),
            generate_overview: true,
            generate_directory_structure: true,
        }
    }

    /// Replaces the allow-list
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selected_extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .collect();
        self
    }

    /// Sets the size limit in whole megabytes, saturating at `u64::MAX`
    pub fn with_max_file_size_mb(mut self, mb: u64) -> Self {
        self.max_file_size = mb.saturating_mul(MB);
        self
    }

    /// Sets the scheduling policy
    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Checks if an extension (with or without dot) is allow-listed
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.selected_extensions.contains(&normalize_extension(extension))
    }

    /// Validates the run against the configured bounds
    pub fn validate(&self, config: &Config) -> Result<()> {
        if self.selected_extensions.is_empty() {
            return Err(DocGenError::Validation("No file extensions selected".into()));
        }
        if self.max_file_size == 0 {
            return Err(DocGenError::Validation("Max file size must be positive".into()));
        }
        let limit = config.limits.max_file_size_limit_mb.saturating_mul(MB);
        if self.max_file_size > limit {
            return Err(DocGenError::Validation(format!(
                "Max file size {} MB exceeds the allowed {} MB",
                self.max_file_size / MB,
                config.limits.max_file_size_limit_mb
            )));
        }
        match self.mode {
            ProcessingMode::Batch { size } if size == 0 || size > config.processing.max_batch_size => {
                Err(DocGenError::Validation(format!(
                    "Batch size must be between 1 and {}",
                    config.processing.max_batch_size
                )))
            }
            ProcessingMode::Concurrent { max_workers }
                if max_workers == 0 || max_workers > config.processing.max_workers_limit =>
            {
                Err(DocGenError::Validation(format!(
                    "Max workers must be between 1 and {}",
                    config.processing.max_workers_limit
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Per-run overrides of the configured defaults, from CLI flags or a request body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, clap::Args)]
#[serde(default)]
pub struct RunOptions {
    /// Detail level of the generated documentation
    #[arg(long = "level", value_enum)]
    pub detail_level: Option<DetailLevel>,

    /// Processing mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeKind>,

    /// Files per group in batch mode
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Worker cap in concurrent mode
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// File extensions to include, e.g. `--ext py,rs`
    #[arg(long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Largest file to document, in MB
    #[arg(long)]
    pub max_file_size_mb: Option<u64>,

    /// Generate the project overview
    #[arg(skip)]
    pub generate_overview: Option<bool>,

    /// Generate the directory structure
    #[arg(skip)]
    pub generate_directory_structure: Option<bool>,
}

impl RunOptions {
    /// Applies the overrides on top of `config`'s defaults
    pub fn to_run_config(&self, config: &Config) -> RunConfig {
        let mut run = RunConfig::from_config(config);
        if let Some(level) = self.detail_level {
            run.detail_level = level;
        }
        if !self.extensions.is_empty() {
            run = run.with_extensions(&self.extensions);
        }
        if let Some(mb) = self.max_file_size_mb {
            run = run.with_max_file_size_mb(mb);
        }
        if let Some(overview) = self.generate_overview {
            run.generate_overview = overview;
        }
        if let Some(structure) = self.generate_directory_structure {
            run.generate_directory_structure = structure;
        }
        let kind = self.mode.unwrap_or(config.processing.default_mode);
        run.with_mode(ProcessingMode::from_kind(
            kind,
            self.batch_size.unwrap_or(config.processing.batch_size),
            self.max_workers.unwrap_or(config.processing.max_workers),
        ))
    }
}

/// Lower-cases an extension and makes sure it starts with a dot
pub fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}
