//! Extract, walk, document and aggregate in one call.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::info;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use crate::aggregator::{ProjectDocumentSet, ResultAggregator};
use crate::archive::{self, ArchiveKind, ExtractedProject};
use crate::client::{AnthropicEndpoint, DocumentationClient, GenerationEndpoint};
use crate::config::{Config, RunConfig};
use crate::error::{DocGenError, Result};
use crate::orchestrator::{Orchestrator, ProgressEvent};
use crate::walker::{FileDescriptor, ProjectWalker, WalkStats};

/// Where the project comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSource {
    /// Already extracted project directory
    Directory(PathBuf),
    /// Archive file; `file_name` decides the format and project name
    Archive {
        /// Location of the archive on disk
        path: PathBuf,
        /// Original file name, e.g. of an upload
        file_name: String,
    },
}

impl ProjectSource {
    /// Classifies an existing path as a directory or a supported archive
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(DocGenError::Validation(format!("No such file or directory: {}", path.display())));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ArchiveKind::detect(&file_name)?;
        Ok(Self::Archive {
            path: path.to_path_buf(),
            file_name,
        })
    }

    /// Project name shown in exports
    pub fn project_name(&self) -> String {
        match self {
            Self::Directory(path) => path
                .canonicalize()
                .ok()
                .as_deref()
                .unwrap_or(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string()),
            Self::Archive { file_name, .. } => archive::project_name_from_archive(file_name),
        }
    }
}

/// Cancellation and progress wiring for one run
#[derive(Debug, Clone, Default)]
pub struct RunHandle {
    cancel: CancellationToken,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl RunHandle {
    /// Handle with a fresh token and no progress channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `token` instead of a fresh one
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Sends progress events on `sender`
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Token that cancels the run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels the run
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// One file accepted by the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedFile {
    /// Relative path
    pub path: String,
    /// Language tag
    pub language: Option<&'static str>,
    /// Size in bytes
    pub size: u64,
}

/// Classification of a project without any endpoint call
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Project name
    pub project_name: String,
    /// Included files in walk order
    pub files: Vec<ScannedFile>,
    /// Walk counts
    pub stats: WalkStats,
}

/// A project ready to walk; keeps the extraction alive
struct PreparedProject {
    name: String,
    root: PathBuf,
    _extracted: Option<ExtractedProject>,
}

async fn prepare(config: &Config, source: &ProjectSource) -> Result<PreparedProject> {
    match source {
        ProjectSource::Directory(path) => Ok(PreparedProject {
            name: source.project_name(),
            root: path.clone(),
            _extracted: None,
        }),
        ProjectSource::Archive { path, file_name } => {
            let (path, file_name) = (path.clone(), file_name.clone());
            let limits = config.limits.clone();
            let extracted = tokio::task::spawn_blocking(move || {
                archive::extract_archive_as(&path, &file_name, &limits)
            })
            .await
            .map_err(|e| DocGenError::Message(format!("Extraction task failed: {}", e)))??;

            Ok(PreparedProject {
                name: extracted.name().to_string(),
                root: extracted.root().to_path_buf(),
                _extracted: Some(extracted),
            })
        }
    }
}

async fn walk(config: &Config, root: &Path, run: &RunConfig) -> Result<(Vec<FileDescriptor>, WalkStats)> {
    let root = root.to_path_buf();
    let run = run.clone();
    let excluded = config.excluded_dirs.clone();
    tokio::task::spawn_blocking(move || ProjectWalker::new(&root, &run, &excluded).collect_all())
        .await
        .map_err(|e| DocGenError::Message(format!("Walk task failed: {}", e)))
}

/// Lists the files a run would document; needs no endpoint or API key
pub async fn scan(config: &Config, source: &ProjectSource, run: &RunConfig) -> Result<ScanReport> {
    let project = prepare(config, source).await?;
    let (descriptors, stats) = walk(config, &project.root, run).await?;

    Ok(ScanReport {
        project_name: project.name,
        files: descriptors
            .iter()
            .map(|d| ScannedFile {
                path: d.path.clone(),
                language: d.language,
                size: d.size,
            })
            .collect(),
        stats,
    })
}

/// Extract → walk → orchestrate → aggregate
pub struct DocumentationPipeline {
    config: Config,
    client: DocumentationClient,
}

impl DocumentationPipeline {
    /// Creates a pipeline over `endpoint`
    pub fn new(config: Config, endpoint: Arc<dyn GenerationEndpoint>) -> Self {
        let client = DocumentationClient::new(endpoint, config.api.clone());
        Self { config, client }
    }

    /// Creates a pipeline calling the Anthropic Messages API with the configured key
    pub fn from_config(config: Config) -> Result<Self> {
        let api_key = config.api_keys.resolve()?;
        let endpoint = AnthropicEndpoint::new(api_key, &config.api)?;
        Ok(Self::new(config, Arc::new(endpoint)))
    }

    /// Application configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Documentation client used for the runs
    pub fn client(&self) -> &DocumentationClient {
        &self.client
    }

    /// Lists the files a run would document, without calling the endpoint
    pub async fn scan(&self, source: &ProjectSource, run: &RunConfig) -> Result<ScanReport> {
        scan(&self.config, source, run).await
    }

    /// Documents the project at `source`
    pub async fn run(&self, source: &ProjectSource, run: RunConfig, handle: RunHandle) -> Result<ProjectDocumentSet> {
        run.validate(&self.config)?;
        let project = prepare(&self.config, source).await?;
        let (descriptors, stats) = walk(&self.config, &project.root, &run).await?;
        info!(
            "{}: {} files included, {} skipped by the classifier",
            project.name,
            descriptors.len(),
            stats.total_skipped()
        );

        let mut orchestrator = Orchestrator::new(self.client.clone(), run.clone())
            .with_cancellation(handle.cancel.clone());
        if let Some(sender) = handle.progress {
            orchestrator = orchestrator.with_progress(sender);
        }
        let outcome = orchestrator.run(descriptors).await;

        let aggregator = ResultAggregator::new(project.name, &run);
        let mut set = aggregator.aggregate(outcome, &stats);
        aggregator.attach_overview(&mut set, &self.client).await;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockGenerationEndpoint;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}").unwrap();
        fs::write(dir.path().join("logo.png"), [0u8, 1, 2]).unwrap();
        dir
    }

    #[test]
    fn test_source_from_path() {
        let dir = project();
        assert!(matches!(ProjectSource::from_path(dir.path()).unwrap(), ProjectSource::Directory(_)));
        assert!(ProjectSource::from_path(dir.path().join("missing.zip")).is_err());
        assert!(matches!(
            ProjectSource::from_path(dir.path().join("logo.png")),
            Err(DocGenError::UnsupportedArchive(_))
        ));
    }

    #[tokio::test]
    async fn test_scan_makes_no_calls() {
        let mut endpoint = MockGenerationEndpoint::new();
        endpoint.expect_complete().times(0);
        let pipeline = DocumentationPipeline::new(Config::default(), Arc::new(endpoint));

        let dir = project();
        let source = ProjectSource::Directory(dir.path().to_path_buf());
        let report = pipeline.scan(&source, &pipeline.config().run_config()).await.unwrap();

        let paths: Vec<_> = report.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/lib.rs", "src/main.rs"]);
        assert_eq!(report.stats.total_skipped(), 1);
    }

    #[tokio::test]
    async fn test_run_attaches_overview() {
        let mut endpoint = MockGenerationEndpoint::new();
        endpoint
            .expect_complete()
            .times(3)
            .returning(|r| Ok(if r.prompt.contains("project overview") { "Overview".into() } else { "Docs".into() }));
        let pipeline = DocumentationPipeline::new(Config::default(), Arc::new(endpoint));

        let dir = project();
        let source = ProjectSource::Directory(dir.path().to_path_buf());
        let set = pipeline
            .run(&source, pipeline.config().run_config(), RunHandle::new())
            .await
            .unwrap();

        assert!(set.is_complete());
        assert_eq!(set.summary.succeeded, 2);
        assert_eq!(set.overview.as_deref(), Some("Overview"));
        assert!(set.directory_structure.is_some());
    }

    #[tokio::test]
    async fn test_invalid_run_config_is_rejected() {
        let endpoint = MockGenerationEndpoint::new();
        let pipeline = DocumentationPipeline::new(Config::default(), Arc::new(endpoint));
        let run = pipeline.config().run_config().with_max_file_size_mb(50);

        let dir = project();
        let source = ProjectSource::Directory(dir.path().to_path_buf());
        let err = pipeline.run(&source, run, RunHandle::new()).await.unwrap_err();
        assert!(matches!(err, DocGenError::Validation(_)));
    }
}
