//! Job manager and HTTP routes behind the `server` binary.

use crate::aggregator::{ProjectDocumentSet, RunSummary};
use crate::archive::ArchiveKind;
use crate::client::GenerationEndpoint;
use crate::config::{Config, RunConfig, RunOptions};
use crate::demo::{DemoStatus, DemoUsage};
use crate::error::DocGenError;
use crate::history::{DocumentationHistory, HistoryEntry};
use crate::orchestrator::{AbortReason, ProgressEvent};
use crate::pipeline::{self, DocumentationPipeline, ProjectSource, RunHandle};
use crate::render::{self, RenderFormat};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use uuid::Uuid;

/// Request payload for documenting a project already on the server's disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    /// Project directory or archive path
    pub path: String,
    /// Overrides of the configured run settings
    #[serde(default)]
    pub options: RunOptions,
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    /// Accepted, not started
    Queued,
    /// Pipeline running
    Running,
    /// Every file got a result
    Completed,
    /// Stopped early; see `abort_reason`
    Aborted,
    /// The pipeline itself failed, e.g. a rejected archive
    Failed,
}

impl JobPhase {
    /// Checks if the job will not change any more
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }
}

/// Job status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    /// Unique job identifier
    pub job_id: Uuid,
    /// Name of the project being documented
    pub project_name: String,
    /// Current phase
    pub phase: JobPhase,
    /// Why the run stopped early
    pub abort_reason: Option<AbortReason>,
    /// Files with a result so far
    pub processed: usize,
    /// Files in the run, known after the first result
    pub total: usize,
    /// Path of the latest result
    pub current_file: Option<String>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When the job was last updated
    pub updated_at: DateTime<Utc>,
    /// Pipeline error for failed jobs
    pub error: Option<String>,
    /// History id of a completed run
    pub history_id: Option<String>,
    /// Run counts once finished
    pub summary: Option<RunSummary>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current status
    pub status: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
    /// Service uptime in seconds
    pub uptime: u64,
    /// Queued or running jobs
    pub active_jobs: usize,
    /// Completed jobs
    pub completed_jobs: usize,
    /// Demo usage, when the server runs on the demo key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo: Option<DemoStatus>,
}

/// Errors returned by the HTTP routes
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown job or history id
    #[error("{0}")]
    NotFound(String),
    /// Invalid request
    #[error("{0}")]
    BadRequest(String),
    /// Path outside the allowed roots, or a demo limit
    #[error("{0}")]
    Forbidden(String),
    /// Upload above the configured limit
    #[error("{0}")]
    PayloadTooLarge(String),
    /// The job has no result yet
    #[error("{0}")]
    Conflict(String),
    /// Anything else
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DocGenError> for ApiError {
    fn from(err: DocGenError) -> Self {
        match err {
            DocGenError::Validation(_)
            | DocGenError::UnsupportedArchive(_)
            | DocGenError::Archive(_)
            | DocGenError::Zip(_) => Self::BadRequest(err.to_string()),
            DocGenError::LimitExceeded(_) => Self::Forbidden(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

struct Job {
    status: JobStatus,
    cancel: CancellationToken,
    result: Option<Arc<ProjectDocumentSet>>,
}

/// Job manager for tracking documentation runs
#[derive(Clone)]
pub struct JobManager {
    jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
    history: Arc<Mutex<DocumentationHistory>>,
    config: Arc<Config>,
    endpoint: Arc<dyn GenerationEndpoint>,
    demo: Option<Arc<Mutex<DemoUsage>>>,
    start_time: DateTime<Utc>,
}

/// Drops the oldest finished jobs until at most `keep` remain
fn prune_finished(jobs: &mut HashMap<Uuid, Job>, keep: usize) {
    let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
        .iter()
        .filter(|(_, job)| job.status.phase.is_finished())
        .map(|(id, job)| (job.status.updated_at, *id))
        .collect();
    if finished.len() <= keep {
        return;
    }
    finished.sort();
    let excess = finished.len() - keep;
    for (_, id) in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
}

impl JobManager {
    /// Creates a job manager running pipelines against `endpoint`
    pub fn new(config: Config, endpoint: Arc<dyn GenerationEndpoint>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            history: Arc::new(Mutex::new(DocumentationHistory::with_capacity(config.history_capacity))),
            config: Arc::new(config),
            endpoint,
            demo: None,
            start_time: Utc::now(),
        }
    }

    /// Applies the configured demo restrictions and quotas to every job
    pub fn with_demo_mode(mut self) -> Self {
        let limits = self.config.demo.clone();
        let capacity = self.config.history_capacity.min(limits.history_limit);
        self.history = Arc::new(Mutex::new(DocumentationHistory::with_capacity(capacity)));
        self.demo = Some(Arc::new(Mutex::new(DemoUsage::new(limits))));
        self
    }

    /// Checks if the demo restrictions apply
    pub fn is_demo(&self) -> bool {
        self.demo.is_some()
    }

    /// Application configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts a run over `source`; `upload` is removed once the run ends
    pub async fn submit(
        &self,
        source: ProjectSource,
        options: &RunOptions,
        upload: Option<TempDir>,
    ) -> Result<JobStatus, ApiError> {
        let mut run = options.to_run_config(&self.config);
        if self.is_demo() {
            run = self.config.demo.restrict(run);
        }
        run.validate(&self.config)?;
        self.charge_demo_usage(&source, &run).await?;

        let job_id = Uuid::new_v4();
        let now = Utc::now();
        let status = JobStatus {
            job_id,
            project_name: source.project_name(),
            phase: JobPhase::Queued,
            abort_reason: None,
            processed: 0,
            total: 0,
            current_file: None,
            created_at: now,
            updated_at: now,
            error: None,
            history_id: None,
            summary: None,
        };
        let cancel = CancellationToken::new();

        {
            let mut jobs = self.jobs.lock().await;
            jobs.insert(
                job_id,
                Job {
                    status: status.clone(),
                    cancel: cancel.clone(),
                    result: None,
                },
            );
            prune_finished(&mut jobs, self.config.server.max_finished_jobs);
        }
        info!("Job {} queued for {}", job_id, status.project_name);

        let manager = self.clone();
        tokio::spawn(async move {
            manager.execute(job_id, source, run, cancel).await;
            drop(upload);
        });

        Ok(status)
    }

    /// Stores an uploaded archive and starts a run over it
    pub async fn submit_upload(
        &self,
        file_name: &str,
        data: &[u8],
        options: &RunOptions,
    ) -> Result<JobStatus, ApiError> {
        let file_name = std::path::Path::new(file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ArchiveKind::detect(&file_name)?;

        let limit = self.config.limits.max_upload_bytes;
        if data.len() as u64 > limit {
            return Err(ApiError::PayloadTooLarge(format!(
                "Upload of {} bytes exceeds the limit of {} bytes",
                data.len(),
                limit
            )));
        }

        let upload = TempDir::new().map_err(DocGenError::from)?;
        let path = upload.path().join(&file_name);
        tokio::fs::write(&path, data).await.map_err(DocGenError::from)?;

        self.submit(ProjectSource::Archive { path, file_name }, options, Some(upload))
            .await
    }

    /// Counts a demo run against the quotas, refusing it when they are used up
    async fn charge_demo_usage(&self, source: &ProjectSource, run: &RunConfig) -> Result<(), ApiError> {
        let Some(demo) = &self.demo else {
            return Ok(());
        };
        let archive_size = match source {
            ProjectSource::Archive { path, .. } => {
                Some(tokio::fs::metadata(path).await.map_err(DocGenError::from)?.len())
            }
            ProjectSource::Directory(_) => None,
        };
        let report = pipeline::scan(&self.config, source, run).await?;
        let bytes: u64 = report.files.iter().map(|f| f.size).sum();

        let mut usage = demo.lock().await;
        if let Some(size) = archive_size {
            usage.check_archive(size)?;
        }
        usage.check_files(report.files.len(), bytes)?;
        usage.record(report.files.len(), bytes, archive_size.is_some());
        info!("Demo run of {} files ({} bytes) accepted", report.files.len(), bytes);
        Ok(())
    }

    /// Refuses export formats the demo restrictions leave out
    pub async fn check_export(&self, format: RenderFormat) -> Result<(), ApiError> {
        if let Some(demo) = &self.demo {
            demo.lock().await.check_export(format)?;
        }
        Ok(())
    }

    async fn update<F>(&self, job_id: Uuid, f: F)
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(&job_id) else {
            return;
        };
        let was_finished = job.status.phase.is_finished();
        f(job);
        job.status.updated_at = Utc::now();
        if !was_finished && job.status.phase.is_finished() {
            prune_finished(&mut jobs, self.config.server.max_finished_jobs);
        }
    }

    async fn execute(&self, job_id: Uuid, source: ProjectSource, run: RunConfig, cancel: CancellationToken) {
        self.update(job_id, |job| job.status.phase = JobPhase::Running).await;

        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
        let tracker = {
            let manager = self.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    manager
                        .update(job_id, |job| {
                            job.status.processed = event.processed;
                            job.status.total = event.total;
                            job.status.current_file = Some(event.path);
                        })
                        .await;
                }
            })
        };

        let pipeline = DocumentationPipeline::new((*self.config).clone(), self.endpoint.clone());
        let handle = RunHandle::new().with_cancellation(cancel).with_progress(tx);
        let result = pipeline.run(&source, run, handle).await;
        let _ = tracker.await;

        match result {
            Ok(set) => {
                let set = Arc::new(set);
                let history_id = if set.is_complete() {
                    Some(self.history.lock().await.add(set.clone()))
                } else {
                    None
                };
                info!(
                    "Job {} finished: {} documented, {} failed",
                    job_id, set.summary.succeeded, set.summary.failed
                );
                self.update(job_id, |job| {
                    job.status.phase = if set.is_complete() {
                        JobPhase::Completed
                    } else {
                        JobPhase::Aborted
                    };
                    job.status.abort_reason = set.abort_reason().cloned();
                    job.status.total = set.summary.total_files;
                    job.status.summary = Some(set.summary.clone());
                    job.status.history_id = history_id;
                    job.status.current_file = None;
                    job.result = Some(set.clone());
                })
                .await;
            }
            Err(e) => {
                error!("Job {} failed: {}", job_id, e);
                self.update(job_id, |job| {
                    job.status.phase = JobPhase::Failed;
                    job.status.error = Some(e.to_string());
                })
                .await;
            }
        }
    }

    /// Status of one job
    pub async fn status(&self, job_id: Uuid) -> Result<JobStatus, ApiError> {
        self.jobs
            .lock()
            .await
            .get(&job_id)
            .map(|job| job.status.clone())
            .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))
    }

    /// All jobs, newest first
    pub async fn list(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<JobStatus> = self.jobs.lock().await.values().map(|job| job.status.clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Requests cancellation; finished jobs are left unchanged
    pub async fn cancel(&self, job_id: Uuid) -> Result<JobStatus, ApiError> {
        let jobs = self.jobs.lock().await;
        let job = jobs
            .get(&job_id)
            .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))?;
        if !job.status.phase.is_finished() {
            info!("Cancelling job {}", job_id);
            job.cancel.cancel();
        }
        Ok(job.status.clone())
    }

    /// Forgets a finished job and its result
    pub async fn remove(&self, job_id: Uuid) -> Result<(), ApiError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .get(&job_id)
            .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))?;
        if !job.status.phase.is_finished() {
            return Err(ApiError::Conflict(format!("Job {} is still running", job_id)));
        }
        jobs.remove(&job_id);
        Ok(())
    }

    /// Document set of a finished job
    pub async fn result(&self, job_id: Uuid) -> Result<Arc<ProjectDocumentSet>, ApiError> {
        let jobs = self.jobs.lock().await;
        let job = jobs
            .get(&job_id)
            .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))?;
        job.result
            .clone()
            .ok_or_else(|| ApiError::Conflict(format!("Job {} has no result yet", job_id)))
    }

    /// Stored runs, newest first
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().await.list()
    }

    /// Stored run by history id
    pub async fn history_set(&self, id: &str) -> Result<Arc<ProjectDocumentSet>, ApiError> {
        self.history
            .lock()
            .await
            .get(id)
            .ok_or_else(|| ApiError::NotFound(format!("History entry not found: {}", id)))
    }

    /// Removes a stored run
    pub async fn remove_history(&self, id: &str) -> Result<(), ApiError> {
        if self.history.lock().await.remove(id) {
            Ok(())
        } else {
            Err(ApiError::NotFound(format!("History entry not found: {}", id)))
        }
    }

    /// Service health information
    pub async fn health(&self) -> HealthResponse {
        let jobs = self.jobs.lock().await;
        let active_jobs = jobs.values().filter(|job| !job.status.phase.is_finished()).count();
        let completed_jobs = jobs
            .values()
            .filter(|job| job.status.phase == JobPhase::Completed)
            .count();

        let demo = match &self.demo {
            Some(demo) => Some(demo.lock().await.status()),
            None => None,
        };

        HealthResponse {
            service: "autodocgen".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "healthy".to_string(),
            timestamp: Utc::now(),
            uptime: (Utc::now() - self.start_time).num_seconds().max(0) as u64,
            active_jobs,
            completed_jobs,
            demo,
        }
    }
}

/// HTTP routes over a shared job manager
pub fn router(manager: Arc<JobManager>) -> Router {
    let body_limit = manager.config().limits.max_upload_bytes as usize + 1024 * 1024;
    Router::new()
        .route("/health", get(health_check))
        .route("/api/upload", post(upload_archive))
        .route("/api/process", post(process_path))
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/:job_id", get(get_job_status).delete(delete_job))
        .route("/api/jobs/:job_id/cancel", post(cancel_job))
        .route("/api/jobs/:job_id/export/:format", get(export_job))
        .route("/api/history", get(list_history))
        .route("/api/history/:id", delete(delete_history))
        .route("/api/history/:id/export/:format", get(export_history))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(manager)
}

/// CORS policy allowing browser calls from `origins` only
pub fn cors_layer(origins: &[String]) -> crate::Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::new());
    }
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin.trim())
                .map_err(|_| DocGenError::Config(format!("Invalid CORS origin: {}", origin)))
        })
        .collect::<crate::Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]))
}

async fn health_check(State(manager): State<Arc<JobManager>>) -> Json<HealthResponse> {
    Json(manager.health().await)
}

async fn upload_archive(
    State(manager): State<Arc<JobManager>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<JobStatus>), ApiError> {
    let mut archive: Option<(String, Vec<u8>)> = None;
    let mut options = RunOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.zip").to_string();
                let data = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                archive = Some((file_name, data.to_vec()));
            }
            "options" => {
                let text = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                options = serde_json::from_str(&text)
                    .map_err(|e| ApiError::BadRequest(format!("Invalid options: {}", e)))?;
            }
            _ => {}
        }
    }

    let (file_name, data) = archive.ok_or_else(|| ApiError::BadRequest("Missing `file` field".into()))?;
    info!("Received upload {} ({} bytes)", file_name, data.len());
    let status = manager.submit_upload(&file_name, &data, &options).await?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn process_path(
    State(manager): State<Arc<JobManager>>,
    Json(request): Json<ProcessRequest>,
) -> Result<(StatusCode, Json<JobStatus>), ApiError> {
    let path = PathBuf::from(request.path.trim());
    if !manager.config().server.allows_path(&path) {
        warn!("Refused to process {}: outside the allowed roots", path.display());
        return Err(ApiError::Forbidden(format!(
            "{} is not under an allowed project root",
            path.display()
        )));
    }
    let source = ProjectSource::from_path(path)?;
    let status = manager.submit(source, &request.options, None).await?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn list_jobs(State(manager): State<Arc<JobManager>>) -> Json<Vec<JobStatus>> {
    Json(manager.list().await)
}

async fn get_job_status(
    State(manager): State<Arc<JobManager>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatus>, ApiError> {
    Ok(Json(manager.status(job_id).await?))
}

async fn cancel_job(
    State(manager): State<Arc<JobManager>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatus>, ApiError> {
    Ok(Json(manager.cancel(job_id).await?))
}

async fn delete_job(
    State(manager): State<Arc<JobManager>>,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    manager.remove(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn export_response(set: &ProjectDocumentSet, format: RenderFormat) -> Result<Response, ApiError> {
    let body = render::render(set, format)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        render::export_file_name(&set.project_name, format)
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn export_job(
    State(manager): State<Arc<JobManager>>,
    Path((job_id, format)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let format: RenderFormat = format.parse()?;
    manager.check_export(format).await?;
    let set = manager.result(job_id).await?;
    export_response(&set, format)
}

async fn list_history(State(manager): State<Arc<JobManager>>) -> Json<Vec<HistoryEntry>> {
    Json(manager.history().await)
}

async fn export_history(
    State(manager): State<Arc<JobManager>>,
    Path((id, format)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let format: RenderFormat = format.parse()?;
    manager.check_export(format).await?;
    let set = manager.history_set(&id).await?;
    export_response(&set, format)
}

async fn delete_history(
    State(manager): State<Arc<JobManager>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    manager.remove_history(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
