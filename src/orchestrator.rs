//! Drives the documentation client over a project's files.
//!
//! Sequential, batch and concurrent processing share one dispatch loop over
//! a [`WorkerPool`]: the mode only sets the pool bound and, in batch mode, a
//! group boundary that is drained before the next group is admitted.

use std::sync::Arc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use crate::client::{DocumentationClient, DocumentationResult, Outcome, Prepared};
use crate::config::RunConfig;
use crate::error::FailureReason;
use crate::parallel::WorkerPool;
use crate::walker::{FileDescriptor, FileEntry};

/// Why a run stopped before every file was processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "message", rename_all = "snake_case")]
pub enum AbortReason {
    /// The endpoint rejected the API key
    AuthenticationError(String),
    /// The caller cancelled the run
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationError(msg) => write!(f, "authentication_error: {}", msg),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Not started
    Idle,
    /// Files are being dispatched
    Running,
    /// Every file has a result
    Completed,
    /// Stopped early
    Aborted {
        /// Why the run stopped
        reason: AbortReason,
    },
}

impl RunState {
    /// Checks if the run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted { .. })
    }

    /// Abort reason of an aborted run
    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            Self::Aborted { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Emitted after each individual result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Results produced so far, increasing by one per event
    pub processed: usize,
    /// Files in the run
    pub total: usize,
    /// File the result belongs to
    pub path: String,
    /// `success`, `failed` or `skipped`
    pub status: &'static str,
}

/// Everything a finished run hands to the aggregator
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Included files in walk order
    pub files: Vec<FileEntry>,
    /// One slot per file; `None` when the file was never processed
    pub results: Vec<Option<DocumentationResult>>,
    /// Terminal state
    pub state: RunState,
}

/// Runs the documentation client over a list of descriptors
pub struct Orchestrator {
    client: DocumentationClient,
    run: Arc<RunConfig>,
    progress: Option<UnboundedSender<ProgressEvent>>,
    cancel: CancellationToken,
    state: RunState,
}

impl Orchestrator {
    /// Creates an idle orchestrator
    pub fn new(client: DocumentationClient, run: RunConfig) -> Self {
        Self {
            client,
            run: Arc::new(run),
            progress: None,
            cancel: CancellationToken::new(),
            state: RunState::Idle,
        }
    }

    /// Sends a [`ProgressEvent`] on `sender` after each result
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Uses `token` to cancel the run
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current state
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Processes `descriptors` and returns the per-file results in their order
    pub async fn run(mut self, descriptors: Vec<FileDescriptor>) -> RunOutcome {
        let total = descriptors.len();
        let files: Vec<FileEntry> = descriptors.iter().map(FileEntry::from).collect();
        let mut results: Vec<Option<DocumentationResult>> = vec![None; total];

        self.state = RunState::Running;
        info!("Documenting {} files ({})", total, self.run.mode);

        let group_size = self.run.mode.group_size();
        let mut pool = WorkerPool::new(self.run.mode.concurrency_bound());
        let mut pending = descriptors.into_iter().enumerate().peekable();
        let mut admitted_in_group = 0usize;
        let mut processed = 0usize;
        let mut abort: Option<AbortReason> = None;

        loop {
            while abort.is_none() && pool.has_capacity() && pending.peek().is_some() {
                if group_size.map_or(false, |size| admitted_in_group >= size) {
                    break;
                }
                if self.cancel.is_cancelled() {
                    abort = Some(AbortReason::Cancelled);
                    break;
                }
                if let Some((index, descriptor)) = pending.next() {
                    debug!("Dispatching {} ({}/{})", descriptor.path, index + 1, total);
                    pool.spawn(index, document_file(
                        self.client.clone(),
                        self.run.clone(),
                        descriptor,
                        self.cancel.clone(),
                    ));
                    admitted_in_group += 1;
                }
            }

            let (index, joined) = match pool.next_completed().await {
                Some(completed) => completed,
                None if abort.is_none() && pending.peek().is_some() => {
                    admitted_in_group = 0;
                    continue;
                }
                None => break,
            };

            if self.cancel.is_cancelled() {
                abort.get_or_insert(AbortReason::Cancelled);
            }
            if abort == Some(AbortReason::Cancelled) {
                debug!("Discarding result for {} after cancellation", files[index].path);
                continue;
            }

            let result = joined.unwrap_or_else(|e| {
                warn!("Worker for {} failed: {}", files[index].path, e);
                DocumentationResult {
                    path: files[index].path.clone(),
                    language: files[index].language.clone(),
                    outcome: Outcome::Failed {
                        reason: FailureReason::InvalidResponse,
                        message: format!("worker task failed: {}", e),
                    },
                    retries: 0,
                }
            });

            if let Outcome::Failed { reason: FailureReason::AuthenticationError, message } = &result.outcome {
                if abort.is_none() {
                    warn!("Authentication failed, no further files will be dispatched");
                    abort = Some(AbortReason::AuthenticationError(message.clone()));
                }
            }

            processed += 1;
            if let Some(sender) = &self.progress {
                let _ = sender.send(ProgressEvent {
                    processed,
                    total,
                    path: result.path.clone(),
                    status: result.status_str(),
                });
            }

            let slot = &mut results[index];
            debug_assert!(slot.is_none(), "result slot written twice");
            if slot.is_none() {
                *slot = Some(result);
            }
        }

        self.state = match abort {
            Some(reason) => {
                warn!("Run aborted after {}/{} files: {}", processed, total, reason);
                RunState::Aborted { reason }
            }
            None => {
                info!("Run completed: {} files processed", processed);
                RunState::Completed
            }
        };

        RunOutcome {
            files,
            results,
            state: self.state,
        }
    }
}

/// Documents one file, retrying transient failures within the run's budget
async fn document_file(
    client: DocumentationClient,
    run: Arc<RunConfig>,
    descriptor: FileDescriptor,
    cancel: CancellationToken,
) -> DocumentationResult {
    let (request, truncated) = match client.prepare(&descriptor, &run) {
        Prepared::Skip(cause) => {
            return DocumentationResult::new(&descriptor, Outcome::Skipped { cause }, 0);
        }
        Prepared::Call { request, truncated } => (request, truncated),
    };

    let mut rate_limit_attempts = 0u32;
    let mut network_attempts = 0u32;

    loop {
        let call = client.call(request.clone()).await;
        let retry_delay = match &call {
            Err(e) if e.reason.is_transient() => {
                let attempts = if e.reason == FailureReason::RateLimited {
                    &mut rate_limit_attempts
                } else {
                    &mut network_attempts
                };
                if *attempts < run.retry.budget_for(e.reason) {
                    *attempts += 1;
                    Some(run.retry.delay_for(*attempts, e.retry_after))
                } else {
                    None
                }
            }
            _ => None,
        };

        let retries = rate_limit_attempts + network_attempts;
        match (retry_delay, call) {
            (Some(delay), Err(e)) => {
                warn!(
                    "{} for {}, retrying in {:?} (retry {})",
                    e.reason, descriptor.path, delay, retries
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return DocumentationResult::from_call(&descriptor, Err(e), truncated, retries);
                    }
                }
            }
            (_, call) => return DocumentationResult::from_call(&descriptor, call, truncated, retries),
        }
    }
}
