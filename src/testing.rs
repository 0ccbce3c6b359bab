//! Scripted generation endpoint shared by the unit and integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use tokio::time::Instant;
use crate::client::{CompletionRequest, GenerationEndpoint};
use crate::error::EndpointError;

/// Path recorded for calls without a `File:` line, i.e. the overview call
pub const OVERVIEW: &str = "<overview>";

/// One finished endpoint call
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// File the prompt was built for, or [`OVERVIEW`]
    pub path: String,
    /// When the call started
    pub started: Instant,
    /// When the call returned
    pub finished: Instant,
}

/// Endpoint returning `doc:<path>`, or the errors scripted for a path first
#[derive(Default)]
pub struct ScriptedEndpoint {
    script: Mutex<HashMap<String, Vec<EndpointError>>>,
    calls: Mutex<Vec<CallRecord>>,
    started: Mutex<Vec<String>>,
    delay: Duration,
    delays: HashMap<String, Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedEndpoint {
    /// Endpoint answering immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps `delay` inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sleeps `delay` in calls for `path` instead of the common delay
    pub fn with_delay_for(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    /// Queues `errors` for `path`; later calls succeed
    pub fn fail(self, path: &str, errors: Vec<EndpointError>) -> Self {
        self.lock_script().insert(path.to_string(), errors);
        self
    }

    /// Finished calls in completion order
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Paths of the started per-file calls, overview calls left out
    pub fn file_calls(&self) -> Vec<String> {
        self.started
            .lock()
            .map(|started| started.iter().filter(|p| *p != OVERVIEW).cloned().collect())
            .unwrap_or_default()
    }

    /// Most calls ever in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<EndpointError>>> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn path_of(request: &CompletionRequest) -> String {
    request
        .prompt
        .lines()
        .find_map(|l| l.strip_prefix("File: "))
        .unwrap_or(OVERVIEW)
        .to_string()
}

#[async_trait]
impl GenerationEndpoint for ScriptedEndpoint {
    async fn complete(&self, request: CompletionRequest) -> Result<String, EndpointError> {
        let path = path_of(&request);
        let started = Instant::now();
        if let Ok(mut log) = self.started.lock() {
            log.push(path.clone());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.get(&path).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(CallRecord {
                path: path.clone(),
                started,
                finished: Instant::now(),
            });
        }

        let next = self
            .lock_script()
            .get_mut(&path)
            .and_then(|errors| if errors.is_empty() { None } else { Some(errors.remove(0)) });
        match next {
            Some(e) => Err(e),
            None => Ok(format!("doc:{}", path)),
        }
    }
}
