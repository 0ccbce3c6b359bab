use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use crate::orchestrator::ProgressEvent;

/// Progress bar driven by the orchestrator's progress events
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    /// Visible bar; the length is taken from the first event
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        Self { bar }
    }

    /// Bar that draws nothing
    pub fn hidden() -> Self {
        Self { bar: ProgressBar::hidden() }
    }

    /// Moves the bar to the state described by `event`
    pub fn apply(&self, event: &ProgressEvent) {
        self.bar.set_length(event.total as u64);
        self.bar.set_position(event.processed as u64);
        self.bar.set_message(format!("{} {}", event.status, event.path));
    }

    /// Files processed so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Consumes events until the sender side is dropped
    pub fn spawn(self, mut events: UnboundedReceiver<ProgressEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.apply(&event);
            }
            self.bar.finish_and_clear();
        })
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}
