//! Collects per-file results into the project-level document set.

use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use crate::classifier::SkipReason;
use crate::client::{DocumentationClient, DocumentationResult, Outcome};
use crate::config::{DetailLevel, ProcessingMode, RunConfig};
use crate::error::FailureReason;
use crate::orchestrator::{AbortReason, RunOutcome, RunState};
use crate::prompts::{self, OverviewEntry};
use crate::render::tree::{build_directory_structure, DirectoryStructure};
use crate::walker::WalkStats;

/// Per-file doc budget in the overview input
const OVERVIEW_DOC_CHARS: usize = 1_000;
/// Per-file doc budget when the first condensation is over the input budget
const OVERVIEW_DOC_CHARS_REDUCED: usize = 500;

/// Counts reported for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Files accepted by the classifier
    pub total_files: usize,
    /// Files documented
    pub succeeded: usize,
    /// Files whose call failed terminally
    pub failed: usize,
    /// Files skipped without a call
    pub skipped: usize,
    /// Files never dispatched because the run was aborted
    pub not_processed: usize,
    /// Successes whose input was cut
    pub truncated: usize,
    /// Results that needed at least one retry
    pub retried: usize,
    /// Failures per reason
    pub failures_by_reason: BTreeMap<FailureReason, usize>,
    /// Classifier rejections per reason
    pub classifier_skipped: BTreeMap<SkipReason, usize>,
    /// Files that could not be read during the walk
    pub unreadable: usize,
}

impl RunSummary {
    fn from_results(total_files: usize, results: &[DocumentationResult], stats: &WalkStats) -> Self {
        let mut summary = Self {
            total_files,
            classifier_skipped: stats.skipped.clone(),
            unreadable: stats.unreadable,
            ..Self::default()
        };

        for result in results {
            if result.retries > 0 {
                summary.retried += 1;
            }
            match &result.outcome {
                Outcome::Success { truncated, .. } => {
                    summary.succeeded += 1;
                    if *truncated {
                        summary.truncated += 1;
                    }
                }
                Outcome::Failed { reason, .. } => {
                    summary.failed += 1;
                    *summary.failures_by_reason.entry(*reason).or_insert(0) += 1;
                }
                Outcome::Skipped { .. } => summary.skipped += 1,
            }
        }
        summary.not_processed = total_files - results.len();
        summary
    }
}

/// Terminal artifact of a run, handed to the renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocumentSet {
    /// Name shown in exports and history
    pub project_name: String,
    /// When the set was assembled
    pub generated_at: DateTime<Utc>,
    /// Detail level of the run
    pub detail_level: DetailLevel,
    /// Processing mode of the run
    pub mode: ProcessingMode,
    /// Results in walk order
    pub results: Vec<DocumentationResult>,
    /// Project overview text
    pub overview: Option<String>,
    /// Why the overview call failed
    pub overview_error: Option<String>,
    /// ASCII and Mermaid layout of the included files
    pub directory_structure: Option<DirectoryStructure>,
    /// Counts
    pub summary: RunSummary,
    /// How the run ended
    pub state: RunState,
}

impl ProjectDocumentSet {
    /// Abort reason when the run stopped early
    pub fn abort_reason(&self) -> Option<&AbortReason> {
        self.state.abort_reason()
    }

    /// Checks if every included file has a result
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Successful results only
    pub fn documented(&self) -> impl Iterator<Item = &DocumentationResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    /// Result for a path
    pub fn result_for(&self, path: &str) -> Option<&DocumentationResult> {
        self.results.iter().find(|r| r.path == path)
    }
}

/// Builds a [`ProjectDocumentSet`] from a finished run
pub struct ResultAggregator {
    project_name: String,
    detail_level: DetailLevel,
    mode: ProcessingMode,
    generate_overview: bool,
    generate_directory_structure: bool,
    boundary_ratio: f32,
}

impl ResultAggregator {
    /// Creates an aggregator for `project_name` under `run`
    pub fn new(project_name: impl Into<String>, run: &RunConfig) -> Self {
        Self {
            project_name: project_name.into(),
            detail_level: run.detail_level,
            mode: run.mode,
            generate_overview: run.generate_overview,
            generate_directory_structure: run.generate_directory_structure,
            boundary_ratio: run.truncation.boundary_ratio,
        }
    }

    /// Orders results by walk position and computes the summary
    pub fn aggregate(&self, outcome: RunOutcome, stats: &WalkStats) -> ProjectDocumentSet {
        let total_files = outcome.files.len();
        let results: Vec<DocumentationResult> = outcome.results.into_iter().flatten().collect();
        let summary = RunSummary::from_results(total_files, &results, stats);

        let directory_structure = if self.generate_directory_structure && total_files > 1 {
            Some(build_directory_structure(&outcome.files))
        } else {
            None
        };

        info!(
            "{}: {} succeeded, {} failed, {} skipped, {} not processed",
            self.project_name, summary.succeeded, summary.failed, summary.skipped, summary.not_processed
        );

        ProjectDocumentSet {
            project_name: self.project_name.clone(),
            generated_at: Utc::now(),
            detail_level: self.detail_level,
            mode: self.mode,
            results,
            overview: None,
            overview_error: None,
            directory_structure,
            summary,
            state: outcome.state,
        }
    }

    /// Checks if an overview call is warranted for `set`
    pub fn wants_overview(&self, set: &ProjectDocumentSet) -> bool {
        self.generate_overview && set.is_complete() && set.summary.succeeded >= 2
    }

    /// Builds the overview prompt, condensing until it fits `budget` characters
    pub fn overview_input(&self, set: &ProjectDocumentSet, budget: usize) -> String {
        let entries: Vec<OverviewEntry> = set
            .results
            .iter()
            .filter_map(|r| {
                r.documentation().map(|doc| OverviewEntry {
                    path: &r.path,
                    language: r.language.as_deref(),
                    documentation: doc,
                })
            })
            .collect();

        for per_file in [OVERVIEW_DOC_CHARS, OVERVIEW_DOC_CHARS_REDUCED] {
            let condensed = prompts::condensed_documentation(&entries, per_file, self.boundary_ratio);
            if condensed.chars().count() <= budget {
                return prompts::overview_prompt(&condensed);
            }
        }
        prompts::listing_overview_prompt(&prompts::file_listing(&entries))
    }

    /// Issues the overview call when warranted; a failure is recorded, never raised
    pub async fn attach_overview(&self, set: &mut ProjectDocumentSet, client: &DocumentationClient) {
        if !self.wants_overview(set) {
            return;
        }

        let prompt = self.overview_input(set, client.api().overview_input_chars);
        match client.generate_overview(prompt).await {
            Ok(overview) => {
                info!("Project overview generated for {}", set.project_name);
                set.overview = Some(overview);
                set.overview_error = None;
            }
            Err(e) => {
                warn!("Project overview failed: {}", e);
                set.overview_error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockGenerationEndpoint, SkipCause};
    use crate::config::{ApiSettings, Config};
    use crate::error::EndpointError;
    use crate::walker::FileEntry;
    use std::sync::Arc;

    fn result(path: &str, outcome: Outcome, retries: u32) -> DocumentationResult {
        DocumentationResult {
            path: path.to_string(),
            language: Some("Rust".to_string()),
            outcome,
            retries,
        }
    }

    fn success(path: &str, doc: &str) -> Option<DocumentationResult> {
        Some(result(
            path,
            Outcome::Success { documentation: doc.to_string(), truncated: false },
            0,
        ))
    }

    fn files(paths: &[&str]) -> Vec<FileEntry> {
        paths
            .iter()
            .map(|p| FileEntry { path: p.to_string(), language: Some("Rust".into()) })
            .collect()
    }

    fn aggregator() -> ResultAggregator {
        ResultAggregator::new("demo", &Config::default().run_config())
    }

    #[test]
    fn test_summary_counts() {
        let outcome = RunOutcome {
            files: files(&["a.rs", "b.rs", "c.rs", "d.rs"]),
            results: vec![
                Some(result("a.rs", Outcome::Success { documentation: "A".into(), truncated: true }, 1)),
                Some(result(
                    "b.rs",
                    Outcome::Failed { reason: FailureReason::Timeout, message: "slow".into() },
                    1,
                )),
                Some(result("c.rs", Outcome::Skipped { cause: SkipCause::NonTextContent }, 0)),
                success("d.rs", "D"),
            ],
            state: RunState::Completed,
        };
        let mut stats = WalkStats::default();
        stats.skipped.insert(SkipReason::TooLarge, 2);

        let set = aggregator().aggregate(outcome, &stats);
        let s = &set.summary;
        assert_eq!((s.total_files, s.succeeded, s.failed, s.skipped), (4, 2, 1, 1));
        assert_eq!(s.truncated, 1);
        assert_eq!(s.retried, 2);
        assert_eq!(s.not_processed, 0);
        assert_eq!(s.failures_by_reason.get(&FailureReason::Timeout), Some(&1));
        assert_eq!(s.classifier_skipped.get(&SkipReason::TooLarge), Some(&2));
        assert!(set.directory_structure.is_some());
    }

    #[test]
    fn test_aborted_run_reports_unprocessed() {
        let outcome = RunOutcome {
            files: files(&["a.rs", "b.rs", "c.rs"]),
            results: vec![success("a.rs", "A"), None, None],
            state: RunState::Aborted { reason: AbortReason::Cancelled },
        };
        let set = aggregator().aggregate(outcome, &WalkStats::default());

        assert_eq!(set.results.len(), 1);
        assert_eq!(set.summary.not_processed, 2);
        assert_eq!(set.abort_reason(), Some(&AbortReason::Cancelled));
        assert!(!aggregator().wants_overview(&set));
    }

    #[test]
    fn test_overview_input_falls_back_to_listing() {
        let outcome = RunOutcome {
            files: files(&["src/a.rs", "src/b.rs"]),
            results: vec![success("src/a.rs", &"a".repeat(5_000)), success("src/b.rs", &"b".repeat(5_000))],
            state: RunState::Completed,
        };
        let set = aggregator().aggregate(outcome, &WalkStats::default());
        let agg = aggregator();

        let full = agg.overview_input(&set, 10_000);
        assert!(full.contains(&"a".repeat(1_000)));

        let reduced = agg.overview_input(&set, 1_500);
        assert!(reduced.contains(&"a".repeat(500)));
        assert!(!reduced.contains(&"a".repeat(501)));

        let listing = agg.overview_input(&set, 100);
        assert!(listing.contains("  - a.rs (Rust)"));
        assert!(!listing.contains("aaaa"));
    }

    #[tokio::test]
    async fn test_overview_failure_is_recorded() {
        let mut endpoint = MockGenerationEndpoint::new();
        endpoint
            .expect_complete()
            .times(1)
            .returning(|_| Err(EndpointError::rate_limited("429", None)));
        let client = DocumentationClient::new(Arc::new(endpoint), ApiSettings::default());

        let outcome = RunOutcome {
            files: files(&["a.rs", "b.rs"]),
            results: vec![success("a.rs", "A"), success("b.rs", "B")],
            state: RunState::Completed,
        };
        let agg = aggregator();
        let mut set = agg.aggregate(outcome, &WalkStats::default());
        agg.attach_overview(&mut set, &client).await;

        assert!(set.overview.is_none());
        assert!(set.overview_error.as_deref().unwrap().contains("rate_limited"));
    }

    #[tokio::test]
    async fn test_single_success_gets_no_overview() {
        let mut endpoint = MockGenerationEndpoint::new();
        endpoint.expect_complete().times(0);
        let client = DocumentationClient::new(Arc::new(endpoint), ApiSettings::default());

        let outcome = RunOutcome {
            files: files(&["a.rs"]),
            results: vec![success("a.rs", "A")],
            state: RunState::Completed,
        };
        let agg = aggregator();
        let mut set = agg.aggregate(outcome, &WalkStats::default());
        agg.attach_overview(&mut set, &client).await;

        assert!(set.overview.is_none());
        assert!(set.directory_structure.is_none());
    }
}
