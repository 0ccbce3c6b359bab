use std::fmt::Write;
use crate::aggregator::ProjectDocumentSet;
use crate::client::Outcome;

const SEPARATOR: &str = "\n\n---\n\n";

/// Header lines describing the run
pub fn summary_block(set: &ProjectDocumentSet) -> String {
    let s = &set.summary;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "> Generated {} | detail level: {} | mode: {}",
        set.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        set.detail_level,
        set.mode
    );
    let _ = write!(
        out,
        "> {} files: {} documented, {} failed, {} skipped",
        s.total_files, s.succeeded, s.failed, s.skipped
    );
    if s.not_processed > 0 {
        let _ = write!(out, ", {} not processed", s.not_processed);
    }
    if s.truncated > 0 {
        let _ = write!(out, " ({} truncated)", s.truncated);
    }
    if let Some(reason) = set.abort_reason() {
        let _ = write!(out, "\n>\n> **Run aborted:** {}", reason);
    }
    out
}

/// Combined Markdown document: summary, structure, overview, then one section per file
pub fn render(set: &ProjectDocumentSet) -> String {
    let mut sections = vec![format!("# {} Documentation\n\n{}", set.project_name, summary_block(set))];

    if let Some(structure) = &set.directory_structure {
        sections.push(structure.ascii.clone());
    }

    match (&set.overview, &set.overview_error) {
        (Some(overview), _) => sections.push(format!("# Project Overview\n\n{}", overview.trim())),
        (None, Some(error)) => sections.push(format!("# Project Overview\n\n> Overview unavailable: {}", error)),
        (None, None) => {}
    }

    for result in &set.results {
        let body = match &result.outcome {
            Outcome::Success { documentation, truncated } => {
                let mut body = documentation.trim().to_string();
                if *truncated {
                    body.push_str("\n\n> Note: the source was truncated before documentation.");
                }
                body
            }
            Outcome::Failed { reason, message } => {
                format!("> Documentation failed ({}): {}", reason, message)
            }
            Outcome::Skipped { cause } => format!("> Skipped: {}", cause.as_str()),
        };
        sections.push(format!("## `{}`\n\n{}", result.path, body));
    }

    let mut out = sections.join(SEPARATOR);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{AbortReason, RunState};
    use crate::render::fixtures::sample_set;

    #[test]
    fn test_section_order() {
        let md = render(&sample_set());

        let title = md.find("# demo Documentation").unwrap();
        let tree = md.find("# Project Directory Structure").unwrap();
        let overview = md.find("# Project Overview").unwrap();
        let main = md.find("## `src/main.rs`").unwrap();
        let lib = md.find("## `src/lib.rs`").unwrap();
        assert!(title < tree && tree < overview && overview < main && main < lib);
    }

    #[test]
    fn test_status_notes() {
        let md = render(&sample_set());
        assert!(md.contains("> Documentation failed (rate_limited): API error (429): slow down"));
        assert!(md.contains("> Skipped: non_text_content"));
        assert!(md.contains("3 files: 1 documented, 1 failed, 1 skipped"));
    }

    #[test]
    fn test_abort_reason_is_shown() {
        let mut set = sample_set();
        set.state = RunState::Aborted {
            reason: AbortReason::AuthenticationError("invalid x-api-key".into()),
        };
        set.summary.not_processed = 2;

        let md = render(&set);
        assert!(md.contains("2 not processed"));
        assert!(md.contains("**Run aborted:** authentication_error: invalid x-api-key"));
    }
}
