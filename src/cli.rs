use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm};
use crate::aggregator::ProjectDocumentSet;
use crate::error::{DocGenError, Result};
use crate::pipeline::ScanReport;

/// Prints the banner at the start of the CLI.
pub fn print_banner() {
    let banner = format!(
        "{}\n{}\n{}",
        "   ___       __       ___            ".blue(),
        "  / _ |__ __/ /____  / _ \\___  ____  AutoDocGen".bold().green(),
        " /_/ |_\\_,_/\\__/\\___/____/\\___/\\__/  Code documentation generator".bold().green(),
    );
    println!("{}", banner);
}

/// Prints an info message.
pub fn print_info(message: &str) {
    println!("{}", message.green());
}

/// Prints a warning message.
pub fn print_warning(message: &str) {
    println!("{}", message.yellow());
}

/// Prints an error message.
pub fn print_error(message: &str) {
    eprintln!("{}", message.red());
}

/// Prints a section header
pub fn print_section(title: &str) {
    let border = "=".repeat(title.len() + 4);
    println!("\n{}", border.bright_blue());
    println!("  {}", title.bright_white().bold());
    println!("{}\n", border.bright_blue());
}

/// Asks a yes/no question
pub fn confirm(prompt: &str) -> Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(true)
        .interact()
        .map_err(|e| DocGenError::Message(e.to_string()))
}

/// Human readable byte size
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Summary lines for a finished run, uncoloured
pub fn summary_lines(set: &ProjectDocumentSet) -> Vec<String> {
    let s = &set.summary;
    let mut lines = vec![
        format!("Project:        {}", set.project_name),
        format!("Files:          {}", s.total_files),
        format!("Documented:     {}", s.succeeded),
        format!("Failed:         {}", s.failed),
        format!("Skipped:        {}", s.skipped),
    ];
    if s.not_processed > 0 {
        lines.push(format!("Not processed:  {}", s.not_processed));
    }
    if s.truncated > 0 {
        lines.push(format!("Truncated:      {}", s.truncated));
    }
    if s.retried > 0 {
        lines.push(format!("Retried:        {}", s.retried));
    }
    for (reason, count) in &s.failures_by_reason {
        lines.push(format!("  {}: {}", reason, count));
    }
    for (reason, count) in &s.classifier_skipped {
        lines.push(format!("Excluded ({}): {}", reason.as_str(), count));
    }
    if let Some(error) = &set.overview_error {
        lines.push(format!("Overview unavailable: {}", error));
    }
    lines
}

/// Prints the run summary with the outcome coloured
pub fn print_summary(set: &ProjectDocumentSet) {
    print_section("Documentation summary");
    for line in summary_lines(set) {
        println!("{}", line);
    }
    match set.abort_reason() {
        Some(reason) => print_error(&format!("Run aborted: {}", reason)),
        None if set.summary.failed > 0 => print_warning("Run completed with failures"),
        None => print_info("Run completed"),
    }
}

/// Prints the files a run would document
pub fn print_scan(report: &ScanReport) {
    print_section(&format!("{}: {} files", report.project_name, report.files.len()));
    for file in &report.files {
        println!(
            "  {} {} {}",
            file.path.bright_white(),
            format!("({})", file.language.unwrap_or("Unknown")).cyan(),
            format_size(file.size).dimmed()
        );
    }
    for (reason, count) in &report.stats.skipped {
        print_warning(&format!("Skipped ({}): {}", reason.as_str(), count));
    }
    if report.stats.unreadable > 0 {
        print_warning(&format!("Unreadable: {}", report.stats.unreadable));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::fixtures::sample_set;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_summary_lines() {
        let lines = summary_lines(&sample_set());
        assert_eq!(lines[0], "Project:        demo");
        assert!(lines.contains(&"Failed:         1".to_string()));
        assert!(lines.contains(&"Skipped:        1".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("Not processed")));
    }
}
