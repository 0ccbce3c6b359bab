//! Prompt text sent to the generation endpoint.

use std::collections::BTreeMap;
use crate::classifier::fence_tag;
use crate::config::DetailLevel;

/// Appended to content cut by [`truncate_content`]
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated...]";

/// Verbosity instruction for a detail level
pub fn detail_instruction(level: DetailLevel) -> &'static str {
    match level {
        DetailLevel::Basic => "Provide a basic overview with essential information only.",
        DetailLevel::Comprehensive => "Provide comprehensive documentation with a good balance of detail.",
        DetailLevel::Expert => {
            "Provide extremely detailed documentation with advanced insights and best practices."
        }
    }
}

/// Extra review points for languages that have them
pub fn language_extras(language: Option<&str>) -> &'static str {
    match language {
        Some("Python") => {
            "For Python files, also include:\n\
             - Docstring format compliance (Google style, NumPy, etc.)\n\
             - Type hints usage\n\
             - Recommended improvements to code organization"
        }
        Some("JavaScript") => {
            "For JavaScript files, also include:\n\
             - ES6+ feature usage\n\
             - Module pattern analysis\n\
             - Potential browser compatibility issues"
        }
        Some("TypeScript") => {
            "For TypeScript files, also include:\n\
             - Type system usage analysis\n\
             - Interface and type definitions overview\n\
             - Compilation target considerations"
        }
        Some("Java") => {
            "For Java files, also include:\n\
             - Class hierarchy analysis\n\
             - Design patterns used\n\
             - Exception handling overview"
        }
        Some("Rust") => {
            "For Rust files, also include:\n\
             - Ownership and borrowing patterns\n\
             - Error handling strategy\n\
             - Trait and generic usage"
        }
        _ => "",
    }
}

/// Builds the documentation prompt for one file
pub fn file_prompt(path: &str, language: Option<&str>, level: DetailLevel, content: &str) -> String {
    let language_name = language.unwrap_or("source");
    let extras = language_extras(language);

    let mut prompt = format!(
        "Please generate {} documentation for the following {} file.\n{}\n\n\
         Include:\n\
         1. Overall purpose and functionality\n\
         2. Detailed function/class documentation with parameters and return values\n\
         3. Code structure overview\n\
         4. Dependencies and requirements\n\
         5. Usage examples where appropriate\n\
         6. Potential issues or areas for improvement\n",
        level.as_str(),
        language_name,
        detail_instruction(level),
    );

    if !extras.is_empty() {
        prompt.push('\n');
        prompt.push_str(extras);
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "\nFile: {}\n\n```{}\n{}\n```\n\nFormat the documentation in clean, well-structured markdown.\n",
        path,
        fence_tag(language),
        content
    ));
    prompt
}

/// One documented file as fed into the overview prompt
#[derive(Debug, Clone, Copy)]
pub struct OverviewEntry<'a> {
    /// Relative path of the file
    pub path: &'a str,
    /// Language tag
    pub language: Option<&'a str>,
    /// Generated documentation
    pub documentation: &'a str,
}

impl OverviewEntry<'_> {
    fn directory(&self) -> &str {
        self.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    fn file_name(&self) -> &str {
        self.path.rsplit_once('/').map(|(_, name)| name).unwrap_or(self.path)
    }
}

fn group_by_directory<'a>(entries: &'a [OverviewEntry<'a>]) -> BTreeMap<&'a str, Vec<&'a OverviewEntry<'a>>> {
    let mut groups: BTreeMap<&str, Vec<&OverviewEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.directory()).or_default().push(entry);
    }
    groups
}

/// Documentation grouped by directory, each entry cut to `per_file_chars`
pub fn condensed_documentation(entries: &[OverviewEntry<'_>], per_file_chars: usize, ratio: f32) -> String {
    let mut sections = Vec::new();
    for (dir, files) in group_by_directory(entries) {
        if dir.is_empty() {
            sections.push("\n## Root Directory\n".to_string());
        } else {
            sections.push(format!("\n## Directory: {}/\n", dir));
        }
        for entry in files {
            let (doc, _) = truncate_content(entry.documentation, per_file_chars, ratio);
            sections.push(format!("### {}\n{}\n", entry.file_name(), doc));
        }
    }
    sections.join("\n")
}

/// Bare listing of files grouped by directory
pub fn file_listing(entries: &[OverviewEntry<'_>]) -> String {
    let mut lines = Vec::new();
    for (dir, files) in group_by_directory(entries) {
        if dir.is_empty() {
            lines.push("\n**Root Directory:**".to_string());
        } else {
            lines.push(format!("\n**Directory: {}/**", dir));
        }
        for entry in files {
            lines.push(format!(
                "  - {} ({})",
                entry.file_name(),
                entry.language.unwrap_or("Unknown")
            ));
        }
    }
    lines.join("\n")
}

/// Overview prompt built from condensed per-file documentation
pub fn overview_prompt(condensed: &str) -> String {
    format!(
        "Generate a comprehensive project overview based on the following detailed documentation \
         for each file in the codebase. Use the actual documentation content to understand the \
         project's purpose, architecture, and functionality.\n\n\
         {}\n\n\
         Based on this documentation, create a project overview with:\n\
         1. **Project Purpose** - What this project does and its main goals\n\
         2. **Architecture Overview** - How components work together\n\
         3. **Key Features** - Main functionality based on the documented code\n\
         4. **Technical Stack** - Technologies, frameworks, and patterns used\n\
         5. **Component Relationships** - How different parts interact\n\
         6. **Notable Implementation Details** - Interesting technical aspects\n\
         7. **Potential Improvements** - Only when there is an obvious or recurring issue\n\n\
         Format as a well-structured markdown document.\n",
        condensed
    )
}

/// Overview prompt built from a bare file listing
pub fn listing_overview_prompt(listing: &str) -> String {
    format!(
        "Please generate a project overview based on the following list of files in the codebase. \
         Create a summary that discusses the likely purpose of the project, its structure, \
         and how the files might relate to each other.\n\n\
         Project file structure:\n{}\n\n\
         Format your response as a comprehensive markdown document with sections for:\n\
         1. Project Purpose\n\
         2. Architecture Overview\n\
         3. Key Components\n\
         4. Directory Structure Analysis\n\
         5. Potential Dependencies and Technologies\n",
        listing
    )
}

/// Cuts `content` to at most `max_chars` characters.
///
/// The cut lands on the last `.` or newline when that boundary lies beyond
/// `ratio` of the budget, otherwise exactly at the budget. Returns the text
/// (with [`TRUNCATION_MARKER`] appended when cut) and whether it was cut.
pub fn truncate_content(content: &str, max_chars: usize, ratio: f32) -> (String, bool) {
    let end = match content.char_indices().nth(max_chars) {
        Some((idx, _)) => idx,
        None => return (content.to_string(), false),
    };

    let head = &content[..end];
    let boundary = head.rfind(['.', '\n']);
    let threshold = max_chars as f64 * f64::from(ratio);

    let cut = match boundary {
        Some(pos) if head[..pos].chars().count() as f64 > threshold => &head[..=pos],
        _ => head,
    };

    let mut text = String::with_capacity(cut.len() + TRUNCATION_MARKER.len());
    text.push_str(cut);
    text.push_str(TRUNCATION_MARKER);
    (text, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_content_untouched() {
        let (text, cut) = truncate_content("fn main() {}", 100, 0.7);
        assert_eq!(text, "fn main() {}");
        assert!(!cut);
    }

    #[test]
    fn test_exact_budget_untouched() {
        let (text, cut) = truncate_content("abcde", 5, 0.7);
        assert_eq!(text, "abcde");
        assert!(!cut);
    }

    #[test]
    fn test_cut_at_late_boundary() {
        let content = "aaaaaaaa.bbbbbbbbbb";
        let (text, cut) = truncate_content(content, 10, 0.7);
        assert!(cut);
        assert_eq!(text, format!("aaaaaaaa.{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_early_boundary_ignored() {
        let content = "aa.bbbbbbbbbbbbbbbb";
        let (text, cut) = truncate_content(content, 10, 0.7);
        assert!(cut);
        assert_eq!(text, format!("aa.bbbbbbb{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_multibyte_content_is_cut_on_char_boundary() {
        let content = "é".repeat(20);
        let (text, cut) = truncate_content(&content, 10, 0.7);
        assert!(cut);
        assert!(text.starts_with(&"é".repeat(10)));
        assert!(text.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_file_prompt_contents() {
        let prompt = file_prompt("src/app.py", Some("Python"), DetailLevel::Expert, "print(1)");
        assert!(prompt.contains("expert documentation for the following Python file"));
        assert!(prompt.contains(detail_instruction(DetailLevel::Expert)));
        assert!(prompt.contains("Docstring format compliance"));
        assert!(prompt.contains("File: src/app.py"));
        assert!(prompt.contains("```python\nprint(1)\n```"));
    }

    #[test]
    fn test_file_prompt_without_extras() {
        let prompt = file_prompt("style.css", Some("CSS"), DetailLevel::Basic, "a{}");
        assert!(!prompt.contains("also include"));
        assert!(prompt.contains("```css"));
    }

    #[test]
    fn test_condensed_documentation_groups_by_directory() {
        let entries = [
            OverviewEntry { path: "src/b.rs", language: Some("Rust"), documentation: "B docs" },
            OverviewEntry { path: "README.md", language: Some("Markdown"), documentation: "Readme" },
            OverviewEntry { path: "src/a.rs", language: Some("Rust"), documentation: "A docs" },
        ];
        let text = condensed_documentation(&entries, 1000, 0.7);

        let root = text.find("## Root Directory").unwrap();
        let src = text.find("## Directory: src/").unwrap();
        assert!(root < src);
        assert!(text.contains("### b.rs\nB docs"));

        let listing = file_listing(&entries);
        assert!(listing.contains("  - a.rs (Rust)"));
        assert!(listing.contains("**Root Directory:**"));
    }

    proptest::proptest! {
        #[test]
        fn prop_truncation_keeps_a_bounded_prefix(content in "\\PC{0,300}", max in 1usize..200) {
            let (text, cut) = truncate_content(&content, max, 0.7);
            proptest::prop_assert_eq!(cut, content.chars().count() > max);
            if cut {
                let kept = text.strip_suffix(TRUNCATION_MARKER).unwrap();
                proptest::prop_assert!(content.starts_with(kept));
                proptest::prop_assert!(kept.chars().count() <= max);
            } else {
                proptest::prop_assert_eq!(text, content);
            }
        }
    }
}
