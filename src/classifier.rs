//! Extension and size policy deciding which files get documented.

use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::config::{normalize_extension, RunConfig};

/// Why the classifier left a file out
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Extension not in the run's allow-list
    UnsupportedExtension,
    /// File larger than the run's size limit
    TooLarge,
}

impl SkipReason {
    /// Stable snake_case tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedExtension => "unsupported_extension",
            Self::TooLarge => "too_large",
        }
    }
}

/// Outcome of classifying one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Whether the file is documented
    pub included: bool,
    /// Language tag for a known extension
    pub language: Option<&'static str>,
    /// Set when `included` is false
    pub reason: Option<SkipReason>,
}

/// Decides inclusion of a file from its path and size under `run`.
///
/// The extension check comes first, so a large binary blob is reported as
/// `unsupported_extension` rather than `too_large`.
pub fn classify(path: &Path, size: u64, run: &RunConfig) -> Classification {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension);
    let language = extension.as_deref().and_then(language_for_extension);

    let reason = match extension {
        Some(ref ext) if run.selected_extensions.contains(ext) => {
            if size > run.max_file_size {
                Some(SkipReason::TooLarge)
            } else {
                None
            }
        }
        _ => Some(SkipReason::UnsupportedExtension),
    };

    Classification {
        included: reason.is_none(),
        language,
        reason,
    }
}

/// Language tag for a dot-prefixed, lower-case extension
pub fn language_for_extension(extension: &str) -> Option<&'static str> {
    let language = match extension {
        ".py" => "Python",
        ".js" | ".jsx" => "JavaScript",
        ".ts" | ".tsx" => "TypeScript",
        ".java" => "Java",
        ".cpp" | ".cc" | ".cxx" => "C++",
        ".c" => "C",
        ".h" | ".hpp" => "C/C++ Header",
        ".cs" => "C#",
        ".go" => "Go",
        ".rb" => "Ruby",
        ".php" => "PHP",
        ".swift" => "Swift",
        ".kt" => "Kotlin",
        ".scala" => "Scala",
        ".rs" => "Rust",
        ".html" => "HTML",
        ".css" => "CSS",
        ".sql" => "SQL",
        ".sh" | ".bash" | ".zsh" => "Shell",
        ".yaml" | ".yml" => "YAML",
        ".json" => "JSON",
        ".toml" => "TOML",
        ".xml" => "XML",
        ".md" => "Markdown",
        _ => return None,
    };
    Some(language)
}

/// Fence tag used when quoting a file of this language in Markdown
pub fn fence_tag(language: Option<&str>) -> String {
    match language {
        Some("C++") => "cpp".to_string(),
        Some("C#") => "csharp".to_string(),
        Some("C/C++ Header") => "c".to_string(),
        Some(lang) => lang.to_lowercase(),
        None => String::new(),
    }
}
