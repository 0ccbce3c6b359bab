//! Export formats for a [`ProjectDocumentSet`].

pub mod html;
pub mod json;
pub mod markdown;
pub mod tree;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use log::info;
use serde::{Deserialize, Serialize};
use crate::aggregator::ProjectDocumentSet;
use crate::error::{DocGenError, Result};

pub use tree::{build_directory_structure, DirectoryStructure};

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    /// Combined Markdown document
    Markdown,
    /// Pretty-printed JSON of the whole set
    Json,
    /// Self-contained HTML page
    Html,
}

impl RenderFormat {
    /// All formats, in export order
    pub const ALL: [RenderFormat; 3] = [Self::Markdown, Self::Json, Self::Html];

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Html => "html",
        }
    }

    /// MIME type for HTTP responses
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Json => "application/json",
            Self::Html => "text/html; charset=utf-8",
        }
    }
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Html => "html",
        })
    }
}

impl FromStr for RenderFormat {
    type Err = DocGenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "html" | "htm" => Ok(Self::Html),
            other => Err(DocGenError::Validation(format!("Unknown export format: {}", other))),
        }
    }
}

/// Renders `set` in `format`
pub fn render(set: &ProjectDocumentSet, format: RenderFormat) -> Result<String> {
    match format {
        RenderFormat::Markdown => Ok(markdown::render(set)),
        RenderFormat::Json => json::render(set),
        RenderFormat::Html => Ok(html::render(set)),
    }
}

/// Export file name, `<project>_documentation.<ext>`
pub fn export_file_name(project_name: &str, format: RenderFormat) -> String {
    format!("{}_documentation.{}", sanitize_name(project_name), format.extension())
}

/// Writes `set` to `dir` in `format` and returns the file path
pub async fn export(set: &ProjectDocumentSet, format: RenderFormat, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(export_file_name(&set.project_name, format));
    tokio::fs::write(&path, render(set, format)?).await?;
    info!("Wrote {} export to {}", format, path.display());
    Ok(path)
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "project".to_string()
    } else {
        cleaned.to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_parsing() {
        assert_eq!("md".parse::<RenderFormat>().unwrap(), RenderFormat::Markdown);
        assert_eq!("HTML".parse::<RenderFormat>().unwrap(), RenderFormat::Html);
        assert!("pdf".parse::<RenderFormat>().is_err());
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("my-app", RenderFormat::Json), "my-app_documentation.json");
        assert_eq!(export_file_name("a b/c", RenderFormat::Markdown), "a_b_c_documentation.md");
        assert_eq!(export_file_name("..", RenderFormat::Html), "project_documentation.html");
    }

    #[tokio::test]
    async fn test_export_writes_every_format() -> Result<()> {
        let dir = TempDir::new()?;
        let set = fixtures::sample_set();

        for format in RenderFormat::ALL {
            let path = export(&set, format, dir.path()).await?;
            assert!(path.exists());
            assert_eq!(path.extension().and_then(|e| e.to_str()), Some(format.extension()));
        }
        Ok(())
    }
}
