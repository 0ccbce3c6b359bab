use serde::{Deserialize, Serialize};
use crate::render::RenderFormat;
use super::{DetailLevel, ProcessingMode, RunConfig};

const MB: u64 = 1024 * 1024;

/// Restrictions and quotas that apply while the shared demo key is in use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoLimits {
    /// Detail level every demo run uses
    pub detail_level: DetailLevel,
    /// Allows batch and concurrent mode; otherwise runs are sequential
    pub allow_parallel: bool,
    /// Per-file size cap in MB, also the largest accepted archive
    pub max_file_size_mb: u64,
    /// Formats demo results may be exported in
    pub export_formats: Vec<RenderFormat>,
    /// Files documented per server session
    pub max_session_files: usize,
    /// Archives documented per server session
    pub max_session_archives: usize,
    /// Files documented per calendar day
    pub max_daily_files: usize,
    /// Archives documented per calendar day
    pub max_daily_archives: usize,
    /// Source bytes documented per calendar day, in MB
    pub max_daily_size_mb: u64,
    /// Runs kept in the documentation history
    pub history_limit: usize,
}

impl Default for DemoLimits {
    fn default() -> Self {
        Self {
            detail_level: DetailLevel::Comprehensive,
            allow_parallel: false,
            max_file_size_mb: 20,
            export_formats: vec![RenderFormat::Markdown],
            max_session_files: 20,
            max_session_archives: 3,
            max_daily_files: 20,
            max_daily_archives: 3,
            max_daily_size_mb: 60,
            history_limit: 2,
        }
    }
}

impl DemoLimits {
    /// Forces the demo detail level and mode, and lowers the file size cap
    pub fn restrict(&self, mut run: RunConfig) -> RunConfig {
        run.detail_level = self.detail_level;
        if !self.allow_parallel {
            run.mode = ProcessingMode::Sequential;
        }
        run.max_file_size = run.max_file_size.min(self.max_file_size_bytes());
        run
    }

    /// Checks if demo results may be exported as `format`
    pub fn allows_export(&self, format: RenderFormat) -> bool {
        self.export_formats.contains(&format)
    }

    /// Per-file and per-archive size cap in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(MB)
    }

    /// Daily source size quota in bytes
    pub fn max_daily_size_bytes(&self) -> u64 {
        self.max_daily_size_mb.saturating_mul(MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_restrict_forces_demo_settings() {
        let config = Config::default();
        let run = config
            .run_config()
            .with_mode(ProcessingMode::Concurrent { max_workers: 8 })
            .with_max_file_size_mb(20);
        let mut expert = run.clone();
        expert.detail_level = DetailLevel::Expert;

        let limits = DemoLimits {
            max_file_size_mb: 2,
            ..DemoLimits::default()
        };
        let restricted = limits.restrict(expert);

        assert_eq!(restricted.detail_level, DetailLevel::Comprehensive);
        assert_eq!(restricted.mode, ProcessingMode::Sequential);
        assert_eq!(restricted.max_file_size, 2 * MB);
        assert_eq!(restricted.selected_extensions, run.selected_extensions);
    }

    #[test]
    fn test_restrict_keeps_smaller_size_and_parallel_mode_when_allowed() {
        let run = Config::default().run_config().with_max_file_size_mb(1);
        let limits = DemoLimits {
            allow_parallel: true,
            ..DemoLimits::default()
        };

        let restricted = limits.restrict(run.clone());
        assert_eq!(restricted.max_file_size, MB);
        assert_eq!(restricted.mode, run.mode);
    }

    #[test]
    fn test_only_markdown_export_by_default() {
        let limits = DemoLimits::default();
        assert!(limits.allows_export(RenderFormat::Markdown));
        assert!(!limits.allows_export(RenderFormat::Json));
        assert!(!limits.allows_export(RenderFormat::Html));
    }
}
