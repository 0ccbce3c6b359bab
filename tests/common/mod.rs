#![allow(dead_code)]

use std::path::Path;
use autodocgen::config::Config;
use autodocgen::utils::RetryPolicy;
use tempfile::TempDir;

pub mod test_helpers {
    use super::*;

    /// Key matching the Anthropic key format
    pub fn valid_test_key() -> String {
        format!("sk-ant-api03-{}", "a".repeat(95))
    }

    /// Default config with millisecond back-off
    pub fn create_test_config() -> Config {
        let mut config = Config::default();
        config.retry = RetryPolicy {
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter: false,
            ..RetryPolicy::default()
        };
        config
    }

    pub fn setup_test_logger() {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    }

    /// Writes `files` (relative path, content) under a fresh temp dir
    pub fn write_project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().expect("temp dir");
        for (path, content) in files {
            write_file(dir.path(), path, content.as_bytes());
        }
        dir
    }

    pub fn write_file(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dirs");
        }
        std::fs::write(path, content).expect("write file");
    }
}

pub use autodocgen::testing::{CallRecord, ScriptedEndpoint, OVERVIEW};
