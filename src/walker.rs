use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use content_inspector::ContentType;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};
use crate::classifier::{classify, SkipReason};
use crate::config::RunConfig;

/// File content as read at scan time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// UTF-8 text
    Text(String),
    /// Bytes that are not UTF-8 text; documented as an explicit skip
    NonText,
}

/// One eligible file of the project, in walk order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Path relative to the project root, `/`-separated
    pub path: String,
    /// Language tag for a known extension
    pub language: Option<&'static str>,
    /// Size on disk in bytes
    pub size: u64,
    /// Content read at scan time
    pub content: FileContent,
}

impl FileDescriptor {
    /// Directory part of `path`, empty for files at the root
    pub fn directory(&self) -> &str {
        self.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    /// Last component of `path`
    pub fn file_name(&self) -> &str {
        self.path.rsplit_once('/').map(|(_, name)| name).unwrap_or(&self.path)
    }

    /// Language tag or "Unknown"
    pub fn language_name(&self) -> &'static str {
        self.language.unwrap_or("Unknown")
    }
}

/// Path and language of an included file, kept after its content is dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Relative `/`-separated path
    pub path: String,
    /// Language tag
    pub language: Option<String>,
}

impl From<&FileDescriptor> for FileEntry {
    fn from(d: &FileDescriptor) -> Self {
        Self {
            path: d.path.clone(),
            language: d.language.map(str::to_string),
        }
    }
}

/// Counts kept while walking, exposed for reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    /// Files yielded as descriptors
    pub included: usize,
    /// Files rejected by the classifier, per reason
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Files or directories that could not be read
    pub unreadable: usize,
}

impl WalkStats {
    /// Rejections for one reason
    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    /// All classifier rejections
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Lazy, ordered walk over an extracted project.
///
/// Entries of every directory are visited sorted by file name, so two walks
/// over the same tree yield the same sequence. Symlinks are not followed.
pub struct ProjectWalker<'a> {
    root: PathBuf,
    inner: walkdir::IntoIter,
    run: &'a RunConfig,
    excluded_dirs: &'a [String],
    stats: WalkStats,
}

impl<'a> ProjectWalker<'a> {
    /// Starts a walk at `root` under the run's classification policy
    pub fn new(root: impl AsRef<Path>, run: &'a RunConfig, excluded_dirs: &'a [String]) -> Self {
        let root = root.as_ref().to_path_buf();
        let inner = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();
        Self {
            root,
            inner,
            run,
            excluded_dirs,
            stats: WalkStats::default(),
        }
    }

    /// Counts gathered so far
    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    /// Drains the walk, returning descriptors and final counts
    pub fn collect_all(mut self) -> (Vec<FileDescriptor>, WalkStats) {
        let descriptors: Vec<_> = self.by_ref().collect();
        (descriptors, self.stats)
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.excluded_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
    }

    fn relative_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn describe(&mut self, entry: DirEntry) -> Option<FileDescriptor> {
        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                warn!("Skipping (metadata error): {} - {}", entry.path().display(), e);
                self.stats.unreadable += 1;
                return None;
            }
        };

        let classification = classify(entry.path(), size, self.run);
        if let Some(reason) = classification.reason {
            debug!("Skipping {} ({})", entry.path().display(), reason.as_str());
            *self.stats.skipped.entry(reason).or_insert(0) += 1;
            return None;
        }

        let bytes = match fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping (read error): {} - {}", entry.path().display(), e);
                self.stats.unreadable += 1;
                return None;
            }
        };

        let content = match content_inspector::inspect(&bytes) {
            ContentType::BINARY => FileContent::NonText,
            _ => match String::from_utf8(bytes) {
                Ok(text) => FileContent::Text(text),
                Err(_) => FileContent::NonText,
            },
        };

        self.stats.included += 1;
        Some(FileDescriptor {
            path: self.relative_path(entry.path()),
            language: classification.language,
            size,
            content,
        })
    }
}

impl Iterator for ProjectWalker<'_> {
    type Item = FileDescriptor;

    fn next(&mut self) -> Option<FileDescriptor> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path_str = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "unknown path".to_string());
                    warn!("Skipping (walk error): {} - {}", path_str, e);
                    self.stats.unreadable += 1;
                    continue;
                }
            };

            if self.is_excluded(&entry) {
                debug!("Pruning excluded directory {}", entry.path().display());
                self.inner.skip_current_dir();
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(descriptor) = self.describe(entry) {
                return Some(descriptor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/main.rs", b"fn main() {}\n");
        write(dir.path(), "src/lib.rs", b"pub mod a;\n");
        write(dir.path(), "README.md", b"# Demo\n");
        write(dir.path(), "assets/logo.png", &[0x89, 0x50, 0x4e, 0x47, 0, 0, 0]);
        write(dir.path(), "node_modules/dep/index.js", b"module.exports = 1;\n");
        write(dir.path(), "src/nested/util.py", b"def f():\n    return 1\n");
        dir
    }

    #[test]
    fn test_walk_order_and_stats() {
        let dir = fixture();
        let config = Config::default();
        let run = config.run_config();

        let (descriptors, stats) = ProjectWalker::new(dir.path(), &run, &config.excluded_dirs).collect_all();
        let paths: Vec<_> = descriptors.iter().map(|d| d.path.as_str()).collect();

        assert_eq!(paths, vec!["README.md", "src/lib.rs", "src/main.rs", "src/nested/util.py"]);
        assert_eq!(stats.included, 4);
        assert_eq!(stats.skipped_for(SkipReason::UnsupportedExtension), 1);
        assert_eq!(stats.unreadable, 0);
    }

    #[test]
    fn test_walk_is_stable() {
        let dir = fixture();
        let config = Config::default();
        let run = config.run_config();

        let first: Vec<_> = ProjectWalker::new(dir.path(), &run, &config.excluded_dirs).collect();
        let second: Vec<_> = ProjectWalker::new(dir.path(), &run, &config.excluded_dirs).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_too_large_files_are_counted() {
        let dir = TempDir::new().unwrap();
        let big = vec![b'a'; 1024 * 1024 + 1];
        write(dir.path(), "a.rs", b"fn a() {}");
        write(dir.path(), "b.rs", &big);
        write(dir.path(), "c.rs", b"fn c() {}");

        let config = Config::default();
        let run = config.run_config().with_max_file_size_mb(1);
        let mut walker = ProjectWalker::new(dir.path(), &run, &config.excluded_dirs);
        let paths: Vec<_> = walker.by_ref().map(|d| d.path).collect();

        assert_eq!(paths, vec!["a.rs", "c.rs"]);
        assert_eq!(walker.stats().skipped_for(SkipReason::TooLarge), 1);
    }

    #[test]
    fn test_non_utf8_content_is_marked() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "weird.rs", &[0xff, 0xfe, 0x00, 0x01, 0x02]);

        let config = Config::default();
        let run = config.run_config();
        let descriptors: Vec<_> = ProjectWalker::new(dir.path(), &run, &config.excluded_dirs).collect();

        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].content, FileContent::NonText);
    }

    #[test]
    fn test_descriptor_path_helpers() {
        let d = FileDescriptor {
            path: "src/nested/util.py".into(),
            language: Some("Python"),
            size: 1,
            content: FileContent::Text(String::new()),
        };
        assert_eq!(d.directory(), "src/nested");
        assert_eq!(d.file_name(), "util.py");

        let root = FileDescriptor { path: "README.md".into(), language: None, ..d };
        assert_eq!(root.directory(), "");
        assert_eq!(root.language_name(), "Unknown");
    }
}
