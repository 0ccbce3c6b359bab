//! Archive extraction into a temporary project directory.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use flate2::read::GzDecoder;
use log::{debug, info};
use tempfile::TempDir;
use crate::config::Limits;
use crate::error::{DocGenError, Result};

/// Suffixes recognised as archives that cannot be extracted
const REJECTED_SUFFIXES: &[&str] = &[
    ".tar.bz2", ".tbz2", ".tar.xz", ".txz", ".7z", ".rar", ".gz", ".bz2", ".xz",
];

/// Entries created by macOS archivers, ignored when unwrapping
const METADATA_DIRS: &[&str] = &["__MACOSX"];

/// Archive formats that can be extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.zip`
    Zip,
    /// `.tar`
    Tar,
    /// `.tar.gz` / `.tgz`
    TarGz,
}

impl ArchiveKind {
    /// Detects the format from a file name
    pub fn detect(file_name: &str) -> Result<Self> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            return Ok(Self::TarGz);
        }
        if let Some(suffix) = REJECTED_SUFFIXES.iter().find(|s| lower.ends_with(*s)) {
            return Err(DocGenError::UnsupportedArchive(suffix.to_string()));
        }
        if lower.ends_with(".tar") {
            Ok(Self::Tar)
        } else if lower.ends_with(".zip") {
            Ok(Self::Zip)
        } else {
            let ext = Path::new(&lower)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_else(|| file_name.to_string());
            Err(DocGenError::UnsupportedArchive(ext))
        }
    }

    /// Suffix stripped from the file name to get the project name
    fn suffix_len(&self, lower_name: &str) -> usize {
        match self {
            Self::Zip => 4,
            Self::Tar => 4,
            Self::TarGz if lower_name.ends_with(".tgz") => 4,
            Self::TarGz => 7,
        }
    }
}

/// Checks if a file name looks like an archive this module accepts
pub fn is_supported_archive(file_name: &str) -> bool {
    ArchiveKind::detect(file_name).is_ok()
}

/// Project name derived from an archive file name
pub fn project_name_from_archive(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    match ArchiveKind::detect(&base) {
        Ok(kind) => {
            let cut = base.len().saturating_sub(kind.suffix_len(&base.to_lowercase()));
            base.get(..cut).unwrap_or(&base).to_string()
        }
        Err(_) => base,
    }
}

/// An archive extracted into a temporary directory, removed on drop
#[derive(Debug)]
pub struct ExtractedProject {
    temp: TempDir,
    root: PathBuf,
    name: String,
    entries: usize,
    bytes: u64,
}

impl ExtractedProject {
    /// Project root; a single top-level directory is already unwrapped
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Project name taken from the archive file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entries in the archive
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Bytes written while extracting
    pub fn extracted_bytes(&self) -> u64 {
        self.bytes
    }

    /// Temporary directory holding the extraction
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }
}

/// Tracks entry count and size against the limits while extracting
struct Budget<'a> {
    limits: &'a Limits,
    entries: usize,
    bytes: u64,
}

impl<'a> Budget<'a> {
    fn new(limits: &'a Limits) -> Self {
        Self { limits, entries: 0, bytes: 0 }
    }

    fn admit_entry(&mut self, name: &str) -> Result<()> {
        self.entries += 1;
        if self.entries > self.limits.max_archive_entries {
            return Err(DocGenError::Archive(format!(
                "Archive contains too many files (limit {})",
                self.limits.max_archive_entries
            )));
        }
        check_entry_name(name)
    }

    fn admit_bytes(&mut self, size: u64) -> Result<()> {
        self.bytes = self.bytes.saturating_add(size);
        if self.bytes > self.limits.max_extract_bytes {
            return Err(DocGenError::Archive(format!(
                "Archive too large when extracted (limit {} MB)",
                self.limits.max_extract_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }

    fn remaining(&self) -> u64 {
        self.limits.max_extract_bytes.saturating_sub(self.bytes)
    }
}

/// Rejects absolute names and names containing `..`
pub fn check_entry_name(name: &str) -> Result<()> {
    let absolute = name.starts_with('/')
        || name.starts_with('\\')
        || Path::new(name).components().any(|c| matches!(c, Component::Prefix(_) | Component::RootDir));
    if absolute || name.contains("..") {
        return Err(DocGenError::Archive(format!("Unsafe path: {}", name)));
    }
    Ok(())
}

/// Extracts the archive at `path` under `limits`
pub fn extract_archive(path: &Path, limits: &Limits) -> Result<ExtractedProject> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| DocGenError::Validation(format!("Not an archive file: {}", path.display())))?;
    extract_archive_as(path, &file_name, limits)
}

/// Extracts the archive at `path`, taking the format and project name from `file_name`
pub fn extract_archive_as(path: &Path, file_name: &str, limits: &Limits) -> Result<ExtractedProject> {
    let kind = ArchiveKind::detect(file_name)?;

    let size = fs::metadata(path)?.len();
    if size > limits.max_upload_bytes {
        return Err(DocGenError::Archive(format!(
            "Archive too large: {:.1}MB",
            size as f64 / (1024.0 * 1024.0)
        )));
    }

    let temp = TempDir::new()?;
    let dest = temp.path().join("extracted");
    fs::create_dir_all(&dest)?;

    let mut budget = Budget::new(limits);
    match kind {
        ArchiveKind::Zip => extract_zip(path, &dest, &mut budget)?,
        ArchiveKind::Tar => extract_tar(File::open(path)?, &dest, &mut budget)?,
        ArchiveKind::TarGz => extract_tar(GzDecoder::new(File::open(path)?), &dest, &mut budget)?,
    }

    let root = unwrap_single_directory(&dest)?;
    let name = project_name_from_archive(file_name);
    info!(
        "Extracted {} ({} entries, {} bytes) to {}",
        file_name,
        budget.entries,
        budget.bytes,
        root.display()
    );

    Ok(ExtractedProject {
        entries: budget.entries,
        bytes: budget.bytes,
        temp,
        root,
        name,
    })
}

fn extract_zip(path: &Path, dest: &Path, budget: &mut Budget<'_>) -> Result<()> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;

    // Headers are checked up front so a rejected archive writes nothing
    let mut declared = Budget::new(budget.limits);
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        declared.admit_entry(entry.name())?;
        declared.admit_bytes(entry.size())?;
    }

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        budget.admit_entry(entry.name())?;
        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| DocGenError::Archive(format!("Unsafe path: {}", entry.name())))?;
        let out = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let written = copy_limited(&mut entry, &out, budget.remaining())?;
        budget.admit_bytes(written)?;
    }
    Ok(())
}

fn extract_tar<R: Read>(reader: R, dest: &Path, budget: &mut Budget<'_>) -> Result<()> {
    let mut archive = tar::Archive::new(reader);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        budget.admit_entry(&name)?;

        let out = dest.join(&name);
        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                fs::create_dir_all(&out)?;
            }
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent)?;
                }
                let written = copy_limited(&mut entry, &out, budget.remaining())?;
                budget.admit_bytes(written)?;
            }
            other => debug!("Skipping tar entry {} of type {:?}", name, other),
        }
    }
    Ok(())
}

/// Copies at most `limit + 1` bytes so an oversized entry trips the budget
fn copy_limited<R: Read>(reader: &mut R, out: &Path, limit: u64) -> Result<u64> {
    let mut file = File::create(out)?;
    let mut limited = reader.take(limit.saturating_add(1));
    Ok(io::copy(&mut limited, &mut file)?)
}

fn unwrap_single_directory(dest: &Path) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(dest)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            !METADATA_DIRS.iter().any(|m| name == *m)
        })
        .collect();

    match entries.as_slice() {
        [only] if only.file_type().map(|t| t.is_dir()).unwrap_or(false) => Ok(only.path()),
        _ => Ok(dest.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_case::test_case;
    use zip::write::FileOptions;

    fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(name);
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        for (entry, content) in entries {
            zip.start_file(*entry, FileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    fn write_tar_gz(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(name);
        let encoder = flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (entry, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, entry, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    #[test_case("project.zip", ArchiveKind::Zip)]
    #[test_case("Project.TAR", ArchiveKind::Tar)]
    #[test_case("src.tar.gz", ArchiveKind::TarGz)]
    #[test_case("src.tgz", ArchiveKind::TarGz)]
    fn test_detect_supported(name: &str, kind: ArchiveKind) {
        assert_eq!(ArchiveKind::detect(name).unwrap(), kind);
    }

    #[test_case("a.7z")]
    #[test_case("a.rar")]
    #[test_case("a.tar.bz2")]
    #[test_case("a.tar.xz")]
    #[test_case("notes.txt")]
    fn test_detect_rejected(name: &str) {
        assert!(matches!(ArchiveKind::detect(name), Err(DocGenError::UnsupportedArchive(_))));
    }

    #[test]
    fn test_project_names() {
        assert_eq!(project_name_from_archive("my-app.zip"), "my-app");
        assert_eq!(project_name_from_archive("/tmp/uploads/lib.tar.gz"), "lib");
        assert_eq!(project_name_from_archive("lib.tgz"), "lib");
    }

    #[test]
    fn test_zip_with_single_top_level_dir_is_unwrapped() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(
            dir.path(),
            "demo.zip",
            &[("demo/src/main.rs", b"fn main() {}"), ("demo/README.md", b"# Demo")],
        );

        let project = extract_archive(&path, &Limits::default()).unwrap();
        assert_eq!(project.name(), "demo");
        assert!(project.root().join("src/main.rs").is_file());
        assert!(project.root().join("README.md").is_file());
        assert_eq!(project.entry_count(), 2);
    }

    #[test]
    fn test_tar_gz_extraction() {
        let dir = TempDir::new().unwrap();
        let path = write_tar_gz(dir.path(), "lib.tar.gz", &[("a.py", b"x = 1"), ("pkg/b.py", b"y = 2")]);

        let project = extract_archive(&path, &Limits::default()).unwrap();
        assert_eq!(project.name(), "lib");
        assert_eq!(fs::read_to_string(project.root().join("pkg/b.py")).unwrap(), "y = 2");
        assert_eq!(project.extracted_bytes(), 10);
    }

    #[test]
    fn test_path_traversal_rejected() {
        assert!(check_entry_name("../etc/passwd").is_err());
        assert!(check_entry_name("/etc/passwd").is_err());
        assert!(check_entry_name("a/../../b").is_err());
        assert!(check_entry_name("src/lib.rs").is_ok());
    }

    #[test]
    fn test_too_many_entries() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(dir.path(), "many.zip", &[("a.rs", b"a"), ("b.rs", b"b"), ("c.rs", b"c")]);
        let limits = Limits { max_archive_entries: 2, ..Limits::default() };

        let err = extract_archive(&path, &limits).unwrap_err();
        assert!(err.to_string().contains("too many files"));
    }

    #[test]
    fn test_extracted_size_limit() {
        let dir = TempDir::new().unwrap();
        let big = vec![b'a'; 4096];
        let path = write_tar_gz(dir.path(), "big.tgz", &[("a.txt", &big), ("b.txt", &big)]);
        let limits = Limits { max_extract_bytes: 6000, ..Limits::default() };

        let err = extract_archive(&path, &limits).unwrap_err();
        assert!(err.to_string().contains("too large when extracted"));
    }

    #[test]
    fn test_upload_size_limit() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(dir.path(), "a.zip", &[("a.rs", b"fn a() {}")]);
        let limits = Limits { max_upload_bytes: 10, ..Limits::default() };

        assert!(matches!(extract_archive(&path, &limits), Err(DocGenError::Archive(_))));
    }
}
