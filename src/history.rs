//! Bounded, newest-first store of previous documentation runs.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use crate::aggregator::ProjectDocumentSet;

/// Metadata shown when listing previous runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// `YYYYmmdd_HHMMSS_<hash>` identifier
    pub id: String,
    /// When the entry was recorded
    pub timestamp: DateTime<Local>,
    /// Human readable timestamp
    pub display_time: String,
    /// Project name of the run
    pub project_name: String,
    /// Number of results in the set
    pub file_count: usize,
    /// Distinct file extensions, without the dot
    pub file_types: Vec<String>,
    /// The set carries a project overview
    pub has_overview: bool,
    /// The set carries a directory structure
    pub has_structure: bool,
    /// Approximate JSON size in KB
    pub size_estimate_kb: usize,
}

/// Previous runs, newest first, holding at most `capacity` entries
#[derive(Debug)]
pub struct DocumentationHistory {
    capacity: usize,
    entries: VecDeque<(HistoryEntry, Arc<ProjectDocumentSet>)>,
}

impl DocumentationHistory {
    /// Creates an empty history keeping at most `capacity` runs
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Records `set` and returns its id; the oldest entry is evicted when full
    pub fn add(&mut self, set: impl Into<Arc<ProjectDocumentSet>>) -> String {
        let set = set.into();
        let timestamp = Local::now();
        let json = serde_json::to_string(&*set).unwrap_or_default();
        let hash = format!("{:x}", md5::compute(json.as_bytes()));
        let base_id = format!("{}_{}", timestamp.format("%Y%m%d_%H%M%S"), &hash[..8]);

        let mut id = base_id.clone();
        let mut n = 2;
        while self.get(&id).is_some() {
            id = format!("{}_{}", base_id, n);
            n += 1;
        }

        let file_types: BTreeSet<String> = set
            .results
            .iter()
            .filter_map(|r| r.path.rsplit_once('.').map(|(_, ext)| ext.to_lowercase()))
            .filter(|ext| !ext.contains('/'))
            .collect();

        let entry = HistoryEntry {
            id: id.clone(),
            timestamp,
            display_time: timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            project_name: set.project_name.clone(),
            file_count: set.results.len(),
            file_types: file_types.into_iter().collect(),
            has_overview: set.overview.is_some(),
            has_structure: set.directory_structure.is_some(),
            size_estimate_kb: json.len() / 1024,
        };

        self.entries.push_front((entry, set));
        self.entries.truncate(self.capacity);
        id
    }

    /// Metadata of every stored run, newest first
    pub fn list(&self) -> Vec<HistoryEntry> {
        self.entries.iter().map(|(entry, _)| entry.clone()).collect()
    }

    /// Document set recorded under `id`
    pub fn get(&self, id: &str) -> Option<Arc<ProjectDocumentSet>> {
        self.entries
            .iter()
            .find(|(entry, _)| entry.id == id)
            .map(|(_, set)| set.clone())
    }

    /// Removes the run recorded under `id`
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| entry.id != id);
        self.entries.len() < before
    }

    /// Removes every run
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored runs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of stored runs
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::fixtures::sample_set;
    use regex::Regex;

    fn named(name: &str) -> ProjectDocumentSet {
        let mut set = sample_set();
        set.project_name = name.to_string();
        set
    }

    #[test]
    fn test_add_and_metadata() {
        let mut history = DocumentationHistory::with_capacity(10);
        let id = history.add(sample_set());

        let id_format = Regex::new(r"^\d{8}_\d{6}_[0-9a-f]{8}$").unwrap();
        assert!(id_format.is_match(&id), "unexpected id {}", id);

        let entry = &history.list()[0];
        assert_eq!(entry.project_name, "demo");
        assert_eq!(entry.file_count, 3);
        assert_eq!(entry.file_types, vec!["json", "rs"]);
        assert!(entry.has_overview);
        assert!(entry.has_structure);
        assert_eq!(history.get(&id).unwrap().project_name, "demo");
    }

    #[test]
    fn test_newest_first_and_bounded() {
        let mut history = DocumentationHistory::with_capacity(2);
        let first = history.add(named("one"));
        history.add(named("two"));
        history.add(named("three"));

        let names: Vec<_> = history.list().into_iter().map(|e| e.project_name).collect();
        assert_eq!(names, vec!["three", "two"]);
        assert!(history.get(&first).is_none());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_same_content_gets_distinct_ids() {
        let mut history = DocumentationHistory::with_capacity(10);
        let a = history.add(sample_set());
        let b = history.add(sample_set());
        assert_ne!(a, b);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut history = DocumentationHistory::with_capacity(10);
        let id = history.add(sample_set());
        history.add(named("other"));

        assert!(history.remove(&id));
        assert!(!history.remove(&id));
        assert_eq!(history.len(), 1);

        history.clear();
        assert!(history.is_empty());
    }
}
