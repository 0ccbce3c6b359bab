use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::walker::FileEntry;

/// Project layout rendered two ways
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStructure {
    /// Markdown section with a fenced ASCII tree
    pub ascii: String,
    /// Mermaid `graph TD` source
    pub mermaid: String,
}

#[derive(Default)]
struct DirNode {
    dirs: BTreeMap<String, DirNode>,
    files: Vec<(String, String)>,
}

impl DirNode {
    fn insert(&mut self, path: &str, language: &str) {
        let mut node = self;
        let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let Some(file) = parts.pop() else { return };
        for part in parts {
            node = node.dirs.entry(part.to_string()).or_default();
        }
        node.files.push((file.to_string(), language.to_string()));
    }

    fn sort(&mut self) {
        self.files.sort();
        self.dirs.values_mut().for_each(DirNode::sort);
    }
}

/// Builds the ASCII tree and Mermaid graph for `files`
pub fn build_directory_structure(files: &[FileEntry]) -> DirectoryStructure {
    let mut root = DirNode::default();
    for file in files {
        root.insert(&file.path, file.language.as_deref().unwrap_or("Unknown"));
    }
    root.sort();

    let mut lines = vec![
        "# Project Directory Structure".to_string(),
        "```".to_string(),
        "Project Root/".to_string(),
    ];
    ascii_lines(&root, "", &mut lines);
    lines.push("```".to_string());

    let mut mermaid = MermaidBuilder::default();
    let root_id = mermaid.node("Project Root/", false);
    mermaid.walk(&root, &root_id);

    DirectoryStructure {
        ascii: lines.join("\n"),
        mermaid: mermaid.finish(),
    }
}

fn ascii_lines(node: &DirNode, prefix: &str, lines: &mut Vec<String>) {
    let dir_count = node.dirs.len();
    for (i, (name, child)) in node.dirs.iter().enumerate() {
        let is_last = i == dir_count - 1 && node.files.is_empty();
        let connector = if is_last { "└── " } else { "├── " };
        lines.push(format!("{}{}{}/", prefix, connector, name));

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        ascii_lines(child, &child_prefix, lines);
    }

    let file_count = node.files.len();
    for (i, (name, language)) in node.files.iter().enumerate() {
        let connector = if i == file_count - 1 { "└── " } else { "├── " };
        lines.push(format!("{}{}{} ({})", prefix, connector, name, language));
    }
}

#[derive(Default)]
struct MermaidBuilder {
    lines: Vec<String>,
    counter: usize,
}

impl MermaidBuilder {
    fn node(&mut self, label: &str, quoted: bool) -> String {
        let id = format!("node{}", self.counter);
        self.counter += 1;
        let label = label.replace('"', "'");
        if quoted {
            self.lines.push(format!("    {}[\"{}\"]", id, label));
        } else {
            self.lines.push(format!("    {}[{}]", id, label));
        }
        id
    }

    fn edge(&mut self, from: &str, to: &str) {
        self.lines.push(format!("    {} --> {}", from, to));
    }

    fn walk(&mut self, node: &DirNode, parent: &str) {
        for (name, child) in &node.dirs {
            let id = self.node(&format!("{}/", name), true);
            self.edge(parent, &id);
            self.walk(child, &id);
        }
        for (name, _) in &node.files {
            let id = self.node(name, true);
            self.edge(parent, &id);
        }
    }

    fn finish(self) -> String {
        let mut out = String::from("graph TD");
        for line in self.lines {
            out.push('\n');
            out.push_str(&line);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(path: &str, language: Option<&str>) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            language: language.map(str::to_string),
        }
    }

    #[test]
    fn test_ascii_tree_dirs_first() {
        let files = vec![
            entry("setup.py", Some("Python")),
            entry("pkg/core/engine.py", Some("Python")),
            entry("pkg/__init__.py", Some("Python")),
            entry("README.md", Some("Markdown")),
        ];
        let structure = build_directory_structure(&files);

        let expected = "\
# Project Directory Structure
```
Project Root/
├── pkg/
│   ├── core/
│   │   └── engine.py (Python)
│   └── __init__.py (Python)
├── README.md (Markdown)
└── setup.py (Python)
```";
        assert_eq!(structure.ascii, expected);
    }

    #[test]
    fn test_last_directory_without_files() {
        let files = vec![entry("a/b/c.rs", Some("Rust"))];
        let structure = build_directory_structure(&files);
        assert!(structure.ascii.contains("└── a/\n    └── b/\n        └── c.rs (Rust)"));
    }

    #[test]
    fn test_mermaid_graph() {
        let files = vec![entry("src/main.rs", Some("Rust")), entry("Cargo.toml", None)];
        let structure = build_directory_structure(&files);

        let expected = "\
graph TD
    node0[Project Root/]
    node1[\"src/\"]
    node0 --> node1
    node2[\"main.rs\"]
    node1 --> node2
    node3[\"Cargo.toml\"]
    node0 --> node3";
        assert_eq!(structure.mermaid, expected);
    }

    #[test]
    fn test_unknown_language_label() {
        let structure = build_directory_structure(&[entry("build.gradle", None)]);
        assert!(structure.ascii.contains("└── build.gradle (Unknown)"));
    }
}
