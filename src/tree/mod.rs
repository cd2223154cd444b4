//! Project tree assembly: flat path→content map → hierarchical nodes.
//!
//! The builder walks each path's segments from the root, creating directory
//! nodes lazily and reusing them on later references, so a directory exists
//! exactly once no matter how many files live under it. Children keep
//! first-insertion order, which is the collaborator's emission order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered path→content map.
///
/// `insert` on an existing key overwrites the value but keeps the original
/// position, which is exactly the last-write-wins policy the tree builder
/// applies to duplicate paths.
pub type FileMap = IndexMap<String, String>;

/// Whether a node is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// One entry in the project tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// Final path segment.
    pub name: String,
    /// Full slash-joined path from the root.
    pub path: String,
    pub kind: NodeKind,
    /// File content. `None` for directories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Ordered children. Empty for files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

impl FileNode {
    /// Create a file node.
    pub fn file(
        name: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File,
            content: Some(content.into()),
            children: Vec::new(),
        }
    }

    /// Create an empty directory node.
    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Directory,
            content: None,
            children: Vec::new(),
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

/// Build the root-level node sequence from a flat file map.
///
/// Pure and deterministic given the map's iteration order.
pub fn build(files: &FileMap) -> Vec<FileNode> {
    let mut roots = Vec::new();
    for (path, content) in files {
        insert(&mut roots, path, content);
    }
    roots
}

/// Insert one path into the tree, creating intermediate directories lazily.
fn insert(roots: &mut Vec<FileNode>, path: &str, content: &str) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        tracing::debug!(path, "skipping file with empty path");
        return;
    }

    let mut level = roots;
    let mut prefix = String::new();

    for (i, segment) in segments.iter().enumerate() {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);

        if i == segments.len() - 1 {
            // Terminal segment: a file. Duplicate path → overwrite content
            // in place, keeping the node's original position.
            if let Some(existing) = level
                .iter_mut()
                .find(|n| n.is_file() && n.path == prefix)
            {
                existing.content = Some(content.to_string());
            } else {
                level.push(FileNode::file(*segment, prefix.clone(), content));
            }
        } else {
            let idx = match level
                .iter()
                .position(|n| n.kind == NodeKind::Directory && n.name == *segment)
            {
                Some(idx) => idx,
                None => {
                    level.push(FileNode::directory(*segment, prefix.clone()));
                    level.len() - 1
                }
            };
            level = &mut level[idx].children;
        }
    }
}

/// Depth-first flatten back to (path, content) pairs.
pub fn flatten(nodes: &[FileNode]) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for node in nodes {
        match node.kind {
            NodeKind::File => out.push((
                node.path.clone(),
                node.content.clone().unwrap_or_default(),
            )),
            NodeKind::Directory => out.extend(flatten(&node.children)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> FileMap {
        entries
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect()
    }

    #[test]
    fn test_build_shared_parent_directory_once() {
        let tree = build(&map(&[("a/b.txt", "x"), ("a/c.txt", "y")]));

        assert_eq!(tree.len(), 1);
        let dir = &tree[0];
        assert_eq!(dir.name, "a");
        assert_eq!(dir.kind, NodeKind::Directory);
        assert_eq!(dir.children.len(), 2);
        assert_eq!(dir.children[0].name, "b.txt");
        assert_eq!(dir.children[0].content.as_deref(), Some("x"));
        assert_eq!(dir.children[1].name, "c.txt");
        assert_eq!(dir.children[1].content.as_deref(), Some("y"));
    }

    #[test]
    fn test_build_mixed_roots_preserve_order() {
        let tree = build(&map(&[("package.json", "{}"), ("src/App.tsx", "code")]));

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0], FileNode::file("package.json", "package.json", "{}"));
        assert_eq!(tree[1].name, "src");
        assert_eq!(tree[1].kind, NodeKind::Directory);
        assert_eq!(tree[1].children.len(), 1);
        assert_eq!(tree[1].children[0].name, "App.tsx");
        assert_eq!(tree[1].children[0].path, "src/App.tsx");
    }

    #[test]
    fn test_build_deep_nesting_creates_each_prefix_once() {
        let tree = build(&map(&[
            ("src/components/Button.tsx", "b"),
            ("src/components/Input.tsx", "i"),
            ("src/lib/util.ts", "u"),
        ]));

        assert_eq!(tree.len(), 1);
        let src = &tree[0];
        assert_eq!(src.children.len(), 2);
        let components = &src.children[0];
        assert_eq!(components.name, "components");
        assert_eq!(components.children.len(), 2);
        let lib = &src.children[1];
        assert_eq!(lib.name, "lib");
        assert_eq!(lib.path, "src/lib");
    }

    #[test]
    fn test_flatten_round_trips_the_map() {
        let files = map(&[
            ("package.json", "{}"),
            ("src/main.tsx", "m"),
            ("src/App.tsx", "a"),
            ("src/styles/index.css", "c"),
        ]);
        let flattened = flatten(&build(&files));

        let expected: Vec<(String, String)> = files
            .iter()
            .map(|(p, c)| (p.clone(), c.clone()))
            .collect();
        assert_eq!(flattened, expected);
    }

    #[test]
    fn test_duplicate_path_last_write_wins_in_place() {
        let mut files = map(&[("a.txt", "first"), ("b.txt", "other")]);
        files.insert("a.txt".to_string(), "second".to_string());

        let tree = build(&files);
        assert_eq!(tree.len(), 2);
        // Position preserved, content overwritten.
        assert_eq!(tree[0].name, "a.txt");
        assert_eq!(tree[0].content.as_deref(), Some("second"));
    }

    #[test]
    fn test_build_empty_map_yields_empty_tree() {
        assert!(build(&FileMap::new()).is_empty());
    }

    #[test]
    fn test_build_ignores_empty_path() {
        let tree = build(&map(&[("", "x"), ("a.txt", "y")]));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].name, "a.txt");
    }

    #[test]
    fn test_build_tolerates_leading_slash() {
        let tree = build(&map(&[("/src/main.tsx", "m")]));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].name, "src");
        assert_eq!(tree[0].children[0].name, "main.tsx");
    }

    #[test]
    fn test_paths_unique_in_tree() {
        let files = map(&[
            ("a/b/c.txt", "1"),
            ("a/b/d.txt", "2"),
            ("a/e.txt", "3"),
        ]);
        let tree = build(&files);

        fn collect_paths(nodes: &[FileNode], out: &mut Vec<String>) {
            for n in nodes {
                out.push(n.path.clone());
                collect_paths(&n.children, out);
            }
        }
        let mut paths = Vec::new();
        collect_paths(&tree, &mut paths);
        let mut deduped = paths.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(paths.len(), deduped.len(), "every path appears exactly once");
    }
}
