//! Mount structure: the nested form the sandbox's mount call expects.
//!
//! Inverse of the flat map the tree was built from: a directory node becomes
//! a `directory` entry recursively containing its children, a file node a
//! `file` entry with its contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tree::{FileNode, NodeKind};

/// Top level of a mount submission: segment → entry.
pub type MountTree = BTreeMap<String, MountEntry>;

/// One entry in the mount structure.
///
/// Serializes to `{"file": {"contents": …}}` or
/// `{"directory": {segment: …}}`, the shape the sandbox mount call takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MountEntry {
    File { file: FileContents },
    Directory { directory: BTreeMap<String, MountEntry> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContents {
    pub contents: String,
}

/// Convert a node tree into the sandbox mount structure.
///
/// A file node with no content mounts as an empty file.
pub fn to_mount_tree(nodes: &[FileNode]) -> MountTree {
    nodes
        .iter()
        .map(|node| (node.name.clone(), to_entry(node)))
        .collect()
}

fn to_entry(node: &FileNode) -> MountEntry {
    match node.kind {
        NodeKind::File => MountEntry::File {
            file: FileContents {
                contents: node.content.clone().unwrap_or_default(),
            },
        },
        NodeKind::Directory => MountEntry::Directory {
            directory: node
                .children
                .iter()
                .map(|child| (child.name.clone(), to_entry(child)))
                .collect(),
        },
    }
}
