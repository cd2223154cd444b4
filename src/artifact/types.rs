//! Step types for the parsed artifact trail.
//!
//! A generation artifact is raw model text carrying zero or more
//! `<action>` elements. Each element becomes one `Step`, kept in source
//! order as an auditable trail of what the collaborator asked for.

use serde::{Deserialize, Serialize};

/// The kind of operation an action element describes.
///
/// The grammar is open-ended: `file` is the only kind the pipeline acts on
/// today, but unrecognized tags are preserved rather than dropped so the
/// trail stays faithful to the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// A file write (`type="file"`). Carries a target path.
    FileWrite,
    /// Any other action type, with the raw tag value.
    Other(String),
}

/// One parsed unit extracted from an artifact.
///
/// Immutable once produced; the sequence order is the appearance order in
/// the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,
    /// Target path. Present for file writes, optional otherwise.
    pub path: Option<String>,
    /// Element body, trimmed of surrounding whitespace.
    pub content: Option<String>,
}

impl Step {
    /// Create a file-write step.
    pub fn file_write(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: StepKind::FileWrite,
            path: Some(path.into()),
            content: Some(content.into()),
        }
    }

    /// Create a step for an unrecognized action type.
    pub fn other(tag: impl Into<String>, path: Option<String>, content: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Other(tag.into()),
            path,
            content: Some(content.into()),
        }
    }

    /// Whether this step writes a file.
    pub fn is_file_write(&self) -> bool {
        self.kind == StepKind::FileWrite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_write_step_carries_path_and_content() {
        let step = Step::file_write("src/App.tsx", "export default function App() {}");
        assert!(step.is_file_write());
        assert_eq!(step.path.as_deref(), Some("src/App.tsx"));
        assert_eq!(
            step.content.as_deref(),
            Some("export default function App() {}")
        );
    }

    #[test]
    fn test_other_step_preserves_tag() {
        let step = Step::other("shell", None, "npm install");
        assert!(!step.is_file_write());
        assert_eq!(step.kind, StepKind::Other("shell".to_string()));
        assert!(step.path.is_none());
    }
}
