//! The pipeline coordinator.
//!
//! One entry point: prompt in, well-formed tree out. The coordinator calls
//! the collaborator, parses the artifact into the step trail, applies
//! scaffold defaults, builds the tree, and publishes the result. Failures
//! never escape: they become a single diagnostic file node so the display
//! layer always has something to show.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::artifact::{Step, parse_artifact};
use crate::errors::PipelineError;
use crate::tree::{FileMap, FileNode, build};

use super::collaborator::{Classification, Collaborator};
use super::scaffold::apply_scaffold;

/// Path of the synthetic file carrying a pipeline failure.
const DIAGNOSTIC_PATH: &str = "error.txt";

/// Everything one generation request produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Token identifying this request; stale outputs can be detected and
    /// discarded by comparing against `PipelineCoordinator::is_current`.
    pub request_id: Uuid,
    pub classification: Classification,
    /// Audit trail of parsed action steps. Not load-bearing for the tree.
    pub steps: Vec<Step>,
    /// Root-level nodes. Never empty: failures produce a diagnostic node.
    pub tree: Vec<FileNode>,
}

impl PipelineOutput {
    /// Whether this output is the failure singleton rather than a project.
    pub fn is_diagnostic(&self) -> bool {
        matches!(&self.tree[..], [node] if node.path == DIAGNOSTIC_PATH && node.is_file())
            && self.steps.is_empty()
    }
}

/// Consumer of finished pipeline outputs (the display layer seam).
pub trait Publisher: Send + Sync {
    fn publish(&self, output: &PipelineOutput);
}

/// Drives one generation request end to end.
pub struct PipelineCoordinator {
    collaborator: Arc<dyn Collaborator>,
    publisher: Option<Arc<dyn Publisher>>,
    latest: Mutex<Option<Uuid>>,
}

impl PipelineCoordinator {
    pub fn new(collaborator: Arc<dyn Collaborator>) -> Self {
        Self {
            collaborator,
            publisher: None,
            latest: Mutex::new(None),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Whether `request_id` belongs to the most recently issued request.
    pub fn is_current(&self, request_id: Uuid) -> bool {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        *latest == Some(request_id)
    }

    /// Run one generation request. Always returns a non-empty tree; a
    /// collaborator failure or empty file map yields the diagnostic
    /// singleton instead of an error.
    pub async fn generate(&self, prompt: &str) -> PipelineOutput {
        let request_id = Uuid::new_v4();
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(request_id);
        tracing::info!(%request_id, "generation request started");

        let output = match self.try_generate(prompt).await {
            Ok((classification, steps, files)) => PipelineOutput {
                request_id,
                classification,
                steps,
                tree: build(&files),
            },
            Err(error) => {
                tracing::warn!(%request_id, %error, "pipeline failed, emitting diagnostic");
                Self::diagnostic(request_id, &error)
            }
        };

        // A response superseded while in flight is dropped, not displayed.
        if self.is_current(request_id) {
            if let Some(publisher) = &self.publisher {
                publisher.publish(&output);
            }
        } else {
            tracing::debug!(%request_id, "discarding stale pipeline output");
        }
        output
    }

    async fn try_generate(
        &self,
        prompt: &str,
    ) -> Result<(Classification, Vec<Step>, FileMap), PipelineError> {
        let generation = self
            .collaborator
            .generate(prompt)
            .await
            .map_err(|e| PipelineError::Collaborator(e.to_string()))?;

        let steps = parse_artifact(&generation.raw_text);
        let mut files = generation.files;
        apply_scaffold(&mut files, generation.classification);

        if files.is_empty() {
            return Err(PipelineError::EmptyFileMap);
        }
        Ok((generation.classification, steps, files))
    }

    fn diagnostic(request_id: Uuid, error: &PipelineError) -> PipelineOutput {
        PipelineOutput {
            request_id,
            classification: Classification::Error,
            steps: Vec::new(),
            tree: vec![FileNode::file(
                DIAGNOSTIC_PATH,
                DIAGNOSTIC_PATH,
                error.to_string(),
            )],
        }
    }
}
