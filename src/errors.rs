//! Typed error hierarchy for the kiln pipeline.
//!
//! Two top-level enums cover the two subsystems:
//! - `PipelineError` — generation and assembly failures, caught at the
//!   coordinator boundary and rendered as a diagnostic file
//! - `SessionError` — sandbox session failures, surfaced as a terminal
//!   `Failed` state

use thiserror::Error;

/// Errors from the generation/assembly side of the pipeline.
///
/// These never escape the coordinator: both variants are converted into a
/// single visible diagnostic file plus an empty step trail.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Collaborator call failed: {0}")]
    Collaborator(String),

    #[error("No files to preview: the collaborator returned an empty file map")]
    EmptyFileMap,
}

/// Errors that terminate a sandbox session.
///
/// Each variant maps to one stage of the boot → mount → install → run
/// sequence. Only boot is retried; everything else fails the session on the
/// first error. Cloneable so the terminal `Failed` state can carry it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Sandbox boot failed after {attempts} attempts: {last_error}")]
    BootExhausted { attempts: u32, last_error: String },

    #[error("Failed to mount project files: {0}")]
    Mount(String),

    #[error("Dependency install exited with code {exit_code}")]
    Install { exit_code: i32 },

    #[error("Dev server reported an error: {0}")]
    Runtime(String),
}
