//! Generation collaborator seam.
//!
//! The collaborator turns a user prompt into a classification, the raw
//! artifact text, and a flat file map. It is constructed once at process
//! start and passed into the coordinator by reference; the pipeline never
//! reaches for a hidden global client.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

use crate::artifact::{file_writes, parse_artifact};
use crate::config::CommandSpec;
use crate::tree::FileMap;

/// What kind of project the collaborator decided to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    React,
    Node,
    /// The collaborator failed to pick a supported kind.
    Error,
}

impl Classification {
    /// Parse the collaborator's one-word framework reply.
    pub fn parse(reply: &str) -> Self {
        match reply.trim().to_lowercase().as_str() {
            "react" => Classification::React,
            "node" => Classification::Node,
            _ => Classification::Error,
        }
    }

    /// Whether the default scaffold files apply to this kind.
    pub fn scaffold_eligible(&self) -> bool {
        matches!(self, Classification::React)
    }
}

/// One generation result. Owned by the coordinator for the duration of a
/// request and superseded wholesale by the next one.
#[derive(Debug, Clone)]
pub struct Generation {
    pub classification: Classification,
    pub raw_text: String,
    pub files: FileMap,
}

/// The external generation service.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Turn a prompt into a generation result. Idempotent per call; may
    /// fail, and failures are caught at the coordinator boundary.
    async fn generate(&self, prompt: &str) -> Result<Generation>;
}

const CLASSIFY_PROMPT: &str = "Return either 'node' or 'react' based on what you think this \
project should be. Only return a single word: 'node' or 'react'.";

const GENERATE_PROMPT: &str = r#"Return the complete project as a list of file actions, one
element per file, in this exact format:

<action type="file" path="relative/path/to/file">full file contents</action>

Consider the contents of ALL files in the project. Do not wrap the output in
markdown fences and do not add commentary between elements."#;

/// Collaborator that shells out to a model CLI.
///
/// The configured command gets the prompt appended as its final argument
/// and must print the model reply on stdout.
pub struct CommandCollaborator {
    command: CommandSpec,
}

impl CommandCollaborator {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }

    async fn ask(&self, prompt: &str) -> Result<String> {
        let output = Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| {
                format!(
                    "Failed to execute collaborator command `{}`. Is it on your PATH?",
                    self.command
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Collaborator command failed: {}", stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl Collaborator for CommandCollaborator {
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        // Step 1: pick the project kind.
        let reply = self
            .ask(&format!("Project: {prompt}. {CLASSIFY_PROMPT}"))
            .await?;
        let classification = Classification::parse(&reply);
        tracing::info!(?classification, "collaborator classified the project");

        if classification == Classification::Error {
            // Unsupported reply. An empty map downstream becomes the
            // user-visible diagnostic.
            return Ok(Generation {
                classification,
                raw_text: reply,
                files: FileMap::new(),
            });
        }

        // Step 2: generate the project artifact.
        let framework = match classification {
            Classification::React => "a React application that is",
            _ => "a Node.js application with Express that serves",
        };
        let raw_text = self
            .ask(&format!("Generate {framework} {prompt}.\n\n{GENERATE_PROMPT}"))
            .await?;

        let steps = parse_artifact(&raw_text);
        let files: FileMap = file_writes(&steps).into_iter().collect();
        tracing::info!(files = files.len(), "collaborator produced file map");

        Ok(Generation {
            classification,
            raw_text,
            files,
        })
    }
}
