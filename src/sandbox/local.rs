//! Process-backed sandbox for local previews.
//!
//! Realizes the sandbox contract without a hosted environment: "boot"
//! prepares a workspace directory, "mount" writes the tree to disk, "spawn"
//! runs commands there with their output streamed line by line, and a
//! watcher publishes the `ready` event as soon as a served URL shows up in
//! the output (or `error` if the process dies first).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use super::mount::{MountEntry, MountTree};
use super::service::{
    EventBus, SandboxEvent, SandboxEventKind, SandboxHandle, SandboxService, SpawnedProcess,
    Subscription,
};

/// Sandbox service backed by a workspace directory on the local machine.
pub struct LocalSandbox {
    workspace: PathBuf,
    ready_pattern: Regex,
}

impl LocalSandbox {
    /// `ready_pattern` is a regex whose first capture group (or whole
    /// match) is the served URL.
    pub fn new(workspace: impl Into<PathBuf>, ready_pattern: &str) -> Result<Self> {
        Ok(Self {
            workspace: workspace.into(),
            ready_pattern: Regex::new(ready_pattern)
                .with_context(|| format!("Invalid ready pattern: {ready_pattern}"))?,
        })
    }
}

#[async_trait]
impl SandboxService for LocalSandbox {
    async fn boot(&self) -> Result<Box<dyn SandboxHandle>> {
        tokio::fs::create_dir_all(&self.workspace)
            .await
            .with_context(|| {
                format!(
                    "Failed to create workspace directory {}",
                    self.workspace.display()
                )
            })?;
        tracing::debug!(workspace = %self.workspace.display(), "local sandbox booted");
        Ok(Box::new(LocalHandle {
            dir: self.workspace.clone(),
            bus: EventBus::new(),
            ready_pattern: self.ready_pattern.clone(),
        }))
    }
}

struct LocalHandle {
    dir: PathBuf,
    bus: EventBus,
    ready_pattern: Regex,
}

#[async_trait]
impl SandboxHandle for LocalHandle {
    async fn mount(&self, tree: &MountTree) -> Result<()> {
        write_entries(&self.dir, tree)
    }

    async fn spawn(&self, program: &str, args: &[String]) -> Result<SpawnedProcess> {
        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {program} in the sandbox"))?;

        let (out_tx, out_rx) = mpsc::channel(64);
        let (exit_tx, exit_rx) = oneshot::channel();

        let stdout = child.stdout.take().context("child stdout unavailable")?;
        let stderr = child.stderr.take().context("child stderr unavailable")?;
        pump_lines(
            stdout,
            out_tx.clone(),
            self.ready_pattern.clone(),
            self.bus.clone(),
        );
        pump_lines(stderr, out_tx, self.ready_pattern.clone(), self.bus.clone());

        let bus = self.bus.clone();
        let command = format!("{program} {}", args.join(" "));
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    tracing::debug!(command = %command, code, "sandbox process exited");
                    // A dropped receiver means nobody awaits this exit (the
                    // serve process); a failure there surfaces on the bus.
                    if exit_tx.send(code).is_err() && code != 0 {
                        bus.emit(SandboxEvent::Error {
                            message: format!("`{command}` exited with code {code}"),
                        });
                    }
                }
                Err(e) => {
                    bus.emit(SandboxEvent::Error {
                        message: format!("`{command}` could not be awaited: {e}"),
                    });
                }
            }
        });

        Ok(SpawnedProcess {
            output: out_rx,
            exit: exit_rx,
        })
    }

    fn subscribe(&self, kind: SandboxEventKind) -> Subscription {
        self.bus.subscribe(kind)
    }
}

/// Stream one pipe into the output channel, watching for the ready URL.
fn pump_lines<R>(reader: R, tx: mpsc::Sender<String>, pattern: Regex, bus: EventBus)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(caps) = pattern.captures(&line) {
                let url = caps
                    .get(1)
                    .unwrap_or_else(|| caps.get(0).expect("capture 0 always exists"))
                    .as_str()
                    .to_string();
                bus.emit(SandboxEvent::Ready { url });
            }
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
}

/// Materialize a mount tree under `dir`.
fn write_entries(dir: &Path, tree: &MountTree) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for (segment, entry) in tree {
        let path = dir.join(segment);
        match entry {
            MountEntry::File { file } => {
                std::fs::write(&path, &file.contents)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            MountEntry::Directory { directory } => {
                write_entries(&path, directory)?;
            }
        }
    }
    Ok(())
}
