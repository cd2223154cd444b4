//! Seams to the external sandbox service.
//!
//! The pipeline only assumes an environment that can boot, mount a file
//! tree, spawn processes, and publish ready/error notifications. Everything
//! else — containers, VMs, a plain workspace directory — lives behind these
//! traits.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::mount::MountTree;

/// The two notification channels a sandbox exposes for its dev process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxEventKind {
    Ready,
    Error,
}

/// A notification published by the sandbox about the running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxEvent {
    /// The served app is reachable at this address.
    Ready { url: String },
    /// The dev process failed; human-readable description.
    Error { message: String },
}

impl SandboxEvent {
    pub fn kind(&self) -> SandboxEventKind {
        match self {
            SandboxEvent::Ready { .. } => SandboxEventKind::Ready,
            SandboxEvent::Error { .. } => SandboxEventKind::Error,
        }
    }
}

/// Provider of sandbox environments.
#[async_trait]
pub trait SandboxService: Send + Sync {
    /// Request a fresh environment handle. Fallible; callers retry.
    async fn boot(&self) -> Result<Box<dyn SandboxHandle>>;
}

/// One booted sandbox environment.
#[async_trait]
pub trait SandboxHandle: Send + Sync {
    /// Submit the nested mount structure.
    async fn mount(&self, tree: &MountTree) -> Result<()>;

    /// Spawn a process inside the sandbox.
    async fn spawn(&self, program: &str, args: &[String]) -> Result<SpawnedProcess>;

    /// Subscribe to one notification channel. The returned subscription must
    /// be released on session teardown.
    fn subscribe(&self, kind: SandboxEventKind) -> Subscription;
}

/// A process running inside the sandbox.
///
/// `output` carries interleaved stdout/stderr lines and stays live for the
/// whole process lifetime; `exit` resolves once, with the exit code. Long
/// lived processes (the dev server) simply never resolve `exit`.
pub struct SpawnedProcess {
    pub output: mpsc::Receiver<String>,
    pub exit: oneshot::Receiver<i32>,
}

/// Fan-out point for sandbox notifications.
///
/// Service implementations emit into the bus; sessions subscribe per event
/// kind. Emitting with no live subscribers drops the event, which is the
/// wanted behavior for a superseded or not-yet-listening session.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SandboxEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn emit(&self, event: SandboxEvent) {
        // Err means no subscriber is listening; nothing to deliver to.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self, kind: SandboxEventKind) -> Subscription {
        Subscription {
            kind,
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to one sandbox notification channel.
///
/// Holding the subscription keeps the channel open; releasing (or dropping)
/// it guarantees no further event can reach the holder. Sessions must
/// release both of their subscriptions on teardown so a stale notification
/// cannot mutate a superseded session's state.
pub struct Subscription {
    kind: SandboxEventKind,
    rx: broadcast::Receiver<SandboxEvent>,
}

impl Subscription {
    /// Wait for the next event on this subscription's channel.
    ///
    /// Returns `None` once the sandbox side shuts down the bus.
    pub async fn recv(&mut self) -> Option<SandboxEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.kind() == self.kind => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "sandbox subscription lagged, catching up");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Explicitly release the subscription.
    pub fn release(self) {
        drop(self);
    }
}
