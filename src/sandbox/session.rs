//! The sandbox session state machine.
//!
//! One session drives one preview: boot the sandbox (bounded retries),
//! mount the project tree, install dependencies, start the dev server, and
//! wait for whichever of the ready/error notifications fires first. The
//! state is a single field; a transition trail is kept for diagnostics.
//!
//! Teardown discipline: a session releases both of its event subscriptions
//! whenever it is superseded or dropped by its consumer, so a stale
//! notification can never mutate state belonging to a newer session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::config::CommandSpec;
use crate::errors::SessionError;
use crate::tree::FileNode;

use super::mount::to_mount_tree;
use super::retry::{RetryPolicy, retry};
use super::service::{
    SandboxEvent, SandboxEventKind, SandboxHandle, SandboxService, Subscription,
};

/// Lifecycle of one preview session.
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxState {
    Idle,
    Booting,
    Ready,
    Mounting,
    Installing,
    Starting,
    /// The dev server is reachable at this URL. Persists until teardown;
    /// the underlying process keeps running.
    Serving(String),
    Failed(SessionError),
}

/// One recorded state change.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: SandboxState,
    pub at: DateTime<Utc>,
}

/// Which process a forwarded output line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStage {
    Install,
    Serve,
}

/// Consumer of streamed subprocess output.
pub trait OutputObserver: Send + Sync {
    fn line(&self, stage: ProcessStage, line: &str);
}

/// Default observer: forward everything into the tracing log.
pub struct LogObserver;

impl OutputObserver for LogObserver {
    fn line(&self, stage: ProcessStage, line: &str) {
        match stage {
            ProcessStage::Install => tracing::info!(target: "kiln::install", "{line}"),
            ProcessStage::Serve => tracing::info!(target: "kiln::serve", "{line}"),
        }
    }
}

/// State machine for one sandboxed preview.
pub struct SandboxSession {
    service: Arc<dyn SandboxService>,
    install_cmd: CommandSpec,
    serve_cmd: CommandSpec,
    retry_policy: RetryPolicy,
    observer: Arc<dyn OutputObserver>,
    state: SandboxState,
    transitions: Vec<Transition>,
    handle: Option<Box<dyn SandboxHandle>>,
    subscriptions: Option<(Subscription, Subscription)>,
    forwarders: Vec<JoinHandle<()>>,
}

impl SandboxSession {
    pub fn new(
        service: Arc<dyn SandboxService>,
        install_cmd: CommandSpec,
        serve_cmd: CommandSpec,
    ) -> Self {
        Self {
            service,
            install_cmd,
            serve_cmd,
            retry_policy: RetryPolicy::default(),
            observer: Arc::new(LogObserver),
            state: SandboxState::Idle,
            transitions: Vec::new(),
            handle: None,
            subscriptions: None,
            forwarders: Vec::new(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn OutputObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> &SandboxState {
        &self.state
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Run the whole boot → mount → install → run → ready sequence and
    /// return the served URL.
    pub async fn preview(&mut self, tree: &[FileNode]) -> Result<String, SessionError> {
        self.boot().await?;
        self.mount(tree).await?;
        self.install().await?;
        self.run().await?;
        self.wait_ready().await
    }

    /// Boot a sandbox, retrying up to the policy's attempt bound with a
    /// fixed non-blocking delay between attempts.
    pub async fn boot(&mut self) -> Result<(), SessionError> {
        // Superseding sequence: drop the prior session's subscriptions
        // before anything else so no stale listener survives.
        self.release();
        self.set_state(SandboxState::Booting);

        let service = self.service.clone();
        let result = retry(self.retry_policy, |attempt| {
            let service = service.clone();
            async move {
                tracing::debug!(attempt, "requesting sandbox");
                service.boot().await
            }
        })
        .await;

        match result {
            Ok(handle) => {
                self.handle = Some(handle);
                self.set_state(SandboxState::Ready);
                Ok(())
            }
            Err(exhausted) => Err(self.fail(SessionError::BootExhausted {
                attempts: exhausted.attempts,
                last_error: exhausted.last_error.to_string(),
            })),
        }
    }

    /// Convert the tree into the mount structure and submit it. Terminal on
    /// failure; never retried.
    pub async fn mount(&mut self, tree: &[FileNode]) -> Result<(), SessionError> {
        self.set_state(SandboxState::Mounting);
        let mount_tree = to_mount_tree(tree);
        tracing::trace!(
            mount = %serde_json::to_string(&mount_tree).unwrap_or_default(),
            "submitting mount structure"
        );

        let Some(handle) = self.handle.as_ref() else {
            return Err(self.fail(SessionError::Mount(
                "session has no booted sandbox".to_string(),
            )));
        };
        let result = handle.mount(&mount_tree).await;

        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(SessionError::Mount(e.to_string()))),
        }
    }

    /// Spawn the dependency install and await its exit code, streaming its
    /// output to the observer the whole time.
    pub async fn install(&mut self) -> Result<(), SessionError> {
        self.set_state(SandboxState::Installing);

        let Some(handle) = self.handle.as_ref() else {
            return Err(self.fail(SessionError::Runtime(
                "install requested before boot".to_string(),
            )));
        };
        let result = handle
            .spawn(&self.install_cmd.program, &self.install_cmd.args)
            .await;

        let spawned = match result {
            Ok(spawned) => spawned,
            Err(e) => {
                return Err(self.fail(SessionError::Runtime(format!(
                    "failed to spawn install command: {e}"
                ))));
            }
        };

        self.forward_output(ProcessStage::Install, spawned.output);
        // Sender dropped without a code means the process never reported;
        // treat it as a failed install.
        let exit_code = spawned.exit.await.unwrap_or(-1);

        if exit_code != 0 {
            return Err(self.fail(SessionError::Install { exit_code }));
        }
        Ok(())
    }

    /// Subscribe to the ready/error notifications, then spawn the long
    /// lived serve process. Its exit is deliberately not awaited.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        self.set_state(SandboxState::Starting);

        let Some(handle) = self.handle.as_ref() else {
            return Err(self.fail(SessionError::Runtime(
                "run requested before boot".to_string(),
            )));
        };

        // Subscribe first so a server that comes up instantly cannot beat
        // the listener.
        let ready = handle.subscribe(SandboxEventKind::Ready);
        let error = handle.subscribe(SandboxEventKind::Error);

        let result = handle
            .spawn(&self.serve_cmd.program, &self.serve_cmd.args)
            .await;

        let spawned = match result {
            Ok(spawned) => spawned,
            Err(e) => {
                return Err(self.fail(SessionError::Runtime(format!(
                    "failed to spawn serve command: {e}"
                ))));
            }
        };

        self.forward_output(ProcessStage::Serve, spawned.output);
        self.subscriptions = Some((ready, error));
        Ok(())
    }

    /// Resolve the session against whichever notification fires first. The
    /// losing subscription is released before returning.
    pub async fn wait_ready(&mut self) -> Result<String, SessionError> {
        let Some((mut ready, mut error)) = self.subscriptions.take() else {
            return Err(self.fail(SessionError::Runtime(
                "no active run to wait on".to_string(),
            )));
        };

        let outcome = tokio::select! {
            event = ready.recv() => match event {
                Some(SandboxEvent::Ready { url }) => Ok(url),
                _ => Err(SessionError::Runtime(
                    "sandbox closed before the server became ready".to_string(),
                )),
            },
            event = error.recv() => match event {
                Some(SandboxEvent::Error { message }) => Err(SessionError::Runtime(message)),
                _ => Err(SessionError::Runtime(
                    "sandbox closed before the server became ready".to_string(),
                )),
            },
        };

        ready.release();
        error.release();

        match outcome {
            Ok(url) => {
                self.set_state(SandboxState::Serving(url.clone()));
                Ok(url)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Tear down this session's listeners. The sandboxed process itself is
    /// left running; only the subscriptions and output forwarders go.
    pub fn release(&mut self) {
        if let Some((ready, error)) = self.subscriptions.take() {
            tracing::debug!("releasing session subscriptions");
            ready.release();
            error.release();
        }
        for task in self.forwarders.drain(..) {
            task.abort();
        }
    }

    fn forward_output(
        &mut self,
        stage: ProcessStage,
        mut output: tokio::sync::mpsc::Receiver<String>,
    ) {
        let observer = self.observer.clone();
        let task = tokio::spawn(async move {
            while let Some(line) = output.recv().await {
                observer.line(stage, &line);
            }
        });
        self.forwarders.push(task);
    }

    fn set_state(&mut self, state: SandboxState) {
        tracing::debug!(state = ?state, "session transition");
        self.transitions.push(Transition {
            state: state.clone(),
            at: Utc::now(),
        });
        self.state = state;
    }

    fn fail(&mut self, error: SessionError) -> SessionError {
        self.set_state(SandboxState::Failed(error.clone()));
        error
    }
}
