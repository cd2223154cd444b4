//! Sandbox orchestration: service seams, the session state machine, and
//! the local process-backed implementation.

mod local;
mod mount;
mod retry;
mod service;
mod session;

pub use local::LocalSandbox;
pub use mount::{FileContents, MountEntry, MountTree, to_mount_tree};
pub use retry::{RetryExhausted, RetryPolicy, retry, retry_with_backoff};
pub use service::{
    EventBus, SandboxEvent, SandboxEventKind, SandboxHandle, SandboxService, SpawnedProcess,
    Subscription,
};
pub use session::{
    LogObserver, OutputObserver, ProcessStage, SandboxSession, SandboxState, Transition,
};
