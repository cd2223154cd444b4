//! Integration tests for kiln
//!
//! These tests drive the pipeline across module boundaries: artifact text
//! through the coordinator into a tree, and the tree through a sandbox
//! session to a served URL.

use std::sync::Arc;
use std::sync::Mutex;

use anyhow::bail;
use async_trait::async_trait;

use kiln::artifact::{Step, StepKind, parse_artifact};
use kiln::config::CommandSpec;
use kiln::errors::SessionError;
use kiln::pipeline::{
    Classification, Collaborator, Generation, PipelineCoordinator, PipelineOutput, Publisher,
};
use kiln::sandbox::{
    EventBus, LocalSandbox, MountTree, SandboxEvent, SandboxEventKind, SandboxHandle,
    SandboxService, SandboxSession, SandboxState, SpawnedProcess, Subscription,
};
use kiln::tree::{FileMap, NodeKind, build, flatten};

/// Collaborator returning a canned artifact.
struct CannedCollaborator {
    classification: Classification,
    raw_text: String,
}

#[async_trait]
impl Collaborator for CannedCollaborator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<Generation> {
        let steps = parse_artifact(&self.raw_text);
        let files: FileMap = kiln::artifact::file_writes(&steps).into_iter().collect();
        Ok(Generation {
            classification: self.classification,
            raw_text: self.raw_text.clone(),
            files,
        })
    }
}

struct FailingCollaborator;

#[async_trait]
impl Collaborator for FailingCollaborator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<Generation> {
        bail!("model endpoint unreachable")
    }
}

/// Instant in-memory sandbox that records what reached it.
struct MemorySandbox {
    shared: Arc<MemoryShared>,
}

struct MemoryShared {
    mounted: Mutex<Option<MountTree>>,
    spawned: Mutex<Vec<String>>,
    bus: EventBus,
}

impl MemorySandbox {
    fn new() -> Self {
        Self {
            shared: Arc::new(MemoryShared {
                mounted: Mutex::new(None),
                spawned: Mutex::new(Vec::new()),
                bus: EventBus::new(),
            }),
        }
    }
}

struct MemoryHandle {
    shared: Arc<MemoryShared>,
}

#[async_trait]
impl SandboxService for MemorySandbox {
    async fn boot(&self) -> anyhow::Result<Box<dyn SandboxHandle>> {
        Ok(Box::new(MemoryHandle {
            shared: self.shared.clone(),
        }))
    }
}

#[async_trait]
impl SandboxHandle for MemoryHandle {
    async fn mount(&self, tree: &MountTree) -> anyhow::Result<()> {
        *self.shared.mounted.lock().unwrap() = Some(tree.clone());
        Ok(())
    }

    async fn spawn(&self, program: &str, args: &[String]) -> anyhow::Result<SpawnedProcess> {
        let command = format!("{program} {}", args.join(" "));
        let is_install = command.contains("install");
        self.shared.spawned.lock().unwrap().push(command);

        let (out_tx, out_rx) = tokio::sync::mpsc::channel(4);
        let (exit_tx, exit_rx) = tokio::sync::oneshot::channel();
        out_tx.send("ok".to_string()).await.ok();
        drop(out_tx);

        if is_install {
            exit_tx.send(0).ok();
        } else {
            let bus = self.shared.bus.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                bus.emit(SandboxEvent::Ready {
                    url: "http://localhost:3002".to_string(),
                });
            });
        }
        Ok(SpawnedProcess {
            output: out_rx,
            exit: exit_rx,
        })
    }

    fn subscribe(&self, kind: SandboxEventKind) -> Subscription {
        self.shared.bus.subscribe(kind)
    }
}

const TODO_ARTIFACT: &str = r#"```xml
<action type="file" path="package.json">{ "name": "todo", "scripts": { "dev": "vite" } }</action>
<action type="file" path="src/App.tsx">export default function App() { return <h1>Todo</h1>; }</action>
<action type="file" path="src/index.css">body { margin: 0; }</action>
```"#;

// =============================================================================
// Parser → tree properties
// =============================================================================

mod parsing_and_assembly {
    use super::*;

    #[test]
    fn test_n_elements_yield_n_steps_in_source_order() {
        let steps = parse_artifact(TODO_ARTIFACT);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].path.as_deref(), Some("package.json"));
        assert_eq!(steps[1].path.as_deref(), Some("src/App.tsx"));
        assert_eq!(steps[2].path.as_deref(), Some("src/index.css"));
        assert!(steps.iter().all(|s| s.kind == StepKind::FileWrite));
    }

    #[test]
    fn test_flatten_reproduces_flat_map_exactly_once() {
        let files: FileMap = kiln::artifact::file_writes(&parse_artifact(TODO_ARTIFACT))
            .into_iter()
            .collect();
        let tree = build(&files);

        let flattened = flatten(&tree);
        assert_eq!(flattened.len(), files.len());
        for (path, content) in &flattened {
            assert_eq!(files.get(path).unwrap(), content);
        }
    }

    #[test]
    fn test_zero_matches_is_empty_not_error() {
        assert!(parse_artifact("nothing actionable in this reply").is_empty());
    }

    #[test]
    fn test_spec_example_two_files() {
        let steps = parse_artifact(
            r#"<action type="file" path="a.txt">hello</action><action type="file" path="b.txt">world</action>"#,
        );
        assert_eq!(
            steps,
            vec![
                Step::file_write("a.txt", "hello"),
                Step::file_write("b.txt", "world"),
            ]
        );
    }
}

// =============================================================================
// Coordinator → session, end to end over the in-memory sandbox
// =============================================================================

mod pipeline_to_preview {
    use super::*;

    fn commands() -> (CommandSpec, CommandSpec) {
        (
            CommandSpec::parse("npm install").unwrap(),
            CommandSpec::parse("npm run dev").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_generated_tree_serves_from_the_sandbox() {
        let coordinator = PipelineCoordinator::new(Arc::new(CannedCollaborator {
            classification: Classification::React,
            raw_text: TODO_ARTIFACT.to_string(),
        }));
        let output = coordinator.generate("a todo app").await;
        assert!(!output.is_diagnostic());

        let sandbox = MemorySandbox::new();
        let shared = sandbox.shared.clone();
        let (install, serve) = commands();
        let mut session = SandboxSession::new(Arc::new(sandbox), install, serve);

        let url = session.preview(&output.tree).await.unwrap();

        assert_eq!(url, "http://localhost:3002");
        assert_eq!(
            *session.state(),
            SandboxState::Serving("http://localhost:3002".to_string())
        );

        // The mount the sandbox saw contains both generated and scaffold
        // files, nested per directory.
        let mounted = shared.mounted.lock().unwrap();
        let mounted = mounted.as_ref().unwrap();
        assert!(mounted.contains_key("package.json"));
        assert!(mounted.contains_key("index.html"), "scaffold file mounted");
        assert!(mounted.contains_key("src"));

        let spawned = shared.spawned.lock().unwrap();
        assert_eq!(*spawned, vec!["npm install", "npm run dev"]);
    }

    #[tokio::test]
    async fn test_collaborator_failure_becomes_visible_diagnostic() {
        let coordinator = PipelineCoordinator::new(Arc::new(FailingCollaborator));
        let output = coordinator.generate("anything").await;

        assert!(output.is_diagnostic());
        assert_eq!(output.tree.len(), 1);
        assert_eq!(output.tree[0].kind, NodeKind::File);
        assert!(
            output.tree[0]
                .content
                .as_deref()
                .unwrap()
                .contains("model endpoint unreachable")
        );
        assert!(output.steps.is_empty());
    }

    #[tokio::test]
    async fn test_node_classification_without_files_stays_diagnostic() {
        let coordinator = PipelineCoordinator::new(Arc::new(CannedCollaborator {
            classification: Classification::Node,
            raw_text: "no actions in this reply".to_string(),
        }));
        let output = coordinator.generate("an api server").await;

        assert!(output.is_diagnostic());
    }

    #[tokio::test]
    async fn test_output_published_once_per_request() {
        #[derive(Default)]
        struct CountingPublisher {
            count: Mutex<u32>,
        }
        impl Publisher for CountingPublisher {
            fn publish(&self, _output: &PipelineOutput) {
                *self.count.lock().unwrap() += 1;
            }
        }

        let publisher = Arc::new(CountingPublisher::default());
        let coordinator = PipelineCoordinator::new(Arc::new(CannedCollaborator {
            classification: Classification::React,
            raw_text: TODO_ARTIFACT.to_string(),
        }))
        .with_publisher(publisher.clone());

        coordinator.generate("one").await;
        coordinator.generate("two").await;

        assert_eq!(*publisher.count.lock().unwrap(), 2);
    }
}

// =============================================================================
// Local process sandbox, driven by real subprocesses
// =============================================================================

mod local_preview {
    use super::*;

    #[tokio::test]
    async fn test_session_over_local_sandbox_reaches_serving() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(
            LocalSandbox::new(
                dir.path().join("workspace"),
                r"(https?://(?:localhost|127\.0\.0\.1)[^\s]*)",
            )
            .unwrap(),
        );

        let coordinator = PipelineCoordinator::new(Arc::new(CannedCollaborator {
            classification: Classification::React,
            raw_text: TODO_ARTIFACT.to_string(),
        }));
        let output = coordinator.generate("a todo app").await;

        let install = CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo installing deps".to_string()],
        };
        let serve = CommandSpec {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "echo 'Local: http://localhost:7777/'; sleep 1".to_string(),
            ],
        };
        let mut session = SandboxSession::new(sandbox, install, serve);

        let url = session.preview(&output.tree).await.unwrap();
        assert_eq!(url, "http://localhost:7777/");

        // The mount landed on disk, including nested scaffold files.
        let workspace = dir.path().join("workspace");
        assert!(workspace.join("package.json").exists());
        assert!(workspace.join("src/App.tsx").exists());
        assert!(workspace.join("index.html").exists());
        session.release();
    }

    #[tokio::test]
    async fn test_failing_install_fails_the_local_session() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(
            LocalSandbox::new(dir.path().join("ws"), r"(https?://\S+)").unwrap(),
        );

        let files: FileMap = [("index.js".to_string(), "x".to_string())]
            .into_iter()
            .collect();
        let tree = build(&files);

        let install = CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo broken >&2; exit 2".to_string()],
        };
        let serve = CommandSpec::parse("true").unwrap();
        let mut session = SandboxSession::new(sandbox, install, serve);

        let err = session.preview(&tree).await.unwrap_err();
        assert_eq!(err, SessionError::Install { exit_code: 2 });
        assert_eq!(*session.state(), SandboxState::Failed(err));
    }
}
