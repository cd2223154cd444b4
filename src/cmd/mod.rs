//! CLI command implementations.
//!
//! One function per `Commands` variant, plus the tracing bootstrap shared
//! by all of them.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use kiln::artifact::{file_writes, parse_artifact};
use kiln::config::{CommandSpec, SandboxConfig};
use kiln::errors::SessionError;
use kiln::pipeline::{CommandCollaborator, PipelineCoordinator};
use kiln::sandbox::{LocalSandbox, SandboxSession};
use kiln::tree::{FileMap, FileNode, build};
use kiln::ui::{ConsolePublisher, PreviewUi, render_steps, render_tree};

/// Install the tracing subscriber: stderr always, plus an optional
/// non-blocking file layer. The returned guard must stay alive for the
/// process lifetime or buffered file output is lost.
pub fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(if verbose { "kiln=debug,info" } else { "info" })
        });

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path
                .file_name()
                .context("Log file path has no file name")?;
            let appender =
                tracing_appender::rolling::never(dir.unwrap_or(Path::new(".")), name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// `kiln preview` — generate, assemble, and serve from the sandbox.
pub async fn cmd_preview(
    project_dir: &Path,
    prompt: &str,
    collaborator_cmd: &str,
    no_serve: bool,
) -> Result<()> {
    let config = SandboxConfig::load(project_dir)?;
    let collaborator = Arc::new(CommandCollaborator::new(
        CommandSpec::parse(collaborator_cmd).context("Invalid collaborator command")?,
    ));
    let coordinator =
        PipelineCoordinator::new(collaborator).with_publisher(Arc::new(ConsolePublisher));
    let ui = Arc::new(PreviewUi::new());

    ui.stage("Generating project...");
    let output = coordinator.generate(prompt).await;

    if output.is_diagnostic() {
        let reason = output.tree[0].content.clone().unwrap_or_default();
        ui.finish_failed(&reason);
        bail!("generation failed: {reason}");
    }
    if no_serve {
        ui.finish("Generated (serve skipped)");
        return Ok(());
    }

    let workspace = if config.workspace.is_absolute() {
        config.workspace.clone()
    } else {
        project_dir.join(&config.workspace)
    };
    let sandbox = Arc::new(LocalSandbox::new(workspace, &config.ready_pattern)?);
    let mut session = SandboxSession::new(sandbox, config.install.clone(), config.serve.clone())
        .with_retry_policy(config.retry_policy())
        .with_observer(ui.clone());

    match drive_session(&mut session, &ui, &output.tree).await {
        Ok(url) => {
            ui.finish_ready(&url);
            println!("Press Ctrl-C to stop the preview.");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            session.release();
            Ok(())
        }
        Err(err) => {
            ui.finish_failed(&err.to_string());
            session.release();
            Err(err.into())
        }
    }
}

async fn drive_session(
    session: &mut SandboxSession,
    ui: &PreviewUi,
    tree: &[FileNode],
) -> Result<String, SessionError> {
    ui.stage("Booting sandbox...");
    session.boot().await?;
    ui.stage("Mounting project files...");
    session.mount(tree).await?;
    ui.stage("Installing dependencies...");
    session.install().await?;
    ui.stage("Starting dev server...");
    session.run().await?;
    session.wait_ready().await
}

/// `kiln parse` — print the step trail of a saved artifact.
pub fn cmd_parse(artifact: &Path) -> Result<()> {
    let text = std::fs::read_to_string(artifact)
        .with_context(|| format!("Failed to read {}", artifact.display()))?;
    let steps = parse_artifact(&text);

    if steps.is_empty() {
        println!("No action elements found.");
        return Ok(());
    }
    for line in render_steps(&steps) {
        println!("{line}");
    }
    Ok(())
}

/// `kiln tree` — print the tree a saved artifact assembles into.
pub fn cmd_tree(artifact: &Path) -> Result<()> {
    let text = std::fs::read_to_string(artifact)
        .with_context(|| format!("Failed to read {}", artifact.display()))?;
    let files: FileMap = file_writes(&parse_artifact(&text)).into_iter().collect();

    if files.is_empty() {
        println!("No file actions found.");
        return Ok(());
    }
    print!("{}", render_tree(&build(&files)));
    Ok(())
}
