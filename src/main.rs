use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(version, about = "AI preview pipeline - generated artifacts to a running app")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Append tracing output to this file in addition to stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a project from a prompt and serve it from the sandbox
    Preview {
        /// What to build
        prompt: String,

        /// Collaborator command; the prompt is appended as the last argument
        #[arg(long, env = "KILN_COLLABORATOR_CMD", default_value = "claude -p")]
        collaborator_cmd: String,

        /// Stop after printing the tree; skip the sandbox entirely
        #[arg(long)]
        no_serve: bool,
    },
    /// Parse a saved artifact file and print its step trail
    Parse {
        /// Path to a file holding raw collaborator output
        artifact: PathBuf,
    },
    /// Assemble and print the tree a saved artifact file produces
    Tree {
        /// Path to a file holding raw collaborator output
        artifact: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = cmd::init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Preview {
            prompt,
            collaborator_cmd,
            no_serve,
        } => cmd::cmd_preview(&project_dir, prompt, collaborator_cmd, *no_serve).await,
        Commands::Parse { artifact } => cmd::cmd_parse(artifact),
        Commands::Tree { artifact } => cmd::cmd_tree(artifact),
    }
}
