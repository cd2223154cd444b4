//! Terminal rendering for the preview pipeline.
//!
//! `PreviewUi` is a single `indicatif` spinner that tracks the session
//! stages and mirrors the latest subprocess output line. It doubles as the
//! session's output observer so install/serve chatter shows up live without
//! a second plumbing path.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::pipeline::{PipelineOutput, Publisher};
use crate::sandbox::{OutputObserver, ProcessStage};
use crate::tree::{FileNode, NodeKind};

use super::icons::{CHECK, CROSS, FILE, FOLDER, ROCKET, STEP};

/// Spinner UI for one preview run.
pub struct PreviewUi {
    spinner: ProgressBar,
}

impl PreviewUi {
    pub fn new() -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style);
        spinner.set_prefix("Preview");
        spinner.enable_steady_tick(Duration::from_millis(120));
        Self { spinner }
    }

    /// Announce a new pipeline/session stage.
    pub fn stage(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }

    /// Finish without a verdict, e.g. when serving was skipped.
    pub fn finish(&self, message: &str) {
        self.spinner
            .finish_with_message(format!("{CHECK}{message}"));
    }

    pub fn finish_ready(&self, url: &str) {
        self.spinner
            .finish_with_message(format!("{ROCKET}Serving at {}", style(url).green().bold()));
    }

    pub fn finish_failed(&self, reason: &str) {
        self.spinner
            .finish_with_message(format!("{CROSS}{}", style(reason).red()));
    }
}

impl Default for PreviewUi {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputObserver for PreviewUi {
    fn line(&self, stage: ProcessStage, line: &str) {
        let prefix = match stage {
            ProcessStage::Install => "install",
            ProcessStage::Serve => "serve",
        };
        self.spinner
            .set_message(format!("[{prefix}] {}", truncate(line, 60)));
    }
}

/// Display-layer sink that prints the finished tree and step trail.
pub struct ConsolePublisher;

impl Publisher for ConsolePublisher {
    fn publish(&self, output: &PipelineOutput) {
        println!(
            "{CHECK}Generated {} steps ({:?})",
            output.steps.len(),
            output.classification
        );
        for line in render_steps(&output.steps) {
            println!("  {line}");
        }
        println!("{}", render_tree(&output.tree));
    }
}

/// One summary line per parsed step.
pub fn render_steps(steps: &[crate::artifact::Step]) -> Vec<String> {
    steps
        .iter()
        .map(|step| match (&step.path, &step.content) {
            (Some(path), Some(content)) => {
                format!("{STEP}{} ({} bytes)", path, content.len())
            }
            (Some(path), None) => format!("{STEP}{path}"),
            _ => format!("{STEP}{:?}", step.kind),
        })
        .collect()
}

/// Indented tree listing; directories carry a trailing `/`.
pub fn render_tree(nodes: &[FileNode]) -> String {
    let mut out = String::new();
    walk(nodes, 0, &mut out);
    out
}

fn walk(nodes: &[FileNode], depth: usize, out: &mut String) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        match node.kind {
            NodeKind::Directory => {
                out.push_str(&format!(
                    "{indent}{FOLDER}{}/\n",
                    style(&node.name).cyan().bold()
                ));
                walk(&node.children, depth + 1, out);
            }
            NodeKind::File => {
                out.push_str(&format!("{indent}{FILE}{}\n", node.name));
            }
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
