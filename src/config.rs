use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::sandbox::RetryPolicy;

/// A subprocess invocation: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Parse a whitespace-separated command line, e.g. `"npm run dev"`.
    pub fn parse(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            bail!("empty command");
        };
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Configuration for the sandboxed install-then-serve sequence.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Dependency install command.
    pub install: CommandSpec,
    /// Long-lived serve command.
    pub serve: CommandSpec,
    /// Directory the local sandbox mounts project files into.
    pub workspace: PathBuf,
    /// Regex with one capture group that extracts the served URL from
    /// process output.
    pub ready_pattern: String,
    /// Boot retry bound.
    pub boot_attempts: u32,
    /// Fixed delay between boot attempts, in seconds.
    pub boot_delay_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            install: CommandSpec {
                program: "npm".to_string(),
                args: vec!["install".to_string()],
            },
            serve: CommandSpec {
                program: "npm".to_string(),
                args: vec!["run".to_string(), "dev".to_string()],
            },
            workspace: PathBuf::from(".kiln/workspace"),
            ready_pattern: r"(https?://(?:localhost|127\.0\.0\.1)[^\s]*)".to_string(),
            boot_attempts: 3,
            boot_delay_secs: 1,
        }
    }
}

/// Raw TOML structure for `.kiln/sandbox.toml`
#[derive(Debug, Deserialize)]
struct SandboxToml {
    sandbox: Option<SandboxSection>,
}

#[derive(Debug, Deserialize)]
struct SandboxSection {
    install: Option<String>,
    serve: Option<String>,
    workspace: Option<PathBuf>,
    ready_pattern: Option<String>,
    boot_attempts: Option<u32>,
    boot_delay_secs: Option<u64>,
}

impl SandboxConfig {
    /// Load sandbox config from `.kiln/sandbox.toml` in the project
    /// directory. Returns defaults if the file doesn't exist.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(".kiln").join("sandbox.toml");
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let toml: SandboxToml = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let mut config = Self::default();
        if let Some(section) = toml.sandbox {
            if let Some(install) = section.install {
                config.install = CommandSpec::parse(&install)
                    .context("Invalid [sandbox] install command")?;
            }
            if let Some(serve) = section.serve {
                config.serve =
                    CommandSpec::parse(&serve).context("Invalid [sandbox] serve command")?;
            }
            if let Some(workspace) = section.workspace {
                config.workspace = workspace;
            }
            if let Some(ready_pattern) = section.ready_pattern {
                config.ready_pattern = ready_pattern;
            }
            if let Some(boot_attempts) = section.boot_attempts {
                config.boot_attempts = boot_attempts;
            }
            if let Some(boot_delay_secs) = section.boot_delay_secs {
                config.boot_delay_secs = boot_delay_secs;
            }
        }

        Ok(config)
    }

    /// Boot retry settings as a policy for the session.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.boot_attempts,
            backoff: std::time::Duration::from_secs(self.boot_delay_secs),
        }
    }
}
