//! Helpers for driving the `kbpick` binary
//!
//! Every command runs against an isolated config file so the user's own
//! settings never leak into a test.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// CLI command builder with timing
pub struct KbpickCommand {
    binary_path: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl KbpickCommand {
    /// Create a command reading its config from `config_path`
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        let mut env = HashMap::new();
        env.insert(
            "KBPICK_CONFIG".to_string(),
            config_path.as_ref().display().to_string(),
        );
        Self {
            binary_path: PathBuf::from(env!("CARGO_BIN_EXE_kbpick")),
            args: Vec::new(),
            env,
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn arg_path(&mut self, flag: &str, path: &Path) -> &mut Self {
        self.args.push(flag.to_string());
        self.args.push(path.display().to_string());
        self
    }

    /// Execute command and return result with timing
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();
        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .envs(&self.env)
            .env_remove("RUST_LOG")
            .output()
            .context("Failed to execute kbpick")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }
        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }
        Ok(result)
    }
}

/// Command execution result with timing
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }

    /// Byte offset of `text` in stdout, for ordering checks
    pub fn position(&self, text: &str) -> Option<usize> {
        self.stdout.find(text)
    }
}

/// Build a command against a workspace
///
/// Usage:
/// ```ignore
/// kbpick!(ws, "view").assert_success()?;
/// ```
#[macro_export]
macro_rules! kbpick {
    ($ws:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::KbpickCommand::new($ws.config_path());
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
