//! External tool invocation
//!
//! Every wrapped tool (bundler, transpiler, linter, formatter, test runner,
//! lint-staged, tsc, git, package managers) is reached through the
//! [`ToolRunner`] seam so orchestration logic never spawns processes itself.

mod failure;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::KilnError;
use crate::utils::remove_pkg_scope;

pub use failure::BuildFailure;

/// How a child's output is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Stream straight to the terminal
    Inherit,
    /// Collect stdout/stderr for inspection
    Capture,
    /// Discard output
    Null,
}

/// A single external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
    pub stdio: OutputMode,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: cwd.into(),
            stdio: OutputMode::Inherit,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs<I>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(env);
        self
    }

    pub fn stdio(mut self, stdio: OutputMode) -> Self {
        self.stdio = stdio;
        self
    }

    /// Short name of the program for messages
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// What a finished command left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code as this process should propagate it
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(1)
    }
}

/// Runs external commands
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// Runs commands as child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        debug!(
            "Running {} {}",
            invocation.program.display(),
            invocation.args.join(" ")
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        cmd.current_dir(&invocation.cwd);
        cmd.envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.kill_on_drop(true);

        let (stdout, stderr) = match invocation.stdio {
            OutputMode::Inherit => (Stdio::inherit(), Stdio::inherit()),
            OutputMode::Capture => (Stdio::piped(), Stdio::piped()),
            OutputMode::Null => (Stdio::null(), Stdio::null()),
        };
        cmd.stdin(Stdio::inherit()).stdout(stdout).stderr(stderr);

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to start {}", invocation.program.display()))?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Locate a package's executable.
///
/// Looks in `<root>/node_modules/.bin` first, then on `PATH`. The executable
/// name defaults to the package name without its scope.
pub fn resolve_bin(root: &Path, package: &str, executable: Option<&str>) -> Result<PathBuf, KilnError> {
    resolve_bin_in(root, package, executable, std::env::var_os("PATH"))
}

/// [`resolve_bin`] with an explicit search path in place of `PATH`
pub fn resolve_bin_in(
    root: &Path,
    package: &str,
    executable: Option<&str>,
    search_path: Option<OsString>,
) -> Result<PathBuf, KilnError> {
    let executable = executable.unwrap_or_else(|| remove_pkg_scope(package));
    let local = root.join("node_modules").join(".bin");

    which::which_in(executable, Some(&local), root)
        .or_else(|_| which::which_in(executable, search_path, root))
        .map_err(|_| KilnError::ToolNotFound(executable.to_string()))
}
