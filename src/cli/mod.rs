//! Command-line interface for kiln
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `setup`: Project scaffolding
//! - `build`: Bundler and transpiler builds
//! - `lint`, `format`, `test`, `pre-commit`: Wrapped tools with built-in configs
//! - `clean`: Dependency and artifact removal

mod build;
mod clean;
mod format;
mod lint;
pub mod output;
mod pre_commit;
mod setup;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use crate::config::{ConfigCache, Settings};
use crate::env::EnvSnapshot;
use crate::project::Project;
use crate::tools::{ProcessRunner, ToolRunner};

pub use build::{BuildCommand, BuildTarget, BundlerCommand, TranspilerCommand};
pub use clean::CleanCommand;
pub use format::FormatCommand;
pub use lint::LintCommand;
pub use pre_commit::PreCommitCommand;
pub use setup::{SetupCommand, Template};
pub use test::TestCommand;

/// Kiln - zero-config build, lint, format and test orchestration
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scaffold a project from a template
    Setup(SetupCommand),

    /// Build the package
    Build(BuildCommand),

    /// Lint sources
    Lint(LintCommand),

    /// Format sources
    Format(FormatCommand),

    /// Run the test suite
    Test(TestCommand),

    /// Remove dependencies and build artifacts
    Clean(CleanCommand),

    /// Lint and format staged files
    PreCommit(PreCommitCommand),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Setup(_) => "setup",
            Commands::Build(cmd) => match cmd.target {
                BuildTarget::Bundler(_) => "build bundler",
                BuildTarget::Transpiler(_) => "build transpiler",
            },
            Commands::Lint(_) => "lint",
            Commands::Format(_) => "format",
            Commands::Test(_) => "test",
            Commands::Clean(_) => "clean",
            Commands::PreCommit(_) => "pre-commit",
        }
    }
}

/// Everything a command needs to know about where it runs
pub struct Context {
    pub project: Arc<Project>,
    pub settings: Settings,
    /// Process environment captured at startup
    pub env: EnvSnapshot,
    pub runner: Arc<dyn ToolRunner>,
    /// Directory kiln was started from
    pub cwd: PathBuf,
}

impl Context {
    /// Context for the project enclosing the working directory
    pub fn load() -> Result<Self> {
        let project = Project::current()?;
        let settings = Settings::load(project.root_directory())?;
        let cwd = std::env::current_dir().context("Failed to read the working directory")?;

        Ok(Self {
            project,
            settings,
            env: EnvSnapshot::from_process(),
            runner: Arc::new(ProcessRunner),
            cwd,
        })
    }

    pub fn root(&self) -> &std::path::Path {
        self.project.root_directory()
    }

    /// A path given on the command line, relative to where kiln started
    pub fn from_cwd(&self, path: &std::path::Path) -> PathBuf {
        self.cwd.join(path)
    }

    pub fn cache(&self) -> ConfigCache {
        ConfigCache::new(self.settings.cache_dir(self.root()))
    }
}

impl Cli {
    /// Execute the CLI command; returns the process exit code
    pub async fn execute(&self) -> Result<i32> {
        output::banner(self.command.name());
        let ctx = Context::load()?;
        self.dispatch(&ctx).await
    }

    /// Execute against an existing context
    pub async fn run(&self, ctx: &Context) -> Result<i32> {
        output::banner(self.command.name());
        self.dispatch(ctx).await
    }

    async fn dispatch(&self, ctx: &Context) -> Result<i32> {
        match &self.command {
            Commands::Setup(cmd) => cmd.execute(ctx).await,
            Commands::Build(cmd) => cmd.execute(ctx).await,
            Commands::Lint(cmd) => cmd.execute(ctx).await,
            Commands::Format(cmd) => cmd.execute(ctx).await,
            Commands::Test(cmd) => cmd.execute(ctx).await,
            Commands::Clean(cmd) => cmd.execute(ctx).await,
            Commands::PreCommit(cmd) => cmd.execute(ctx).await,
        }
    }
}

/// Split a comma separated option, dropping blanks
pub(crate) fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
