//! Build pipeline
//!
//! Bundler builds run in two phases. Planning walks the requested formats in
//! order and gives each task its own environment and config. Running hands
//! every planned task to the bundler at once and joins the results in
//! request order. A failing task never cancels its siblings.

mod task;
pub mod transpile;
pub mod watch;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::config::{bundle, ConfigCache, Settings};
use crate::env::{keys, EnvSnapshot, TaskEnv};
use crate::project::Project;
use crate::tools::{resolve_bin_in, BuildFailure, Invocation, OutputMode, ToolRunner};

pub use task::*;

/// Parameters of one `build bundler` invocation
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// Entry glob, relative to the project root
    pub input: String,
    pub formats: Vec<FormatRequest>,
    /// Output directory, relative to the project root
    pub dir: String,
    pub watch: bool,
    pub typescript: bool,
    /// `--environment` pairs, applied before the task's own keys
    pub environment: Vec<(String, String)>,
    /// Explicit bundler config
    pub config: Option<PathBuf>,
    /// Extra arguments for the bundler
    pub passthrough: Vec<String>,
}

/// How a task or file ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded,
    Failed(BuildFailure),
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Succeeded)
    }
}

/// Result of one bundler task, labelled as requested (`umd.min`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub label: String,
    pub outcome: BuildOutcome,
}

/// Aggregate of a one-shot build
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// One entry per task, in request order
    pub results: Vec<TaskResult>,
    /// Outcome of the declaration pass, when one ran
    pub declarations: Option<bool>,
}

impl BuildReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn exit_code(&self) -> i32 {
        if self.failed() == 0 {
            0
        } else {
            1
        }
    }
}

/// Drives bundler builds for one project
pub struct Pipeline {
    project: Arc<Project>,
    settings: Settings,
    runner: Arc<dyn ToolRunner>,
    cache: ConfigCache,
    /// Where tools are looked up after `node_modules/.bin`
    search_path: Option<OsString>,
}

impl Pipeline {
    pub fn new(project: Arc<Project>, settings: Settings, runner: Arc<dyn ToolRunner>) -> Self {
        let cache = ConfigCache::new(settings.cache_dir(project.root_directory()));
        Self {
            project,
            settings,
            runner,
            cache,
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Look tools up on `search_path` instead of `PATH`
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn search_path(&self) -> Option<OsString> {
        self.search_path.clone()
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn runner(&self) -> &dyn ToolRunner {
        self.runner.as_ref()
    }

    /// Environment of one task: the base snapshot, the user's pairs, then the
    /// task's own keys
    pub fn task_snapshot(base: &EnvSnapshot, options: &BundleOptions, request: &FormatRequest) -> EnvSnapshot {
        let mut pairs: Vec<(&str, String)> = vec![
            (keys::BUNDLER, "true".to_string()),
            (keys::INPUT, options.input.clone()),
            (keys::OUTPUT, options.dir.clone()),
            (keys::FORMAT, request.format.as_str().to_string()),
        ];
        if options.watch {
            pairs.push((keys::WATCHMODE, "true".to_string()));
        }
        if request.minify {
            pairs.push((keys::MINIFY, "true".to_string()));
        }
        if options.typescript {
            pairs.push((keys::TS, "true".to_string()));
        }
        pairs.push((keys::NODE_ENV, request.node_env().to_string()));
        if request.sourcemap() {
            pairs.push((keys::SOURCEMAP, "true".to_string()));
        }

        base.with_all(
            options
                .environment
                .iter()
                .map(|(k, v)| (k.as_str(), v.clone())),
        )
        .with_all(pairs)
    }

    /// Derive every task's environment and config, strictly in request order
    pub fn plan(&self, base: &EnvSnapshot, options: &BundleOptions) -> Result<Vec<BuildTask>> {
        let mut tasks = Vec::with_capacity(options.formats.len());

        for (index, request) in options.formats.iter().enumerate() {
            let env = TaskEnv::decode(Self::task_snapshot(base, options, request))?;
            let (config, config_path) = bundle::resolve(
                &self.project,
                &env,
                &self.settings,
                options.config.as_deref(),
                &self.cache,
            )?;
            debug!("Planned {} with {}", request.label, config_path.display());

            tasks.push(BuildTask {
                index,
                request: request.clone(),
                env,
                config,
                config_path,
            });
        }

        Ok(tasks)
    }

    fn invocation(&self, bundler: &Path, task: &BuildTask, passthrough: &[String]) -> Invocation {
        Invocation::new(bundler, self.project.root_directory())
            .args(["--config".to_string(), task.config_path.display().to_string()])
            .args(passthrough.iter().cloned())
            .envs(task.env.snapshot().child_env())
            .stdio(OutputMode::Capture)
    }

    async fn run_task(&self, bundler: &Path, task: &BuildTask, passthrough: &[String]) -> TaskResult {
        let invocation = self.invocation(bundler, task, passthrough);
        let outcome = match self.runner.run(&invocation).await {
            Ok(output) if output.success() => BuildOutcome::Succeeded,
            Ok(output) => BuildOutcome::Failed(BuildFailure::from_stderr(
                &output.stderr,
                &format!("bundler exited with status {}", output.exit_code()),
            )),
            Err(e) => BuildOutcome::Failed(BuildFailure::new(format!("{:#}", e))),
        };

        TaskResult {
            label: task.label().to_string(),
            outcome,
        }
    }

    /// Run every task concurrently; results come back in request order
    pub async fn run(&self, tasks: &[BuildTask], passthrough: &[String]) -> Result<Vec<TaskResult>> {
        let bundler = resolve_bin_in(self.project.root_directory(), "rollup", None, self.search_path())?;
        let builds = tasks
            .iter()
            .map(|task| self.run_task(&bundler, task, passthrough));
        Ok(join_all(builds).await)
    }

    /// One-shot build: all tasks, then the declaration pass for TypeScript
    pub async fn build(&self, tasks: &[BuildTask], options: &BundleOptions) -> Result<BuildReport> {
        let results = self.run(tasks, &options.passthrough).await?;
        let declarations = if options.typescript {
            Some(
                declarations(
                    self.runner.as_ref(),
                    self.project.root_directory(),
                    &options.dir,
                    self.search_path(),
                )
                .await,
            )
        } else {
            None
        };

        Ok(BuildReport {
            results,
            declarations,
        })
    }
}

/// Emit type declarations into `<out_dir>/types`. Returns whether it worked.
pub async fn declarations(
    runner: &dyn ToolRunner,
    root: &Path,
    out_dir: &str,
    search_path: Option<OsString>,
) -> bool {
    let tsc = match resolve_bin_in(root, "typescript", Some("tsc"), search_path) {
        Ok(tsc) => tsc,
        Err(e) => {
            warn!("{}", e);
            return false;
        }
    };

    let invocation = Invocation::new(tsc, root)
        .args([
            "--declarationDir".to_string(),
            format!("{}/types", out_dir),
            "--emitDeclarationOnly".to_string(),
        ])
        .stdio(OutputMode::Null);

    match runner.run(&invocation).await {
        Ok(output) => output.success(),
        Err(e) => {
            warn!("Declaration pass failed to start: {:#}", e);
            false
        }
    }
}
