//! Build command implementation

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tracing::debug;

use super::output::{self, Spinner};
use super::{split_list, Context};
use crate::env::{keys, parse_environment, TaskEnv};
use crate::pipeline::transpile::{self, TranspileOptions, Transpiler};
use crate::pipeline::watch::{self, WatchEvent, WatchScope};
use crate::pipeline::{declarations, BuildOutcome, BundleOptions, FormatRequest, OutputFormat, Pipeline};
use crate::utils::format_duration;

/// Build the package
#[derive(Args, Debug)]
pub struct BuildCommand {
    #[command(subcommand)]
    pub target: BuildTarget,
}

#[derive(Subcommand, Debug)]
pub enum BuildTarget {
    /// Bundle entry points into one or more output formats
    Bundler(BundlerCommand),

    /// Compile sources file by file
    Transpiler(TranspilerCommand),
}

impl BuildCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<i32> {
        match &self.target {
            BuildTarget::Bundler(cmd) => cmd.execute(ctx).await,
            BuildTarget::Transpiler(cmd) => cmd.execute(ctx).await,
        }
    }
}

#[derive(Args, Debug)]
pub struct BundlerCommand {
    /// Entry glob
    pub input: String,

    /// Bundler config to use instead of the built-in one
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Rebuild on change
    #[arg(short, long)]
    pub watch: bool,

    /// Output directory
    #[arg(short, long)]
    pub dir: Option<String>,

    /// Comma separated formats, `.min` suffix to minify
    #[arg(short, long)]
    pub format: Option<String>,

    /// Extra environment, `KEY:value,KEY:value`
    #[arg(long)]
    pub environment: Option<String>,

    /// Remove the output directory first
    #[arg(long)]
    pub clean: bool,

    /// Arguments forwarded to the bundler
    #[arg(last = true)]
    pub passthrough: Vec<String>,
}

impl BundlerCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<i32> {
        let start = Instant::now();
        let project = &ctx.project;
        let typescript = project.file_exists("tsconfig.json");

        let formats = FormatRequest::parse_list(
            self.format.as_deref().unwrap_or(&ctx.settings.build.formats),
        )?;
        let dir = self.dir.clone().unwrap_or_else(|| ctx.settings.build.dir.clone());

        let needs_helpers = formats.iter().any(|f| f.format != OutputFormat::Umd);
        if needs_helpers && !project.dependencies().runtime.contains_key("@babel/runtime") {
            output::runtime_helper_warning();
        }

        if self.clean {
            remove_output(ctx, &dir).await?;
        }

        let environment = match &self.environment {
            Some(spec) => parse_environment(spec)?,
            None => Vec::new(),
        };

        let options = BundleOptions {
            input: self.input.clone(),
            formats,
            dir: dir.clone(),
            watch: self.watch,
            typescript,
            environment,
            config: self.config.clone(),
            passthrough: self.passthrough.clone(),
        };

        let pipeline = Pipeline::new(ctx.project.clone(), ctx.settings.clone(), ctx.runner.clone());
        let tasks = pipeline.plan(&ctx.env, &options)?;
        debug!("Planned {} bundle(s) into {}", tasks.len(), dir);

        if self.watch {
            let output_dirs: Vec<String> = tasks.iter().map(|task| task.output_dir()).collect();
            let scope = WatchScope::new(ctx.root(), std::slice::from_ref(&options.input), &output_dirs)?;
            output::info(format!("Watching {} for changes", options.input.cyan()));
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            watch::watch(&pipeline, &tasks, scope, &options.passthrough, report_watch_event, shutdown)
                .await?;
            return Ok(0);
        }

        let spinner = Spinner::new(&format!("Building {} bundle(s)...", tasks.len()));
        let report = pipeline.build(&tasks, &options).await;
        spinner.clear();
        let report = report?;

        for result in &report.results {
            match &result.outcome {
                BuildOutcome::Succeeded => {
                    output::success(format!("Successfully compiled {} bundle", result.label.cyan()))
                }
                BuildOutcome::Failed(failure) => {
                    output::failure(format!("Failed to compile {} bundle: {}", result.label.cyan(), failure));
                    if let Some(frame) = &failure.frame {
                        output::frame(frame);
                    }
                }
            }
        }

        match report.declarations {
            Some(true) => output::success(format!("Generated type declarations in {}/types", dir)),
            Some(false) => output::failure("Failed to generate type declarations"),
            None => {}
        }

        let elapsed = format_duration(start.elapsed());
        if report.failed() == 0 {
            output::success(format!(
                "Successfully compiled {} bundle(s) in {}",
                report.succeeded(),
                elapsed
            ));
        } else {
            output::failure(format!(
                "{} of {} bundle(s) failed in {}",
                report.failed(),
                report.results.len(),
                elapsed
            ));
        }

        Ok(report.exit_code())
    }
}

fn report_watch_event(event: WatchEvent) {
    match event {
        WatchEvent::Start => output::info("Compiling..."),
        WatchEvent::Error { label, failure } => {
            output::failure(format!("Failed to compile {} bundle: {}", label.cyan(), failure));
            if let Some(frame) = &failure.frame {
                output::frame(frame);
            }
        }
        WatchEvent::End { bundles } => {
            output::success(format!("Compiled {} bundle(s), watching for changes", bundles))
        }
    }
}

async fn remove_output(ctx: &Context, dir: &str) -> Result<()> {
    let path = ctx.project.join_root(dir);
    if tokio::fs::metadata(&path).await.is_ok() {
        tokio::fs::remove_dir_all(&path)
            .await
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        debug!("Removed {}", path.display());
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct TranspilerCommand {
    /// Source glob
    #[arg(default_value = "src/**/*")]
    pub input: String,

    /// Output directory
    #[arg(short, long)]
    pub out_dir: Option<String>,

    /// Comma separated globs to skip
    #[arg(long)]
    pub ignore: Option<String>,

    /// Comma separated globs copied without compiling
    #[arg(long)]
    pub copy_files: Option<String>,

    /// Remove the output directory first
    #[arg(long)]
    pub clean: bool,

    /// Arguments forwarded to the transpiler for every file
    #[arg(last = true)]
    pub passthrough: Vec<String>,
}

impl TranspilerCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<i32> {
        let start = Instant::now();
        let project = &ctx.project;
        let typescript = project.file_exists("tsconfig.json");

        if !project.dependencies().runtime.contains_key("@babel/runtime") {
            output::runtime_helper_warning();
        }

        let out_dir = self
            .out_dir
            .clone()
            .unwrap_or_else(|| ctx.settings.transpile.out_dir.clone());
        let options = TranspileOptions {
            input: self.input.clone(),
            out_dir: out_dir.clone(),
            ignore: split_list(self.ignore.as_deref().unwrap_or(&ctx.settings.transpile.ignore)),
            copy_files: split_list(self.copy_files.as_deref().unwrap_or_default()),
        };

        if self.clean {
            remove_output(ctx, &out_dir).await?;
        }

        let jobs = transpile::plan(ctx.root(), &options)?;
        if jobs.is_empty() {
            output::warning(format!("No files matched {}", self.input));
            return Ok(0);
        }

        let mut snapshot = ctx.env.with(keys::NODE_ENV, "production");
        if typescript {
            snapshot = snapshot.with(keys::TS, "true");
        }
        let env = TaskEnv::decode(snapshot)?;

        let (transpiler, config) = Transpiler::new(project, ctx.runner.as_ref(), &env, &ctx.settings)?;
        debug!("Transpiling with {:?} config", config.source);
        let results = transpiler
            .with_args(self.passthrough.clone())
            .run(jobs)
            .await?;

        let mut failed = 0;
        for result in &results {
            match &result.outcome {
                BuildOutcome::Succeeded => output::success(format!(
                    "{} -> {}",
                    result.job.source.display(),
                    result.job.dest.display().to_string().cyan()
                )),
                BuildOutcome::Failed(failure) => {
                    failed += 1;
                    output::failure(format!("{}: {}", result.job.source.display(), failure));
                    if let Some(frame) = &failure.frame {
                        output::frame(frame);
                    }
                }
            }
        }

        if typescript {
            if declarations(ctx.runner.as_ref(), ctx.root(), &out_dir, std::env::var_os("PATH")).await {
                output::success(format!("Generated type declarations in {}/types", out_dir));
            } else {
                output::failure("Failed to generate type declarations");
            }
        }

        let elapsed = format_duration(start.elapsed());
        if failed == 0 {
            output::success(format!(
                "Successfully compiled {} file(s) in {}",
                results.len(),
                elapsed
            ));
            Ok(0)
        } else {
            output::failure(format!(
                "{} of {} file(s) failed in {}",
                failed,
                results.len(),
                elapsed
            ));
            Ok(1)
        }
    }
}
