//! Lint command implementation

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use regex::Regex;

use super::output;
use super::{split_list, Context};
use crate::config::lint;
use crate::tools::{resolve_bin, Invocation, OutputMode};

/// Lint sources with the built-in or project config
#[derive(Args, Debug)]
pub struct LintCommand {
    /// Files to lint; the whole project when omitted
    pub files: Vec<String>,

    /// Linter config to use instead of the built-in one
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ignore file to use instead of the built-in one
    #[arg(long)]
    pub ignore_path: Option<PathBuf>,

    /// Disable the lint cache
    #[arg(long)]
    pub no_cache: bool,

    /// Comma separated extensions to lint
    #[arg(long, default_value = lint::DEFAULT_EXTENSIONS)]
    pub ext: String,

    /// Arguments forwarded to the linter
    #[arg(last = true)]
    pub passthrough: Vec<String>,
}

impl LintCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<i32> {
        let root = ctx.root();

        if ctx.project.is_typescript() {
            self.type_check(ctx).await;
        }

        let files = if self.files.is_empty() {
            vec![".".to_string()]
        } else {
            let files = filter_by_extension(&self.files, &self.ext)?;
            if files.is_empty() {
                output::info("No files to lint");
                return Ok(0);
            }
            files
        };

        let cache = ctx.cache();
        let explicit_config = self.config.as_deref().map(|path| ctx.from_cwd(path));
        let explicit_ignore = self.ignore_path.as_deref().map(|path| ctx.from_cwd(path));
        let config = lint::resolve(&ctx.project, explicit_config.as_deref())?;
        let ignore = lint::resolve_ignore(&ctx.project, explicit_ignore.as_deref())?;

        let mut args = config.cli_args("--config", &cache, "json")?;
        args.extend(ignore.cli_args("--ignore-path", &cache, "txt")?);
        if !self.no_cache {
            args.extend([
                "--cache".to_string(),
                "--cache-location".to_string(),
                root.join("node_modules/.cache/.eslintcache").display().to_string(),
            ]);
        }
        args.extend(["--ext".to_string(), self.ext.clone()]);
        args.extend(self.passthrough.iter().cloned());
        args.extend(files);

        let eslint = resolve_bin(root, "eslint", None)?;
        let invocation = Invocation::new(eslint, &ctx.cwd)
            .args(args)
            .envs(ctx.env.child_env())
            .stdio(OutputMode::Inherit);
        let result = ctx
            .runner
            .run(&invocation)
            .await
            .context("Failed to run the linter")?;

        if result.success() {
            output::success("No lint errors found");
        } else {
            output::failure("Linting found problems");
        }
        Ok(result.exit_code())
    }

    /// `tsc --noEmit`; reported but never fatal
    async fn type_check(&self, ctx: &Context) {
        let tsc = match resolve_bin(ctx.root(), "typescript", Some("tsc")) {
            Ok(tsc) => tsc,
            Err(e) => {
                output::warning(format!("Skipping type check: {}", e));
                return;
            }
        };

        let invocation = Invocation::new(tsc, ctx.root())
            .args(["--noEmit"])
            .stdio(OutputMode::Inherit);
        match ctx.runner.run(&invocation).await {
            Ok(result) if result.success() => output::success("Type check passed"),
            Ok(_) => output::failure("Type check failed"),
            Err(e) => output::failure(format!("Type check failed to start: {:#}", e)),
        }
    }
}

/// Keep files ending in one of the comma separated extensions
pub(crate) fn filter_by_extension(files: &[String], extensions: &str) -> Result<Vec<String>> {
    let alternatives: Vec<String> = split_list(extensions)
        .iter()
        .map(|ext| regex::escape(ext))
        .collect();
    let pattern = Regex::new(&format!("({})$", alternatives.join("|")))
        .with_context(|| format!("Invalid extension list: {}", extensions))?;

    Ok(files
        .iter()
        .filter(|file| pattern.is_match(file))
        .cloned()
        .collect())
}
