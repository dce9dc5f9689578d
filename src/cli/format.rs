//! Format command implementation

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Args;

use super::output;
use super::Context;
use crate::config::format;
use crate::tools::{resolve_bin, Invocation, OutputMode};
use crate::utils::relative_path;

/// Format sources with the built-in or project config
#[derive(Args, Debug)]
pub struct FormatCommand {
    /// Files to format; every known source type when omitted
    pub files: Vec<String>,

    /// Formatter config to use instead of the built-in one
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ignore file to use instead of the built-in one
    #[arg(long)]
    pub ignore_path: Option<PathBuf>,

    /// Report instead of rewriting files
    #[arg(long)]
    pub no_write: bool,

    /// Arguments forwarded to the formatter
    #[arg(last = true)]
    pub passthrough: Vec<String>,
}

impl FormatCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<i32> {
        let cache = ctx.cache();
        let explicit_config = self.config.as_deref().map(|path| ctx.from_cwd(path));
        let explicit_ignore = self.ignore_path.as_deref().map(|path| ctx.from_cwd(path));
        let config = format::resolve(&ctx.project, explicit_config.as_deref())?;
        let ignore = format::resolve_ignore(&ctx.project, explicit_ignore.as_deref())?;

        let mut args = config.cli_args("--config", &cache, "json")?;
        args.extend(ignore.cli_args("--ignore-path", &cache, "txt")?);
        if !self.no_write {
            args.push("--write".to_string());
        }
        args.extend(self.passthrough.iter().cloned());
        args.extend(files_to_format(&self.files, &ctx.cwd));

        let prettier = resolve_bin(ctx.root(), "prettier", None)?;
        let invocation = Invocation::new(prettier, &ctx.cwd)
            .args(args)
            .envs(ctx.env.child_env())
            .stdio(OutputMode::Inherit);
        let result = ctx
            .runner
            .run(&invocation)
            .await
            .context("Failed to run the formatter")?;

        if result.success() {
            output::success("Formatting complete");
        } else {
            output::failure("Formatting failed");
        }
        Ok(result.exit_code())
    }
}

/// Positional files relative to `cwd`, or the default pattern
pub(crate) fn files_to_format(files: &[String], cwd: &Path) -> Vec<String> {
    if files.is_empty() {
        return vec![format::DEFAULT_PATTERN.to_string()];
    }

    files
        .iter()
        .map(|file| {
            let path = Path::new(file);
            if path.is_absolute() {
                relative_path(cwd, path).unwrap_or_else(|| file.clone())
            } else {
                file.clone()
            }
        })
        .collect()
}
