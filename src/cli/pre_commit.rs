//! Pre-commit command implementation

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;

use super::output;
use super::Context;
use crate::config::staged;
use crate::tools::{resolve_bin, Invocation, OutputMode};

/// Lint and format staged files
#[derive(Args, Debug)]
pub struct PreCommitCommand {
    /// lint-staged config to use instead of the built-in one
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Arguments forwarded to lint-staged
    #[arg(last = true)]
    pub passthrough: Vec<String>,
}

impl PreCommitCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<i32> {
        let config = staged::resolve(&ctx.project, self.config.as_deref())?;
        let mut args = config.cli_args("--config", &ctx.cache(), "json")?;
        args.extend(self.passthrough.iter().cloned());

        let lint_staged = resolve_bin(ctx.root(), "lint-staged", None)?;
        let invocation = Invocation::new(lint_staged, ctx.root())
            .args(args)
            .envs(ctx.env.child_env())
            .stdio(OutputMode::Inherit);
        let result = ctx
            .runner
            .run(&invocation)
            .await
            .context("Failed to run lint-staged")?;

        if result.success() {
            output::success("Staged files are clean");
        } else {
            output::failure("Pre-commit checks failed");
        }
        Ok(result.exit_code())
    }
}
