//! File-by-file transpilation
//!
//! Each matched source is compiled on its own; a file that fails is reported
//! and the rest of the batch carries on.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use tracing::debug;

use super::BuildOutcome;
use crate::config::{transpile, ConfigCache, ConfigSource, ResolvedConfig, Settings};
use crate::env::TaskEnv;
use crate::project::Project;
use crate::tools::{resolve_bin, BuildFailure, Invocation, OutputMode, ToolRunner};
use crate::utils::{glob_files, glob_set};

/// Extensions handed to the transpiler; anything else is copied
const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Transpile,
    Copy,
}

/// One source file and where it ends up, both relative to the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileJob {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub kind: JobKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub job: TranspileJob,
    pub outcome: BuildOutcome,
}

/// Parameters of one `build transpiler` invocation
#[derive(Debug, Clone)]
pub struct TranspileOptions {
    pub input: String,
    pub out_dir: String,
    pub ignore: Vec<String>,
    pub copy_files: Vec<String>,
}

/// Output path for a source: the first path segment is dropped and
/// compiled extensions become `.js`
pub fn output_path(source: &Path, out_dir: &Path, kind: JobKind) -> PathBuf {
    let mut components = source.components();
    if source.components().count() > 1 {
        components.next();
    }
    let mut relative: PathBuf = components.collect();
    if kind == JobKind::Transpile {
        relative.set_extension("js");
    }
    out_dir.join(relative)
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Expand the input glob into jobs.
///
/// Declaration files and READMEs are skipped. `copy_files` matches are
/// copied verbatim, as are files the transpiler does not handle.
pub fn plan(root: &Path, options: &TranspileOptions) -> Result<Vec<TranspileJob>> {
    let copy = glob_set(&options.copy_files)?;
    let out_dir = Path::new(&options.out_dir);

    let jobs = glob_files(root, &options.input, &options.ignore)?
        .into_iter()
        .filter(|path| {
            let name = path.to_string_lossy();
            !name.ends_with(".d.ts") && !name.contains("README")
        })
        .map(|source| {
            let kind = if copy.is_match(&source) || !is_source(&source) {
                JobKind::Copy
            } else {
                JobKind::Transpile
            };
            let dest = output_path(&source, out_dir, kind);
            TranspileJob { source, dest, kind }
        })
        .collect();

    Ok(jobs)
}

/// Compiles jobs with the transpiler CLI
pub struct Transpiler<'a> {
    root: &'a Path,
    runner: &'a dyn ToolRunner,
    env: &'a TaskEnv,
    /// `--config-file` arguments for the built-in config
    config_args: Vec<String>,
    /// Forwarded verbatim after each file's arguments
    extra_args: Vec<String>,
}

impl<'a> Transpiler<'a> {
    pub fn new(
        project: &'a Project,
        runner: &'a dyn ToolRunner,
        env: &'a TaskEnv,
        settings: &Settings,
    ) -> Result<(Self, ResolvedConfig)> {
        let config = transpile::resolve(project, env, settings, None)?;
        let cache = ConfigCache::new(settings.cache_dir(project.root_directory()));
        let config_args = match config.source {
            ConfigSource::BuiltIn => {
                let path = cache.materialize(&config, "json")?;
                vec!["--config-file".to_string(), path.display().to_string()]
            }
            _ => Vec::new(),
        };

        Ok((
            Self {
                root: project.root_directory(),
                runner,
                env,
                config_args,
                extra_args: Vec::new(),
            },
            config,
        ))
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    async fn run_job(&self, transpiler: &Path, job: TranspileJob) -> FileResult {
        let outcome = match job.kind {
            JobKind::Copy => self.copy(&job).await,
            JobKind::Transpile => self.compile(transpiler, &job).await,
        };
        FileResult { job, outcome }
    }

    async fn copy(&self, job: &TranspileJob) -> BuildOutcome {
        let dest = self.root.join(&job.dest);
        let copied = async {
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(self.root.join(&job.source), &dest).await
        };
        match copied.await {
            Ok(_) => BuildOutcome::Succeeded,
            Err(e) => BuildOutcome::Failed(BuildFailure::new(format!(
                "{}: {}",
                job.source.display(),
                e
            ))),
        }
    }

    async fn compile(&self, transpiler: &Path, job: &TranspileJob) -> BuildOutcome {
        let invocation = Invocation::new(transpiler, self.root)
            .args(self.config_args.iter().cloned())
            .args([
                job.source.display().to_string(),
                "--out-file".to_string(),
                job.dest.display().to_string(),
            ])
            .args(self.extra_args.iter().cloned())
            .envs(self.env.snapshot().child_env())
            .stdio(OutputMode::Capture);

        match self.runner.run(&invocation).await {
            Ok(output) if output.success() => BuildOutcome::Succeeded,
            Ok(output) => BuildOutcome::Failed(BuildFailure::from_stderr(
                &output.stderr,
                &format!("{}: transpiler exited with status {}", job.source.display(), output.exit_code()),
            )),
            Err(e) => BuildOutcome::Failed(BuildFailure::new(format!("{:#}", e))),
        }
    }

    /// Run every job, a few at a time; results keep the job order
    pub async fn run(&self, jobs: Vec<TranspileJob>) -> Result<Vec<FileResult>> {
        let transpiler = resolve_bin(self.root, "@babel/cli", Some("babel"))
            .context("The transpiler CLI is required to build with the transpiler")?;
        let limit = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        debug!("Transpiling {} file(s), {} at a time", jobs.len(), limit);

        let transpiler = transpiler.as_path();
        let results: Vec<FileResult> = stream::iter(jobs)
            .map(|job| self.run_job(transpiler, job))
            .buffered(limit)
            .collect()
            .await;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_output_path() {
        let out = Path::new("dist");
        assert_eq!(
            output_path(Path::new("src/components/Button.tsx"), out, JobKind::Transpile),
            PathBuf::from("dist/components/Button.js")
        );
        assert_eq!(
            output_path(Path::new("src/index.mjs"), out, JobKind::Transpile),
            PathBuf::from("dist/index.js")
        );
        assert_eq!(
            output_path(Path::new("src/LICENSE"), out, JobKind::Copy),
            PathBuf::from("dist/LICENSE")
        );
        assert_eq!(
            output_path(Path::new("index.ts"), out, JobKind::Transpile),
            PathBuf::from("dist/index.js")
        );
    }

    #[test]
    fn test_plan_classifies_files() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src/__tests__")).unwrap();
        fs::create_dir_all(root.join("src/assets")).unwrap();
        for file in [
            "src/index.ts",
            "src/types.d.ts",
            "src/README.md",
            "src/bin",
            "src/assets/logo.js",
            "src/__tests__/index.ts",
        ] {
            fs::write(root.join(file), "").unwrap();
        }

        let options = TranspileOptions {
            input: "src/**/*".to_string(),
            out_dir: "lib".to_string(),
            ignore: vec!["**/__tests__/**".to_string()],
            copy_files: vec!["src/assets/**".to_string()],
        };
        let jobs = plan(root, &options).unwrap();

        let summary: Vec<(String, JobKind, String)> = jobs
            .iter()
            .map(|j| (j.source.display().to_string(), j.kind, j.dest.display().to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("src/assets/logo.js".to_string(), JobKind::Copy, "lib/assets/logo.js".to_string()),
                ("src/bin".to_string(), JobKind::Copy, "lib/bin".to_string()),
                ("src/index.ts".to_string(), JobKind::Transpile, "lib/index.js".to_string()),
            ]
        );
    }
}
