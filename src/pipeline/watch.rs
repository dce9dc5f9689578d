//! Watch mode
//!
//! The task set is planned once. Every debounced batch of file changes that
//! touches a watched path rebuilds all tasks and reports through
//! [`WatchEvent`]s. Errors never end the loop; only the shutdown future does.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use globset::GlobSet;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::{BuildOutcome, BuildTask, Pipeline};
use crate::tools::BuildFailure;
use crate::utils::{glob_set, watch_include};

/// Lifecycle of one rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Start,
    /// A task failed; the frame is kept when the bundler printed one
    Error { label: String, failure: BuildFailure },
    /// Rebuild finished with `bundles` successful tasks
    End { bundles: usize },
}

/// Paths whose changes trigger a rebuild
pub struct WatchScope {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
}

impl WatchScope {
    /// Directories of the entry points, minus dependencies and every
    /// directory the build writes into
    pub fn new(root: &Path, inputs: &[String], output_dirs: &[String]) -> Result<Self> {
        let include = watch_include(inputs);
        let mut exclude = vec!["node_modules/**".to_string()];
        for dir in output_dirs {
            let glob = format!("{}/**", dir.trim_end_matches('/'));
            if !exclude.contains(&glob) {
                exclude.push(glob);
            }
        }
        debug!("Watching {:?}, ignoring {:?}", include, exclude);

        Ok(Self {
            root: root.to_path_buf(),
            include: glob_set(&include)?,
            exclude: glob_set(&exclude)?,
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }
}

/// Build every task once, reporting the lifecycle
pub async fn rebuild<F>(pipeline: &Pipeline, tasks: &[BuildTask], passthrough: &[String], on_event: &mut F) -> Result<()>
where
    F: FnMut(WatchEvent),
{
    on_event(WatchEvent::Start);

    let results = pipeline.run(tasks, passthrough).await?;
    let mut bundles = 0;
    for result in results {
        match result.outcome {
            BuildOutcome::Succeeded => bundles += 1,
            BuildOutcome::Failed(failure) => on_event(WatchEvent::Error {
                label: result.label,
                failure,
            }),
        }
    }

    on_event(WatchEvent::End { bundles });
    Ok(())
}

/// Build, then rebuild on every relevant change until `shutdown` resolves
pub async fn watch<F, S>(
    pipeline: &Pipeline,
    tasks: &[BuildTask],
    scope: WatchScope,
    passthrough: &[String],
    mut on_event: F,
    shutdown: S,
) -> Result<()>
where
    F: FnMut(WatchEvent),
    S: Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();

    // Use a debouncer to avoid one rebuild per saved file
    let mut debouncer = new_debouncer(Duration::from_millis(100), move |result| {
        let _ = tx.send(result);
    })
    .context("Failed to start file watcher")?;
    debouncer
        .watcher()
        .watch(&scope.root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", scope.root.display()))?;

    rebuild(pipeline, tasks, passthrough, &mut on_event).await?;

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = rx.recv() => match received {
                Some(Ok(events)) => {
                    if events.iter().any(|event| scope.matches(&event.path)) {
                        rebuild(pipeline, tasks, passthrough, &mut on_event).await?;
                    }
                }
                Some(Err(e)) => error!("Watch error: {:?}", e),
                None => break,
            },
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_follows_entry_directories() {
        let root = Path::new("/project");
        let scope = WatchScope::new(root, &["src/index.ts".to_string()], &["dist".to_string()]).unwrap();

        assert!(scope.matches(Path::new("/project/src/index.ts")));
        assert!(scope.matches(Path::new("/project/src/deep/util.ts")));
        assert!(!scope.matches(Path::new("/project/README.md")));
    }

    #[test]
    fn test_scope_ignores_output_and_dependencies() {
        let root = Path::new("/project");
        let scope = WatchScope::new(root, &["index.js".to_string()], &["dist/".to_string()]).unwrap();

        assert!(scope.matches(Path::new("/project/index.js")));
        assert!(!scope.matches(Path::new("/project/dist/esm/index.es.js")));
        assert!(!scope.matches(Path::new("/project/node_modules/dep/index.js")));
    }

    #[test]
    fn test_scope_ignores_prefixed_output() {
        let root = Path::new("/project");
        let outputs = vec!["packages/dist/esm".to_string(), "packages/dist/cjs".to_string()];
        let scope = WatchScope::new(root, &["packages/src/index.ts".to_string()], &outputs).unwrap();

        assert!(scope.matches(Path::new("/project/packages/src/index.ts")));
        assert!(!scope.matches(Path::new("/project/packages/dist/esm/index.es.js")));
        assert!(!scope.matches(Path::new("/project/packages/dist/cjs/index.cjs.js")));
    }
}
