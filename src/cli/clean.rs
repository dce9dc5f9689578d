//! Clean command implementation

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use walkdir::WalkDir;

use super::output;
use super::Context;
use crate::utils::{display_relative, glob_set};

/// Always removed, when present
const DEFAULT_TARGETS: &[&str] = &["node_modules", "package-lock.json", "yarn.lock"];

/// Remove dependencies, lock files and anything matching the given globs
#[derive(Args, Debug)]
pub struct CleanCommand {
    /// Extra globs to remove, relative to the project root
    pub globs: Vec<String>,
}

impl CleanCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<i32> {
        let root = ctx.root();
        let targets = clean_targets(root, &self.globs)?;
        if targets.is_empty() {
            output::info("Nothing to clean");
            return Ok(0);
        }

        let mut failed = 0;
        for target in &targets {
            let shown = display_relative(root, target);
            let removed = if target.is_dir() {
                tokio::fs::remove_dir_all(target).await
            } else {
                tokio::fs::remove_file(target).await
            };
            match removed {
                Ok(()) => output::success(format!("Removed {}", shown)),
                Err(e) => {
                    failed += 1;
                    output::failure(format!("Failed to remove {}: {}", shown, e));
                }
            }
        }

        Ok(if failed == 0 { 0 } else { 1 })
    }
}

/// Existing paths to remove. A matched directory is removed whole, so
/// nothing beneath it is listed separately.
pub(crate) fn clean_targets(root: &Path, globs: &[String]) -> Result<Vec<PathBuf>> {
    let mut targets: Vec<PathBuf> = DEFAULT_TARGETS
        .iter()
        .map(|name| root.join(name))
        .filter(|path| path.exists())
        .collect();

    if globs.is_empty() {
        return Ok(targets);
    }

    let matcher = glob_set(globs)?;
    let mut walker = WalkDir::new(root).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        let path = entry.path();
        if targets.iter().any(|t| t == path) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        if matcher.is_match(relative) {
            targets.push(path.to_path_buf());
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
        }
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_targets_include_defaults_and_globs() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        fs::create_dir_all(root.join("dist/esm")).unwrap();
        fs::write(root.join("dist/esm/index.js"), "").unwrap();
        fs::write(root.join("yarn.lock"), "").unwrap();
        fs::write(root.join("package.json"), "{}").unwrap();

        let targets = clean_targets(root, &["dist".to_string()]).unwrap();
        assert_eq!(
            targets,
            vec![root.join("node_modules"), root.join("yarn.lock"), root.join("dist")]
        );
    }

    #[test]
    fn test_targets_skip_missing_defaults() {
        let temp = tempfile::tempdir().unwrap();
        assert!(clean_targets(temp.path(), &[]).unwrap().is_empty());
    }
}
