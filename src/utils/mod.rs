//! Utility functions and helpers

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Generate a hash of the given content
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Generate a hash-based filename
pub fn hash_filename(base: &str, content: &[u8], ext: &str) -> String {
    let hash = hash_content(content);
    format!("{}.{}.{}", base, hash, ext)
}

/// Get relative path from base to target
pub fn relative_path(from: &Path, to: &Path) -> Option<String> {
    pathdiff::diff_paths(to, from).map(|p| p.display().to_string())
}

/// Display a path relative to `base` when possible
pub fn display_relative(base: &Path, path: &Path) -> String {
    relative_path(base, path)
        .filter(|p| !p.starts_with(".."))
        .unwrap_or_else(|| path.display().to_string())
}

/// Convert a file path to forward-slash form
pub fn to_slash(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Watch globs covering the directories of the given inputs.
///
/// `deeply/nested/index.ts` becomes `deeply/nested/**`; a bare file name
/// becomes `./**`.
pub fn watch_include<I, S>(inputs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    inputs
        .into_iter()
        .map(|input| {
            let segments: Vec<&str> = input.as_ref().split('/').collect();
            if segments.len() >= 2 {
                format!("{}/**", segments[..segments.len() - 1].join("/"))
            } else {
                "./**".to_string()
            }
        })
        .collect()
}

/// Strip the `@scope/` prefix from a package name
pub fn remove_pkg_scope(name: &str) -> &str {
    match name.strip_prefix('@').and_then(|rest| rest.split_once('/')) {
        Some((_, unscoped)) => unscoped,
        None => name,
    }
}

/// `react-dom` -> `reactDom`, `@acme/my_lib` -> `acmeMyLib`
pub fn camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let words = input
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty());

    for (i, word) in words.enumerate() {
        let lower = word.to_ascii_lowercase();
        if i == 0 {
            out.push_str(&lower);
        } else {
            out.push_str(&upper_first(&lower));
        }
    }
    out
}

/// Uppercase the first character, leave the rest alone
pub fn upper_first(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Uppercase the first character, lowercase the rest
pub fn capitalize(input: &str) -> String {
    upper_first(&input.to_lowercase())
}

/// Compile glob patterns into a set
pub fn glob_set<I, S>(patterns: I) -> Result<GlobSet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref().trim_start_matches("./");
        builder.add(
            Glob::new(pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))?,
        );
    }
    Ok(builder.build()?)
}

/// Files under `root` matching `pattern`, minus anything matching `ignore`.
///
/// Returned paths are relative to `root` and sorted. `node_modules` and `.git`
/// are skipped unless the pattern itself points into them.
pub fn glob_files<S: AsRef<str>>(root: &Path, pattern: &str, ignore: &[S]) -> Result<Vec<PathBuf>> {
    let include = glob_set([pattern])?;
    let exclude = glob_set(ignore)?;
    let descend_vendor = pattern.contains("node_modules");

    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        entry.depth() == 0 || descend_vendor || (name != "node_modules" && name != ".git")
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if include.is_match(relative) && !exclude.is_match(relative) {
            files.push(relative.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}
