//! Build tasks: one per requested output format

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::{bundle, ResolvedConfig};
use crate::env::TaskEnv;
use crate::error::KilnError;

/// Bundle output formats understood by the bundler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Amd,
    Cjs,
    Esm,
    Iife,
    System,
    Umd,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Amd => "amd",
            OutputFormat::Cjs => "cjs",
            OutputFormat::Esm => "esm",
            OutputFormat::Iife => "iife",
            OutputFormat::System => "system",
            OutputFormat::Umd => "umd",
        }
    }

    /// What the bundler writes for `[format]` in file names
    pub fn file_tag(self) -> &'static str {
        match self {
            OutputFormat::Esm => "es",
            other => other.as_str(),
        }
    }

    /// Formats meant to run directly in a browser
    pub fn is_browser(self) -> bool {
        matches!(self, OutputFormat::Umd | OutputFormat::Iife)
    }
}

impl FromStr for OutputFormat {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amd" => Ok(OutputFormat::Amd),
            "cjs" | "commonjs" => Ok(OutputFormat::Cjs),
            "esm" | "es" | "module" => Ok(OutputFormat::Esm),
            "iife" => Ok(OutputFormat::Iife),
            "system" | "systemjs" => Ok(OutputFormat::System),
            "umd" => Ok(OutputFormat::Umd),
            other => Err(KilnError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a `--format` list, e.g. `umd.min`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRequest {
    /// The entry as written, used for reporting
    pub label: String,
    pub format: OutputFormat,
    pub minify: bool,
}

impl FormatRequest {
    /// Parse a comma separated list; any `.suffix` marks the entry as minified
    pub fn parse_list(list: &str) -> Result<Vec<FormatRequest>, KilnError> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (name, marker) = match entry.split_once('.') {
                    Some((name, marker)) => (name, !marker.is_empty()),
                    None => (entry, false),
                };
                Ok(FormatRequest {
                    label: entry.to_string(),
                    format: name.parse()?,
                    minify: marker,
                })
            })
            .collect()
    }

    pub fn node_env(&self) -> &'static str {
        if self.minify {
            "production"
        } else {
            "development"
        }
    }

    pub fn sourcemap(&self) -> bool {
        self.format == OutputFormat::Umd
    }
}

/// A fully prepared build unit.
///
/// Its environment and config are fixed when the task is planned; running it
/// reads nothing else.
#[derive(Debug, Clone)]
pub struct BuildTask {
    /// Position in the requested format list
    pub index: usize,
    pub request: FormatRequest,
    pub env: TaskEnv,
    pub config: ResolvedConfig,
    /// Config file handed to the bundler
    pub config_path: PathBuf,
}

impl BuildTask {
    pub fn label(&self) -> &str {
        &self.request.label
    }

    /// Where this task's bundles land, relative to the project root
    pub fn output_dir(&self) -> String {
        bundle::output_dir(&self.env)
    }
}
