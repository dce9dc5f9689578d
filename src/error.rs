//! Typed errors for the orchestration core
//!
//! Command plumbing wraps these in `anyhow` with file/property context;
//! the variants here are the failures callers match on.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while introspecting a project or resolving configs
#[derive(Debug, Error)]
pub enum KilnError {
    /// No `package.json` between the start directory and the filesystem root
    #[error("No package.json found in {} or any parent directory", .start.display())]
    DescriptorNotFound { start: PathBuf },

    /// An engine range without a concrete lower bound
    #[error(
        "Unable to determine the oldest version in the range in your package.json at engines.node: \"{range}\". Please attempt to make it less ambiguous."
    )]
    AmbiguousVersionRange { range: String },

    /// A user supplied config file that could not be parsed
    #[error("Malformed config file {}: {message}", .path.display())]
    MalformedConfig { path: PathBuf, message: String },

    /// An explicitly requested config file that does not exist
    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// An output format the bundler does not know
    #[error("Unknown output format '{0}' (expected one of amd, cjs, esm, es, iife, system, umd)")]
    UnknownFormat(String),

    /// A malformed `--environment` entry
    #[error("Invalid environment entry '{0}' (expected KEY:value)")]
    InvalidEnvironment(String),

    /// A wrapped tool's executable could not be located
    #[error("Could not find the '{0}' executable in node_modules/.bin or on PATH")]
    ToolNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
