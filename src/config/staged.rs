//! Built-in pre-commit (lint-staged) config

use std::path::Path;

use serde_json::{json, Value};

use super::{locate, ResolvedConfig, Tool};
use crate::error::KilnError;
use crate::project::Project;

/// Staged files the built-in config formats and lints
pub const STAGED_PATTERN: &str = "*.+(js|jsx|json|yml|yaml|css|less|scss|ts|tsx|md|graphql|mdx|vue)";

pub fn builtin() -> Value {
    json!({ STAGED_PATTERN: ["kiln format", "kiln lint"] })
}

pub fn resolve(project: &Project, explicit: Option<&Path>) -> Result<ResolvedConfig, KilnError> {
    Ok(locate(Tool::PreCommit, explicit, project)?
        .unwrap_or_else(|| ResolvedConfig::builtin(Tool::PreCommit, builtin(), None)))
}
