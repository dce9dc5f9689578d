//! Built-in formatter (prettier) config

use std::path::Path;

use serde_json::{json, Value};

use super::{locate, ResolvedConfig, Tool};
use crate::error::KilnError;
use crate::project::Project;

/// Ignore file used when the project has none
pub const IGNORE: &str = "node_modules\ndist\ncoverage\n*.min.js\npackage-lock.json\nyarn.lock\n";

/// Files formatted when none are given
pub const DEFAULT_PATTERN: &str = "**/*.+(js|json|less|css|ts|tsx|md)";

pub fn builtin() -> Value {
    json!({
        "printWidth": 80,
        "tabWidth": 2,
        "useTabs": false,
        "semi": true,
        "singleQuote": true,
        "trailingComma": "all",
        "bracketSpacing": true,
        "arrowParens": "avoid",
        "endOfLine": "lf"
    })
}

pub fn resolve(project: &Project, explicit: Option<&Path>) -> Result<ResolvedConfig, KilnError> {
    Ok(locate(Tool::Formatter, explicit, project)?
        .unwrap_or_else(|| ResolvedConfig::builtin(Tool::Formatter, builtin(), None)))
}

pub fn resolve_ignore(project: &Project, explicit: Option<&Path>) -> Result<ResolvedConfig, KilnError> {
    Ok(locate(Tool::FormatIgnore, explicit, project)?.unwrap_or_else(|| {
        ResolvedConfig::builtin(Tool::FormatIgnore, Value::String(IGNORE.to_string()), None)
    }))
}
