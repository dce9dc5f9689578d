//! Built-in test runner (jest) config
//!
//! The runner's transform is a small module wrapping the transpiler config,
//! evaluated for a test run.

use std::path::Path;

use anyhow::Result;
use serde_json::{json, Value};

use super::transpile;
use super::{locate, ConfigCache, ResolvedConfig, Settings, Tool};
use crate::env::TaskEnv;
use crate::project::Project;
use crate::utils::to_slash;

/// Render the transform module handed to the runner
pub fn render_transform(transpiler: &Value) -> String {
    let options = serde_json::to_string_pretty(transpiler).unwrap_or_else(|_| transpiler.to_string());
    format!(
        "// Generated by kiln. Do not edit.\n\
         const babelJest = require('babel-jest');\n\
         \n\
         module.exports = (babelJest.default || babelJest).createTransformer({});\n",
        options
    )
}

pub fn builtin(project: &Project, transform: &str) -> Value {
    let environment = if project.has_any_dependency("react") {
        "jsdom"
    } else {
        "node"
    };

    json!({
        "rootDir": to_slash(project.root_directory()),
        "roots": ["<rootDir>/src"],
        "testEnvironment": environment,
        "moduleFileExtensions": ["js", "jsx", "json", "ts", "tsx"],
        "testMatch": [
            "**/__tests__/**/*.+(js|jsx|ts|tsx)",
            "**/*.(test|spec).+(js|jsx|ts|tsx)"
        ],
        "transform": { "^.+\\.(js|jsx|ts|tsx)$": transform },
        "collectCoverageFrom": ["src/**/*.+(js|jsx|ts|tsx)"],
        "coveragePathIgnorePatterns": ["/node_modules/", "/__tests__/"]
    })
}

/// The runner's config. `env` must already describe a test run.
pub fn resolve(
    project: &Project,
    env: &TaskEnv,
    settings: &Settings,
    explicit: Option<&Path>,
    cache: &ConfigCache,
) -> Result<ResolvedConfig> {
    if let Some(found) = locate(Tool::TestRunner, explicit, project)? {
        return Ok(found);
    }

    let transpiler = transpile::resolve(project, env, settings, None)?;
    let transform = match transpiler.object() {
        Some(object) if transpiler.is_builtin() => {
            to_slash(&cache.write("babel-transform", "cjs", &render_transform(object))?)
        }
        // The project's own transpiler config is picked up by babel-jest
        _ => "babel-jest".to_string(),
    };
    let config = builtin(project, &transform);

    Ok(ResolvedConfig::builtin(
        Tool::TestRunner,
        config,
        transpiler.environment_targets,
    ))
}
