//! Built-in transpiler (babel) config
//!
//! Composition depends on the project's dependencies and the task's
//! environment. Entries whose condition does not hold are dropped; the
//! order of the remaining entries is fixed.

use std::path::Path;

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use serde_json::{json, Value};

use super::{locate, EnvTargets, ResolvedConfig, Settings, Tool};
use crate::env::TaskEnv;
use crate::error::KilnError;
use crate::pipeline::OutputFormat;
use crate::project::Project;

/// A preset or plugin, serialized as `["name"]` or `["name", options]`
#[derive(Debug, Clone, PartialEq)]
pub struct PluginEntry {
    pub name: &'static str,
    pub options: Option<Value>,
}

impl PluginEntry {
    pub fn new(name: &'static str) -> Self {
        Self { name, options: None }
    }

    pub fn with_options(name: &'static str, options: Value) -> Self {
        Self {
            name,
            options: Some(options),
        }
    }
}

impl Serialize for PluginEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.options.is_some() { 2 } else { 1 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(self.name)?;
        if let Some(options) = &self.options {
            seq.serialize_element(options)?;
        }
        seq.end()
    }
}

/// Presets and plugins handed to the transpiler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranspileConfig {
    pub presets: Vec<PluginEntry>,
    pub plugins: Vec<PluginEntry>,
}

impl TranspileConfig {
    pub fn builtin(project: &Project, env: &TaskEnv, targets: &EnvTargets) -> Self {
        let react = project.has_any_dependency("react");
        let cjs = env.is_format(OutputFormat::Cjs);
        let umd = env.is_format(OutputFormat::Umd);
        let treeshake = env.treeshake;

        let presets = vec![
            Some(PluginEntry::with_options(
                "@babel/preset-env",
                json!({ "modules": false, "loose": true, "targets": targets }),
            )),
            react.then(|| PluginEntry::new("@babel/preset-react")),
            env.typescript
                .then(|| PluginEntry::new("@babel/preset-typescript")),
        ];

        let plugins = vec![
            Some(PluginEntry::with_options(
                "@babel/plugin-transform-runtime",
                json!({ "useESModules": treeshake && !cjs }),
            )),
            Some(PluginEntry::new("babel-plugin-macros")),
            Some(PluginEntry::with_options(
                "@babel/plugin-proposal-class-properties",
                json!({ "loose": true }),
            )),
            Some(PluginEntry::new("@babel/plugin-proposal-object-rest-spread")),
            Some(PluginEntry::new("babel-plugin-minify-dead-code-elimination")),
            env.typescript
                .then(|| PluginEntry::new("@babel/plugin-proposal-optional-chaining")),
            env.alias.as_ref().map(|alias| {
                PluginEntry::with_options(
                    "babel-plugin-module-resolver",
                    json!({ "root": ["./src"], "alias": alias }),
                )
            }),
            react.then(|| {
                PluginEntry::with_options(
                    "babel-plugin-transform-react-remove-prop-types",
                    json!({ "mode": "unsafe-wrap" }),
                )
            }),
            (!cjs && treeshake).then(|| {
                PluginEntry::with_options(
                    "babel-plugin-transform-rename-import",
                    json!({ "replacements": [{ "original": "lodash", "replacement": "lodash-es" }] }),
                )
            }),
            umd.then(|| PluginEntry::new("babel-plugin-transform-inline-environment-variables")),
            (!treeshake).then(|| PluginEntry::new("@babel/plugin-transform-modules-commonjs")),
        ];

        Self {
            presets: presets.into_iter().flatten().collect(),
            plugins: plugins.into_iter().flatten().collect(),
        }
    }

    pub fn preset_names(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.name).collect()
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name).collect()
    }

    pub fn to_value(&self) -> Value {
        // Entries are strings and JSON values only
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The transpiler config for one task: the project's own, or a fresh built-in
pub fn resolve(
    project: &Project,
    env: &TaskEnv,
    settings: &Settings,
    explicit: Option<&Path>,
) -> Result<ResolvedConfig, KilnError> {
    if let Some(found) = locate(Tool::Transpiler, explicit, project)? {
        return Ok(found);
    }

    let targets = EnvTargets::for_task(project, env, &settings.targets.browsers)?;
    let config = TranspileConfig::builtin(project, env, &targets);
    Ok(ResolvedConfig::builtin(
        Tool::Transpiler,
        config.to_value(),
        Some(targets),
    ))
}
