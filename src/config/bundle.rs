//! Built-in bundler (rollup) config
//!
//! The bundler only loads configs from JavaScript modules, so the built-in is
//! modelled as a [`BundleConfig`] and rendered to an ES module per task.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::transpile;
use super::{locate, ConfigCache, ConfigPayload, ConfigSource, ResolvedConfig, Settings, Tool};
use crate::env::{is_build_key, keys, TaskEnv};
use crate::pipeline::OutputFormat;
use crate::project::Project;
use crate::utils::{camel_case, capitalize, glob_files, to_slash, upper_first};

/// Node core modules, never bundled for non-browser formats
pub const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "dns", "domain", "events", "fs", "http", "http2", "https", "inspector",
    "module", "net", "os", "path", "perf_hooks", "process", "punycode", "querystring",
    "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls", "trace_events",
    "tty", "url", "util", "v8", "vm", "worker_threads", "zlib",
];

/// Extensions the resolver and transpiler plugins handle
pub const EXTENSIONS: &[&str] = &[".js", ".jsx", ".es6", ".es", ".mjs", ".ts", ".tsx"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputOptions {
    pub name: String,
    pub dir: String,
    pub entry_file_names: String,
    pub chunk_file_names: String,
    pub format: String,
    pub exports: String,
    pub globals: Map<String, Value>,
    pub sourcemap: bool,
}

/// Directory a task writes into: `[prefix/]output/format`
pub fn output_dir(env: &TaskEnv) -> String {
    let format = env.format.unwrap_or(OutputFormat::Esm);
    let dir: PathBuf = [env.filename_prefix.as_str(), env.output.as_str(), format.as_str()]
        .iter()
        .filter(|segment| !segment.is_empty())
        .collect();
    to_slash(&dir)
}

/// Path of the entry chunk `name` that a default build writes for `format`
pub fn entry_path(output: &str, format: OutputFormat, name: &str) -> String {
    format!("{}/{}/{}.{}.js", output, format.as_str(), name, format.file_tag())
}

/// Options for the transpiler plugin
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranspilerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presets: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Value>,
    /// Let the transpiler pick up the project's own config
    pub babelrc: bool,
    pub babel_helpers: &'static str,
    pub extensions: Vec<&'static str>,
}

/// One task's bundler config
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleConfig {
    pub input: Vec<String>,
    pub output: OutputOptions,
    /// Module ids matched by the external predicate
    pub external: Vec<String>,
    /// Bundle everything except `external` (browser bundles)
    pub bundle_dependencies: bool,
    pub transpiler: TranspilerOptions,
    pub replacements: BTreeMap<String, String>,
    pub minify: bool,
    pub toplevel: bool,
}

impl BundleConfig {
    pub fn builtin(project: &Project, env: &TaskEnv, transpiler: &ResolvedConfig) -> Result<Self> {
        let format = env.format.unwrap_or(OutputFormat::Esm);
        let umd = format == OutputFormat::Umd;

        let input = glob_files::<&str>(project.root_directory(), &env.input, &[])?;
        let input = if input.is_empty() {
            // Let the bundler report the missing entry for this task
            vec![to_slash(&project.join_root(&env.input))]
        } else {
            input
                .iter()
                .map(|p| to_slash(&project.join_root(p)))
                .collect()
        };

        let peer_deps: Vec<String> = project.dependencies().peer.keys().cloned().collect();
        let runtime_deps: Vec<String> = project.dependencies().runtime.keys().cloned().collect();

        let default_external: Vec<String> = if umd {
            peer_deps.clone()
        } else {
            runtime_deps
                .iter()
                .chain(peer_deps.iter())
                .cloned()
                .chain(NODE_BUILTINS.iter().map(|s| s.to_string()))
                .collect()
        };
        let mut external = env.external.clone().unwrap_or(default_external);
        dedup_in_order(&mut external);

        let globals = env.globals.clone().unwrap_or_else(|| {
            peer_deps
                .iter()
                .map(|dep| (dep.clone(), Value::String(capitalize(&camel_case(dep)))))
                .collect()
        });

        let name = env
            .name
            .clone()
            .unwrap_or_else(|| upper_first(&camel_case(project.name())));

        let min = if env.minify { ".min" } else { "" };
        let suffix = &env.filename_suffix;
        let output = OutputOptions {
            name,
            dir: output_dir(env),
            entry_file_names: format!("[name]{}.[format]{}.js", suffix, min),
            chunk_file_names: format!("[name]-[hash]{}.[format]{}.js", suffix, min),
            format: format.as_str().to_string(),
            exports: if format == OutputFormat::Esm { "named" } else { "auto" }.to_string(),
            globals,
            sourcemap: env.sourcemap,
        };

        let builtin_transpiler = transpiler.is_builtin();
        let (presets, plugins) = match transpiler.object() {
            Some(object) if builtin_transpiler => {
                (object.get("presets").cloned(), object.get("plugins").cloned())
            }
            _ => (None, None),
        };

        Ok(Self {
            input,
            output,
            external,
            bundle_dependencies: umd,
            transpiler: TranspilerOptions {
                presets,
                plugins,
                babelrc: !builtin_transpiler,
                babel_helpers: if builtin_transpiler { "runtime" } else { "bundled" },
                extensions: EXTENSIONS.to_vec(),
            },
            replacements: replacements(env, umd),
            minify: env.minify,
            toplevel: format == OutputFormat::Cjs,
        })
    }

    /// Source of the `^(dep|other)($|/)` pattern behind the external predicate
    pub fn external_pattern(&self) -> Option<String> {
        if self.external.is_empty() {
            return None;
        }
        let names: Vec<String> = self.external.iter().map(|e| regex::escape(e)).collect();
        Some(format!("^({})($|/)", names.join("|")))
    }

    /// Whether the bundler treats `id` as external
    pub fn is_external(&self, id: &str) -> bool {
        let is_dep = self
            .external_pattern()
            .and_then(|pattern| Regex::new(&pattern).ok())
            .is_some_and(|re| re.is_match(id));
        if self.bundle_dependencies {
            return is_dep;
        }
        let is_node_module = id.contains("node_modules");
        let is_relative = id.starts_with('.');
        is_dep || (!is_relative && !Path::new(id).is_absolute()) || is_node_module
    }

    /// Render as an ES module the bundler can load with `--config`
    pub fn render_module(&self) -> String {
        let input = if self.input.len() == 1 {
            json!(self.input[0])
        } else {
            json!(self.input)
        };
        let pattern = match self.external_pattern() {
            Some(pattern) => format!("new RegExp({})", json!(pattern)),
            None => "null".to_string(),
        };
        let terser = if self.minify {
            format!("\n    terser({}),", pretty(&self.terser_options()))
        } else {
            String::new()
        };

        format!(
            r#"// Generated by kiln. Do not edit.
import path from 'path';
import {{ nodeResolve }} from '@rollup/plugin-node-resolve';
import commonjs from '@rollup/plugin-commonjs';
import json from '@rollup/plugin-json';
import {{ eslint }} from 'rollup-plugin-eslint';
import {{ babel }} from '@rollup/plugin-babel';
import replace from '@rollup/plugin-replace';
import {{ terser }} from 'rollup-plugin-terser';

const extensions = {extensions};
const externalPattern = {pattern};
const bundleDependencies = {bundle_dependencies};

function external(id) {{
  const isDep = externalPattern !== null && externalPattern.test(id);
  if (bundleDependencies) {{
    return isDep;
  }}
  const isNodeModule = id.includes('node_modules');
  const isRelative = id.startsWith('.');
  return isDep || (!isRelative && !path.isAbsolute(id)) || isNodeModule;
}}

const stripShebang = {{
  name: 'strip-shebang',
  transform(code) {{
    return {{ code: code.replace(/^#!(.*)/, ''), map: null }};
  }},
}};

export default {{
  input: {input},
  output: [{output}],
  external,
  plugins: [
    nodeResolve({{ mainFields: ['module', 'main', 'jsnext', 'browser'], extensions }}),
    commonjs({{ include: 'node_modules/**' }}),
    json(),
    eslint({{ throwOnError: true }}),
    babel({transpiler}),
    replace({replacements}),
    stripShebang,{terser}
  ],
}};
"#,
            extensions = json!(EXTENSIONS),
            pattern = pattern,
            bundle_dependencies = self.bundle_dependencies,
            input = input,
            output = pretty(&json!(self.output)),
            transpiler = pretty(&json!(self.transpiler)),
            replacements = pretty(&json!(self.replacements)),
            terser = terser,
        )
    }

    fn terser_options(&self) -> Value {
        json!({
            "sourcemap": true,
            "output": { "comments": false },
            "compress": { "keep_infinity": true, "pure_getters": true, "passes": 10 },
            "ecma": 5,
            "toplevel": self.toplevel,
            "warnings": true,
        })
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

/// `process.env.KEY` replacements for the task's build parameters.
///
/// Booleans and integers are inlined as-is, everything else as a string
/// literal. `NODE_ENV` is only inlined into browser bundles.
pub fn replacements(env: &TaskEnv, umd: bool) -> BTreeMap<String, String> {
    env.snapshot()
        .iter()
        .filter(|(key, _)| is_build_key(key) && *key != keys::BABEL_ENV)
        .filter(|(key, _)| umd || *key != keys::NODE_ENV)
        .map(|(key, value)| {
            let literal = if value == "true" || value == "false" || value.parse::<i64>().is_ok() {
                value.to_string()
            } else {
                Value::String(value.to_string()).to_string()
            };
            (format!("process.env.{}", key), literal)
        })
        .collect()
}

/// Bundler config for one task, written where the bundler can load it.
///
/// Returns the resolved config together with the file handed to `--config`.
pub fn resolve(
    project: &Project,
    env: &TaskEnv,
    settings: &Settings,
    explicit: Option<&Path>,
    cache: &ConfigCache,
) -> Result<(ResolvedConfig, PathBuf)> {
    if let Some(found) = locate(Tool::Bundler, explicit, project)? {
        if let ConfigPayload::Path(path) = &found.payload {
            let path = path.clone();
            return Ok((found, path));
        }
    }

    let transpiler = transpile::resolve(project, env, settings, None)?;
    let config = BundleConfig::builtin(project, env, &transpiler)?;
    let path = cache.write("rollup.config", "mjs", &config.render_module())?;

    let resolved = ResolvedConfig {
        tool: Tool::Bundler,
        source: ConfigSource::BuiltIn,
        payload: ConfigPayload::Object(serde_json::to_value(&config)?),
        environment_targets: transpiler.environment_targets,
    };
    Ok((resolved, path))
}
