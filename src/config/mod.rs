//! Configuration resolution
//!
//! Decides, per wrapped tool, which configuration applies to a project and
//! materializes built-in defaults. Precedence is the same for every tool:
//!
//! 1. an explicit path passed on the command line
//! 2. a conventional config file in the project root
//! 3. a property embedded in `package.json`
//! 4. the built-in default, derived fresh from the task's parameters
//!
//! Also loads `kiln.toml`, the tool's own settings file.

pub mod bundle;
pub mod format;
pub mod jest;
pub mod lint;
mod schema;
pub mod staged;
pub mod targets;
pub mod transpile;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::KilnError;
use crate::project::Project;
use crate::utils::hash_filename;

pub use schema::*;
pub use targets::EnvTargets;

/// File name of kiln's own settings
pub const SETTINGS_FILE: &str = "kiln.toml";

/// Settings read from `kiln.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub build: BuildSettings,

    #[serde(default)]
    pub transpile: TranspileSettings,

    #[serde(default)]
    pub targets: TargetSettings,

    #[serde(default)]
    pub cache: CacheSettings,
}

impl Settings {
    /// Load `kiln.toml` from the project root, defaults when absent
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content).map_err(|e| KilnError::MalformedConfig {
            path: path.clone(),
            message: e.to_string(),
        })?;

        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Absolute cache directory for generated configs
    pub fn cache_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.cache.dir)
    }
}

/// Tools whose configuration kiln resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Bundler,
    Transpiler,
    Linter,
    LintIgnore,
    Formatter,
    FormatIgnore,
    TestRunner,
    PreCommit,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::Bundler => "rollup",
            Tool::Transpiler => "babel",
            Tool::Linter => "eslint",
            Tool::LintIgnore => "eslintignore",
            Tool::Formatter => "prettier",
            Tool::FormatIgnore => "prettierignore",
            Tool::TestRunner => "jest",
            Tool::PreCommit => "lint-staged",
        }
    }

    /// Conventional config file names, checked in order
    pub fn config_files(self) -> &'static [&'static str] {
        match self {
            Tool::Bundler => &["rollup.config.js", "rollup.config.mjs"],
            Tool::Transpiler => &[
                ".babelrc",
                ".babelrc.js",
                ".babelrc.json",
                "babel.config.js",
                "babel.config.json",
            ],
            Tool::Linter => &[".eslintrc", ".eslintrc.js", ".eslintrc.cjs", ".eslintrc.json"],
            Tool::LintIgnore => &[".eslintignore"],
            Tool::Formatter => &[
                ".prettierrc",
                ".prettierrc.json",
                ".prettierrc.js",
                "prettier.config.js",
            ],
            Tool::FormatIgnore => &[".prettierignore"],
            Tool::TestRunner => &["jest.config.js", "jest.config.json"],
            Tool::PreCommit => &[".lintstagedrc", ".lintstagedrc.json", "lint-staged.config.js"],
        }
    }

    /// Property of `package.json` that may carry the config
    pub fn descriptor_property(self) -> Option<&'static str> {
        match self {
            Tool::Transpiler => Some("babel"),
            Tool::Linter => Some("eslintConfig"),
            Tool::LintIgnore => Some("eslintIgnore"),
            Tool::Formatter => Some("prettier"),
            Tool::TestRunner => Some("jest"),
            Tool::PreCommit => Some("lint-staged"),
            Tool::Bundler | Tool::FormatIgnore => None,
        }
    }
}

/// Where a resolved config came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Passed explicitly as a command option
    InlineOverride,
    /// A conventional config file in the project
    ProjectFile,
    /// A property of `package.json`
    Descriptor,
    /// kiln's own default
    BuiltIn,
}

/// The config itself: a file on disk or an in-memory object
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigPayload {
    Path(PathBuf),
    Object(Value),
}

/// A tool's config as chosen for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub tool: Tool,
    pub source: ConfigSource,
    pub payload: ConfigPayload,
    /// Compilation targets, for configs that carry them
    pub environment_targets: Option<EnvTargets>,
}

impl ResolvedConfig {
    pub fn builtin(tool: Tool, object: Value, environment_targets: Option<EnvTargets>) -> Self {
        Self {
            tool,
            source: ConfigSource::BuiltIn,
            payload: ConfigPayload::Object(object),
            environment_targets,
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.source == ConfigSource::BuiltIn
    }

    pub fn object(&self) -> Option<&Value> {
        match &self.payload {
            ConfigPayload::Object(value) => Some(value),
            ConfigPayload::Path(_) => None,
        }
    }

    /// Arguments pointing the tool at this config.
    ///
    /// Project files and descriptor properties are discovered by the tool
    /// itself, so they need no flag. Built-ins are written to the cache first.
    pub fn cli_args(&self, flag: &str, cache: &ConfigCache, extension: &str) -> Result<Vec<String>> {
        match (self.source, &self.payload) {
            (ConfigSource::InlineOverride, ConfigPayload::Path(path)) => {
                Ok(vec![flag.to_string(), path.display().to_string()])
            }
            (ConfigSource::BuiltIn, _) => {
                let path = cache.materialize(self, extension)?;
                Ok(vec![flag.to_string(), path.display().to_string()])
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Find a project-supplied config for `tool`, `None` means use the built-in.
///
/// JSON config files are parsed up front so a malformed file fails here,
/// with the parser's message, instead of deep inside the wrapped tool.
pub fn locate(tool: Tool, explicit: Option<&Path>, project: &Project) -> Result<Option<ResolvedConfig>, KilnError> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            project.join_root(path)
        };
        if !path.exists() {
            return Err(KilnError::ConfigNotFound(path));
        }
        validate_json_config(&path)?;
        debug!("Using explicit {} config {}", tool.name(), path.display());
        return Ok(Some(ResolvedConfig {
            tool,
            source: ConfigSource::InlineOverride,
            payload: ConfigPayload::Path(path),
            environment_targets: None,
        }));
    }

    if let Some(file) = tool.config_files().iter().find(|f| project.file_exists(f)) {
        let path = project.join_root(file);
        validate_json_config(&path)?;
        debug!("Using project {} config {}", tool.name(), path.display());
        return Ok(Some(ResolvedConfig {
            tool,
            source: ConfigSource::ProjectFile,
            payload: ConfigPayload::Path(path),
            environment_targets: None,
        }));
    }

    if let Some(property) = tool.descriptor_property() {
        if let Some(value) = project.property(property) {
            debug!("Using {} config from package.json#{}", tool.name(), property);
            return Ok(Some(ResolvedConfig {
                tool,
                source: ConfigSource::Descriptor,
                payload: ConfigPayload::Object(value.clone()),
                environment_targets: None,
            }));
        }
    }

    Ok(None)
}

/// Parse files that are JSON by name or by content; scripts are left to the tool
fn validate_json_config(path: &Path) -> Result<(), KilnError> {
    let is_script = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("js" | "cjs" | "mjs" | "ts")
    );
    if is_script || path.is_dir() {
        return Ok(());
    }

    let content = fs::read_to_string(path)?;
    let declared_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    if !declared_json && !content.trim_start().starts_with('{') {
        return Ok(());
    }

    serde_json::from_str::<Value>(&content)
        .map(|_| ())
        .map_err(|e| KilnError::MalformedConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Directory receiving generated configs.
///
/// File names carry a hash of their content, so a written file never
/// changes and concurrent tasks never share one by accident.
#[derive(Debug, Clone)]
pub struct ConfigCache {
    dir: PathBuf,
}

impl ConfigCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `contents` under `<stem>.<hash>.<extension>`
    pub fn write(&self, stem: &str, extension: &str, contents: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {}", self.dir.display()))?;

        let path = self
            .dir
            .join(hash_filename(stem, contents.as_bytes(), extension));
        if !path.exists() {
            fs::write(&path, contents)
                .with_context(|| format!("Failed to write generated config: {}", path.display()))?;
        }
        Ok(path)
    }

    /// Write an object payload as JSON, or a string payload verbatim;
    /// path payloads are returned as-is
    pub fn materialize(&self, config: &ResolvedConfig, extension: &str) -> Result<PathBuf> {
        match &config.payload {
            ConfigPayload::Path(path) => Ok(path.clone()),
            ConfigPayload::Object(Value::String(text)) => {
                self.write(config.tool.name(), extension, text)
            }
            ConfigPayload::Object(value) => {
                let contents = serde_json::to_string_pretty(value)?;
                self.write(config.tool.name(), extension, &contents)
            }
        }
    }
}
