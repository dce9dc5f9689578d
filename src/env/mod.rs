//! Build environment encoding
//!
//! Build parameters travel as a flat key/string map. An [`EnvSnapshot`] is
//! captured once from the process environment and then only ever extended
//! into new snapshots, so every build task owns its own immutable copy.
//! [`TaskEnv`] is the typed view that config builders consume.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::KilnError;
use crate::pipeline::OutputFormat;

/// Version of the encoding handed to child processes
pub const ENV_ENCODING_VERSION: &str = "1";

/// Recognised keys
pub mod keys {
    pub const ENCODING_VERSION: &str = "KILN_ENV_VERSION";
    pub const BUNDLER: &str = "BUILD_BUNDLER";
    pub const FORMAT: &str = "BUILD_FORMAT";
    pub const INPUT: &str = "BUILD_INPUT";
    pub const OUTPUT: &str = "BUILD_OUTPUT";
    pub const WATCHMODE: &str = "BUILD_WATCHMODE";
    pub const MINIFY: &str = "BUILD_MINIFY";
    pub const TS: &str = "BUILD_TS";
    pub const TREESHAKE: &str = "BUILD_TREESHAKE";
    pub const SOURCEMAP: &str = "BUILD_SOURCEMAP";
    pub const ALIAS: &str = "BUILD_ALIAS";
    pub const EXTERNAL: &str = "BUILD_EXTERNAL";
    pub const GLOBALS: &str = "BUILD_GLOBALS";
    pub const NAME: &str = "BUILD_NAME";
    pub const FILENAME_PREFIX: &str = "BUILD_FILENAME_PREFIX";
    pub const FILENAME_SUFFIX: &str = "BUILD_FILENAME_SUFFIX";
    pub const NODE_ENV: &str = "NODE_ENV";
    pub const BABEL_ENV: &str = "BABEL_ENV";
}

/// Immutable key/string map of build parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// A new snapshot with `key` set
    pub fn with(&self, key: &str, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.vars.insert(key.to_string(), value.into());
        next
    }

    /// A new snapshot with every pair applied in order
    pub fn with_all<I, K, V>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut next = self.clone();
        next.vars
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        next
    }

    /// The stored string, untouched
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Look up `key`, decoding JSON where possible.
    ///
    /// Absent, empty and literal `"undefined"` values yield `default`; a value
    /// that is not valid JSON is returned as a plain string.
    pub fn get(&self, key: &str, default: Value) -> Value {
        match self.raw(key) {
            None | Some("") | Some("undefined") => default,
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
        }
    }

    /// Typed lookup; `None` when absent or not decodable as `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get(key, Value::Null) {
            Value::Null => None,
            value => serde_json::from_value(value).ok(),
        }
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key, Value::Bool(default)) {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_i64() != Some(0),
            Value::String(s) => !s.is_empty(),
            Value::Null => false,
            _ => true,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Build parameters to hand to a child process, tagged with the encoding version
    pub fn child_env(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = self
            .vars
            .iter()
            .filter(|(key, _)| is_build_key(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.push((
            keys::ENCODING_VERSION.to_string(),
            ENV_ENCODING_VERSION.to_string(),
        ));
        env
    }
}

/// Keys that belong to the build boundary
pub fn is_build_key(key: &str) -> bool {
    key.starts_with("BUILD_") || key == keys::NODE_ENV || key == keys::BABEL_ENV
}

/// Parse `KEY:value,OTHER:value` as given to `--environment`
pub fn parse_environment(spec: &str) -> Result<Vec<(String, String)>, KilnError> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, value) = entry.split_once(':').unwrap_or((entry, "true"));
            let key = key.trim();
            if key.is_empty() {
                return Err(KilnError::InvalidEnvironment(entry.to_string()));
            }
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Typed view of one task's build parameters
#[derive(Debug, Clone)]
pub struct TaskEnv {
    pub format: Option<OutputFormat>,
    pub minify: bool,
    pub watch: bool,
    pub typescript: bool,
    pub sourcemap: bool,
    pub bundler: bool,
    pub treeshake: bool,
    pub test: bool,
    pub alias: Option<Map<String, Value>>,
    pub external: Option<Vec<String>>,
    pub globals: Option<Map<String, Value>>,
    pub name: Option<String>,
    pub filename_prefix: String,
    pub filename_suffix: String,
    pub input: String,
    pub output: String,
    pub node_env: Option<String>,
    snapshot: EnvSnapshot,
}

impl TaskEnv {
    pub fn decode(snapshot: EnvSnapshot) -> Result<Self, KilnError> {
        let format = snapshot
            .raw(keys::FORMAT)
            .filter(|f| !f.is_empty() && *f != "undefined")
            .map(str::parse::<OutputFormat>)
            .transpose()?;

        let babel_env = snapshot
            .raw(keys::BABEL_ENV)
            .or_else(|| snapshot.raw(keys::NODE_ENV));
        let bundler = snapshot.flag(keys::BUNDLER, false);

        Ok(Self {
            format,
            minify: snapshot.flag(keys::MINIFY, false),
            watch: snapshot.flag(keys::WATCHMODE, false),
            typescript: snapshot.flag(keys::TS, false),
            sourcemap: snapshot.flag(keys::SOURCEMAP, false),
            bundler,
            treeshake: snapshot.flag(keys::TREESHAKE, bundler),
            test: babel_env == Some("test"),
            alias: snapshot.get_as(keys::ALIAS),
            external: snapshot.get_as(keys::EXTERNAL),
            globals: snapshot.get_as(keys::GLOBALS),
            name: snapshot.get_as(keys::NAME),
            filename_prefix: snapshot.get_as(keys::FILENAME_PREFIX).unwrap_or_default(),
            filename_suffix: snapshot.get_as(keys::FILENAME_SUFFIX).unwrap_or_default(),
            input: snapshot
                .get_as(keys::INPUT)
                .unwrap_or_else(|| "src/index.ts".to_string()),
            output: snapshot
                .get_as(keys::OUTPUT)
                .unwrap_or_else(|| "dist".to_string()),
            node_env: snapshot.raw(keys::NODE_ENV).map(str::to_string),
            snapshot,
        })
    }

    pub fn snapshot(&self) -> &EnvSnapshot {
        &self.snapshot
    }

    pub fn is_format(&self, format: OutputFormat) -> bool {
        self.format == Some(format)
    }
}
