//! Settings schema definitions for `kiln.toml`

use serde::{Deserialize, Serialize};

/// Bundler build defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Comma separated output formats
    #[serde(default = "default_formats")]
    pub formats: String,

    /// Output directory
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            dir: default_output_dir(),
        }
    }
}

fn default_formats() -> String {
    "esm,cjs,umd,umd.min".to_string()
}

fn default_output_dir() -> String {
    "dist".to_string()
}

/// Transpiler build defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranspileSettings {
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub out_dir: String,

    /// Comma separated globs excluded from processing
    #[serde(default = "default_ignore")]
    pub ignore: String,
}

impl Default for TranspileSettings {
    fn default() -> Self {
        Self {
            out_dir: default_output_dir(),
            ignore: default_ignore(),
        }
    }
}

fn default_ignore() -> String {
    "**/node_modules/**,**/__mocks__/**,**/__tests__/**,**/__fixtures__/**,**/__coverage__/**"
        .to_string()
}

/// Compilation targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSettings {
    /// Browser queries used when the project declares none
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            browsers: default_browsers(),
        }
    }
}

fn default_browsers() -> Vec<String> {
    vec!["ie 10".to_string(), "ios 7".to_string()]
}

/// Where generated configs are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Directory relative to the project root
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> String {
    "node_modules/.cache/kiln".to_string()
}
