//! Build failure reports recovered from a tool's diagnostic output

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// `(plugin babel) SyntaxError: ...`
static PLUGIN_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(plugin ([^)]+)\)\s*(.*)$").expect("valid plugin regex"));

/// A transform or bundle error for one task or file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub message: String,
    pub plugin: Option<String>,
    /// Source excerpt around the error, kept verbatim
    pub frame: Option<String>,
}

impl BuildFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            plugin: None,
            frame: None,
        }
    }

    /// Recover a failure from stderr.
    ///
    /// The bundler marks its error line with `[!]`; other tools lead with the
    /// message. Lines after the message form the frame. Falls back to
    /// `fallback` when there is nothing to report.
    pub fn from_stderr(stderr: &str, fallback: &str) -> Self {
        let lines: Vec<&str> = stderr.lines().collect();
        let start = lines
            .iter()
            .position(|line| line.trim_start().starts_with("[!]"))
            .or_else(|| lines.iter().position(|line| !line.trim().is_empty()));

        let Some(start) = start else {
            return Self::new(fallback);
        };

        let headline = lines[start].trim().trim_start_matches("[!]").trim();
        let (plugin, message) = match PLUGIN_PREFIX.captures(headline) {
            Some(caps) => (Some(caps[1].to_string()), caps[2].to_string()),
            None => (None, headline.to_string()),
        };

        let frame = lines[start + 1..].join("\n");
        let frame = frame.trim_matches('\n').trim_end();

        Self {
            message,
            plugin,
            frame: (!frame.trim().is_empty()).then(|| frame.to_string()),
        }
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.plugin {
            Some(plugin) => write!(f, "({}) {}", plugin, self.message),
            None => f.write_str(&self.message),
        }
    }
}
