//! Compilation targets for the transpiler's environment preset

use semver::{Comparator, Op, Version, VersionReq};
use serde::Serialize;

use crate::env::TaskEnv;
use crate::error::KilnError;
use crate::project::Project;

/// Range assumed when the descriptor declares no `engines.node`
pub const DEFAULT_NODE_RANGE: &str = "8";

/// What the environment preset compiles for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EnvTargets {
    #[serde(rename = "node")]
    Node(String),
    #[serde(rename = "browsers")]
    Browsers(Vec<String>),
}

impl EnvTargets {
    /// Test runs target the running node; bundler builds target browsers;
    /// everything else targets the oldest node the package supports.
    pub fn for_task(project: &Project, env: &TaskEnv, fallback_browsers: &[String]) -> Result<Self, KilnError> {
        if env.test {
            return Ok(EnvTargets::Node("current".to_string()));
        }

        if env.bundler {
            let browsers = project
                .browserslist()
                .unwrap_or_else(|| fallback_browsers.to_vec());
            return Ok(EnvTargets::Browsers(browsers));
        }

        let range = project.engines_node().unwrap_or(DEFAULT_NODE_RANGE);
        lowest_version(range).map(|v| EnvTargets::Node(v.to_string()))
    }
}

/// Lowest version admitted by an npm style range.
///
/// Every `||` alternative contributes its lower bounds; upper bounds are
/// ignored. A range that yields no lower bound at all (`*`, `<10`) is
/// ambiguous.
pub fn lowest_version(range: &str) -> Result<Version, KilnError> {
    let ambiguous = || KilnError::AmbiguousVersionRange {
        range: range.to_string(),
    };

    let mut bounds = Vec::new();
    for alternative in range.split("||") {
        let normalized = normalize(alternative);
        if normalized.is_empty() {
            continue;
        }
        let req = VersionReq::parse(&normalized).map_err(|_| ambiguous())?;
        bounds.extend(req.comparators.iter().filter_map(lower_bound));
    }

    bounds.into_iter().min().ok_or_else(ambiguous)
}

fn lower_bound(comparator: &Comparator) -> Option<Version> {
    match comparator.op {
        Op::Exact | Op::Greater | Op::GreaterEq | Op::Tilde | Op::Caret | Op::Wildcard => {
            let mut version = Version::new(
                comparator.major,
                comparator.minor.unwrap_or(0),
                comparator.patch.unwrap_or(0),
            );
            version.pre = comparator.pre.clone();
            Some(version)
        }
        _ => None,
    }
}

/// Rewrite npm range syntax (`>= 8 <12`, `1.2 - 2`) into the comma
/// separated form the `semver` crate parses
fn normalize(alternative: &str) -> String {
    let tokens: Vec<&str> = alternative.split_whitespace().collect();
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];

        if tokens.get(i + 1) == Some(&"-") {
            if let Some(upper) = tokens.get(i + 2) {
                comparators.push(format!(">={}", strip_v(token)));
                comparators.push(format!("<={}", strip_v(upper)));
                i += 3;
                continue;
            }
        }

        if is_operator(token) {
            pending_op = Some(token);
            i += 1;
            continue;
        }

        let (op, version) = split_operator(token);
        let op = pending_op.take().unwrap_or(op);
        comparators.push(format!("{}{}", op, strip_v(version)));
        i += 1;
    }

    comparators.join(", ")
}

const OPERATORS: [&str; 7] = [">=", "<=", ">", "<", "=", "~", "^"];

fn is_operator(token: &str) -> bool {
    OPERATORS.contains(&token)
}

fn split_operator(token: &str) -> (&str, &str) {
    for op in OPERATORS {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("", token)
}

fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('='))
        .unwrap_or(version)
}
