//! Project introspection
//!
//! Locates the nearest `package.json`, keeps an immutable snapshot of it and
//! answers membership questions about files, properties and dependencies.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::debug;

use crate::error::KilnError;

/// File name of the package descriptor
pub const DESCRIPTOR_FILE: &str = "package.json";

static CURRENT: OnceCell<Arc<Project>> = OnceCell::new();

/// Runtime, dev and peer dependency maps of a descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    pub runtime: BTreeMap<String, String>,
    pub dev: BTreeMap<String, String>,
    pub peer: BTreeMap<String, String>,
}

impl DependencySet {
    fn from_descriptor(descriptor: &Value) -> Self {
        Self {
            runtime: string_map(descriptor.get("dependencies")),
            dev: string_map(descriptor.get("devDependencies")),
            peer: string_map(descriptor.get("peerDependencies")),
        }
    }

    /// True if `name` is a key in any of the three maps
    pub fn contains(&self, name: &str) -> bool {
        self.runtime.contains_key(name)
            || self.dev.contains_key(name)
            || self.peer.contains_key(name)
    }
}

/// Non-string values are kept as their JSON text
fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .map(|(name, version)| {
                    let version = match version {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), version)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Snapshot of the consuming project
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory containing the descriptor
    root: PathBuf,

    /// Raw descriptor object
    descriptor: Value,

    /// Dependency maps extracted from the descriptor
    dependencies: DependencySet,
}

impl Project {
    /// The project enclosing the current working directory, loaded once per process
    pub fn current() -> Result<Arc<Project>, KilnError> {
        CURRENT
            .get_or_try_init(|| {
                let cwd = std::env::current_dir()?;
                let cwd = fs::canonicalize(&cwd).unwrap_or(cwd);
                Project::discover(&cwd).map(Arc::new)
            })
            .cloned()
    }

    /// Walk upward from `start` to the first directory holding a descriptor
    pub fn discover(start: &Path) -> Result<Self, KilnError> {
        for dir in start.ancestors() {
            let candidate = dir.join(DESCRIPTOR_FILE);
            if candidate.is_file() {
                debug!("Using descriptor {}", candidate.display());
                return Self::load(&candidate);
            }
        }

        Err(KilnError::DescriptorNotFound {
            start: start.to_path_buf(),
        })
    }

    /// Load a descriptor from an explicit path
    pub fn load(path: &Path) -> Result<Self, KilnError> {
        let content = fs::read_to_string(path)?;
        let descriptor: Value =
            serde_json::from_str(&content).map_err(|e| KilnError::MalformedConfig {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self::from_value(root, descriptor))
    }

    /// Build a project from an in-memory descriptor
    pub fn from_value(root: PathBuf, descriptor: Value) -> Self {
        let dependencies = DependencySet::from_descriptor(&descriptor);
        Self {
            root,
            descriptor,
            dependencies,
        }
    }

    pub fn root_directory(&self) -> &Path {
        &self.root
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join(DESCRIPTOR_FILE)
    }

    pub fn descriptor(&self) -> &Value {
        &self.descriptor
    }

    pub fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }

    /// Package name, empty when the descriptor has none
    pub fn name(&self) -> &str {
        self.descriptor
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Resolve a path relative to the project root
    pub fn join_root<P: AsRef<Path>>(&self, relative: P) -> PathBuf {
        self.root.join(relative)
    }

    pub fn file_exists<P: AsRef<Path>>(&self, relative: P) -> bool {
        self.join_root(relative).exists()
    }

    /// Membership check into the descriptor, `a.b.c` walks nested objects
    pub fn has_property(&self, property_path: &str) -> bool {
        self.property(property_path).is_some()
    }

    /// Value at a dotted property path
    pub fn property(&self, property_path: &str) -> Option<&Value> {
        property_path
            .split('.')
            .try_fold(&self.descriptor, |value, segment| value.as_object()?.get(segment))
    }

    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.runtime.contains_key(name)
    }

    pub fn has_dev_dependency(&self, name: &str) -> bool {
        self.dependencies.dev.contains_key(name)
    }

    pub fn has_peer_dependency(&self, name: &str) -> bool {
        self.dependencies.peer.contains_key(name)
    }

    pub fn has_any_dependency(&self, name: &str) -> bool {
        self.dependencies.contains(name)
    }

    /// A project is built as TypeScript when it carries a `tsconfig.json`
    pub fn is_typescript(&self) -> bool {
        self.file_exists("tsconfig.json")
    }

    /// The declared `engines.node` range, if any
    pub fn engines_node(&self) -> Option<&str> {
        self.property("engines.node").and_then(Value::as_str)
    }

    /// Browser targets from the descriptor's `browserslist` property or a
    /// `.browserslistrc` file
    pub fn browserslist(&self) -> Option<Vec<String>> {
        match self.descriptor.get("browserslist") {
            Some(Value::String(query)) => return Some(split_queries(query)),
            Some(Value::Array(queries)) => {
                return Some(
                    queries
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                )
            }
            _ => {}
        }

        let rc = fs::read_to_string(self.join_root(".browserslistrc")).ok()?;
        let queries: Vec<String> = rc
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty() && !line.starts_with('['))
            .flat_map(split_queries)
            .collect();

        (!queries.is_empty()).then_some(queries)
    }
}

fn split_queries(query: &str) -> Vec<String> {
    query
        .split(',')
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> Project {
        Project::from_value(
            PathBuf::from("/test"),
            json!({
                "name": "@acme/widget",
                "testProp": true,
                "dependencies": { "depProp": "^1.0.0" },
                "devDependencies": { "depProp2": true },
                "peerDependencies": { "depProp3": ">=16" },
                "engines": { "node": ">=10" }
            }),
        )
    }

    #[test]
    fn test_has_property() {
        let project = fixture();
        assert!(project.has_property("testProp"));
        assert!(project.has_property("dependencies.depProp"));
        assert!(!project.has_property("notThere"));
        assert!(!project.has_property("testProp.nested"));
    }

    #[test]
    fn test_dependency_membership() {
        let project = fixture();
        assert!(project.has_dependency("depProp"));
        assert!(project.has_dev_dependency("depProp2"));
        assert!(project.has_peer_dependency("depProp3"));
        assert!(!project.has_dependency("depProp3"));

        for name in ["depProp", "depProp2", "depProp3"] {
            assert!(project.has_any_dependency(name));
        }
        assert!(!project.has_any_dependency("depProp4"));
    }

    #[test]
    fn test_non_string_versions_are_kept() {
        let project = fixture();
        assert_eq!(project.dependencies().dev["depProp2"], "true");
    }

    #[test]
    fn test_join_root() {
        let project = fixture();
        assert_eq!(
            project.join_root("path/from/root"),
            PathBuf::from("/test/path/from/root")
        );
        assert_eq!(project.engines_node(), Some(">=10"));
        assert_eq!(project.name(), "@acme/widget");
    }

    #[test]
    fn test_discover_walks_upward() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("package.json"), r#"{"name":"walk"}"#).unwrap();
        let nested = temp.path().join("src/deep/er");
        fs::create_dir_all(&nested).unwrap();

        let project = Project::discover(&nested).unwrap();
        assert_eq!(project.root_directory(), temp.path());
        assert_eq!(project.name(), "walk");
        assert!(project.file_exists("src/deep"));
        assert!(!project.file_exists("missing.txt"));
    }

    #[test]
    fn test_discover_missing_descriptor() {
        let temp = tempfile::tempdir().unwrap();
        let err = Project::discover(temp.path()).unwrap_err();
        assert!(matches!(err, KilnError::DescriptorNotFound { .. }));
    }

    #[test]
    fn test_browserslist_sources() {
        let inline = Project::from_value(
            PathBuf::from("/test"),
            json!({ "browserslist": "> 1%, last 2 versions" }),
        );
        assert_eq!(
            inline.browserslist(),
            Some(vec!["> 1%".to_string(), "last 2 versions".to_string()])
        );

        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join(".browserslistrc"),
            "# comment\ndefaults\nnot IE 11 # legacy\n",
        )
        .unwrap();
        let from_rc = Project::from_value(temp.path().to_path_buf(), json!({}));
        assert_eq!(
            from_rc.browserslist(),
            Some(vec!["defaults".to_string(), "not IE 11".to_string()])
        );
    }
}
