//! Project setup command
//!
//! Scaffolds sources from a template, writes editor and tool configs, wires
//! kiln into `package.json`, installs what is missing and initializes git.
//! Every step reports on its own; a failed step does not stop the rest.

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Select};
use serde_json::{json, Map, Value};

use super::output;
use super::Context;
use crate::config::{bundle, format, lint};
use crate::pipeline::OutputFormat;
use crate::project::Project;
use crate::tools::{resolve_bin, Invocation, OutputMode};
use crate::utils::display_relative;

/// Project templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Template {
    /// Configs only, no sources
    Empty,
    Javascript,
    Typescript,
    ReactTs,
    ReactJs,
}

impl Template {
    const ALL: [Template; 5] = [
        Template::Empty,
        Template::Javascript,
        Template::Typescript,
        Template::ReactTs,
        Template::ReactJs,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Template::Empty => "empty",
            Template::Javascript => "javascript",
            Template::Typescript => "typescript",
            Template::ReactTs => "react-ts",
            Template::ReactJs => "react-js",
        }
    }

    fn is_react(self) -> bool {
        matches!(self, Template::ReactTs | Template::ReactJs)
    }

    fn is_typescript(self) -> bool {
        matches!(self, Template::Typescript | Template::ReactTs)
    }

    /// Entry point the build script points at
    fn entry(self) -> &'static str {
        match self {
            Template::Javascript | Template::Empty => "src/index.js",
            Template::Typescript => "src/index.ts",
            Template::ReactTs => "src/index.tsx",
            Template::ReactJs => "src/index.jsx",
        }
    }

    /// Source files as `(path, contents)`
    fn files(self) -> Vec<(&'static str, &'static str)> {
        match self {
            Template::Empty => Vec::new(),
            Template::Javascript => vec![
                (
                    "src/index.js",
                    r#"export function sum(a, b) {
  return a + b;
}
"#,
                ),
                (
                    "src/__tests__/index.js",
                    r#"import { sum } from '../index';

describe('sum', () => {
  it('adds two numbers', () => {
    expect(sum(1, 2)).toBe(3);
  });
});
"#,
                ),
            ],
            Template::Typescript => vec![
                (
                    "src/index.ts",
                    r#"export function sum(a: number, b: number): number {
  return a + b;
}
"#,
                ),
                (
                    "src/__tests__/index.ts",
                    r#"import { sum } from '../index';

describe('sum', () => {
  it('adds two numbers', () => {
    expect(sum(1, 2)).toBe(3);
  });
});
"#,
                ),
            ],
            Template::ReactTs => vec![
                (
                    "src/index.tsx",
                    r#"import * as React from 'react';

export interface ComponentProps {
  label?: string;
}

export const Component: React.FC<ComponentProps> = ({ label = 'Hello' }) => (
  <div>{label}</div>
);
"#,
                ),
                (
                    "src/__tests__/index.tsx",
                    r#"import * as React from 'react';
import * as ReactDOM from 'react-dom';
import { Component } from '../index';

describe('it', () => {
  it('renders without crashing', () => {
    const div = document.createElement('div');
    ReactDOM.render(<Component />, div);
    ReactDOM.unmountComponentAtNode(div);
  });
});
"#,
                ),
            ],
            Template::ReactJs => vec![
                (
                    "src/index.jsx",
                    r#"import * as React from 'react';

export const Component = ({ label = 'Hello' }) => <div>{label}</div>;
"#,
                ),
                (
                    "src/__tests__/index.jsx",
                    r#"import * as React from 'react';
import * as ReactDOM from 'react-dom';
import { Component } from '../index';

describe('it', () => {
  it('renders without crashing', () => {
    const div = document.createElement('div');
    ReactDOM.render(<Component />, div);
    ReactDOM.unmountComponentAtNode(div);
  });
});
"#,
                ),
            ],
        }
    }
}

const GITIGNORE: &str = "node_modules\ndist\ncoverage\n.DS_Store\n*.log\n.env\n";

const TSCONFIG: &str = r#"{
  "compilerOptions": {
    "target": "es2017",
    "module": "esnext",
    "moduleResolution": "node",
    "jsx": "react",
    "lib": ["dom", "esnext"],
    "strict": true,
    "declaration": true,
    "esModuleInterop": true,
    "skipLibCheck": true,
    "forceConsistentCasingInFileNames": true
  },
  "include": ["src"],
  "exclude": ["node_modules", "dist", "**/__tests__/**"]
}
"#;

/// Scaffold a project from a template
#[derive(Args, Debug)]
pub struct SetupCommand {
    /// Template to scaffold; asked for when omitted
    #[arg(short, long, value_enum)]
    pub template: Option<Template>,
}

impl SetupCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<i32> {
        let template = match self.template {
            Some(template) => template,
            None => prompt_template()?,
        };
        let root = ctx.root();
        let mut errors = 0;

        output::info(format!("Setting up a {} project", template.label().cyan()));

        for (path, contents) in template.files() {
            errors += report_write(root, &root.join(path), contents);
        }

        for (path, contents) in config_files(template, &ctx.project)? {
            errors += report_write(root, &root.join(path), &contents);
        }

        let descriptor = updated_descriptor(ctx.project.descriptor(), template);
        let descriptor = serde_json::to_string_pretty(&descriptor)? + "\n";
        errors += report_write(root, &ctx.project.descriptor_path(), &descriptor);

        let missing = missing_dev_dependencies(&ctx.project, template);
        if !missing.is_empty() && !install_dev_dependencies(ctx, &missing).await {
            errors += 1;
        }

        if init_git(ctx).await {
            output::success(format!("Initialized a git repository in {}", root.display()));
        } else {
            errors += 1;
            output::failure(format!("Failed to initialize a git repository in {}", root.display()));
        }

        if errors == 0 {
            output::success("Setup complete");
            eprintln!();
            eprintln!("  Next steps:");
            eprintln!("    {} npm test", "→".dimmed());
            eprintln!("    {} npm run build", "→".dimmed());
            eprintln!();
            Ok(0)
        } else {
            output::failure(format!("Setup finished with {} error(s)", errors));
            Ok(1)
        }
    }
}

fn prompt_template() -> Result<Template> {
    if !console::user_attended() {
        anyhow::bail!("No template given; pass --template when not running in a terminal");
    }

    let labels: Vec<&str> = Template::ALL.iter().map(|t| t.label()).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Which template should the project start from?")
        .items(&labels)
        .default(0)
        .interact()
        .context("Failed to read the template choice")?;

    Ok(Template::ALL[selection])
}

/// Write one file, creating parent directories. Returns the error count.
fn report_write(root: &Path, path: &Path, contents: &str) -> usize {
    let written = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::write(path, contents));

    match written {
        Ok(()) => {
            output::success(format!("Created {}", display_relative(root, path).cyan()));
            0
        }
        Err(e) => {
            output::failure(format!("Failed to write {}: {}", display_relative(root, path), e));
            1
        }
    }
}

/// Tool configs written into every project.
///
/// The eslintrc carries the whole built-in rule set, React parts included
/// when the template or the project uses React.
fn config_files(template: Template, project: &Project) -> Result<Vec<(&'static str, String)>> {
    let react = template.is_react() || project.has_any_dependency("react");

    let mut files = vec![
        (".gitignore", GITIGNORE.to_string()),
        (".prettierrc.json", serde_json::to_string_pretty(&format::builtin())? + "\n"),
        (".eslintrc.json", serde_json::to_string_pretty(&lint::rules_for(react))? + "\n"),
    ];
    if template.is_typescript() || template.is_react() {
        files.push(("tsconfig.json", TSCONFIG.to_string()));
    }
    Ok(files)
}

/// The descriptor with kiln's entry points, scripts and hooks merged in
pub(crate) fn updated_descriptor(descriptor: &Value, template: Template) -> Value {
    let mut updated: Map<String, Value> = descriptor.as_object().cloned().unwrap_or_default();

    updated.insert("version".to_string(), json!("0.0.0"));
    updated.insert("main".to_string(), json!(bundle::entry_path("dist", OutputFormat::Cjs, "index")));
    updated.insert("module".to_string(), json!(bundle::entry_path("dist", OutputFormat::Esm, "index")));
    if template.is_typescript() {
        updated.insert("typings".to_string(), json!("dist/types/index.d.ts"));
    }
    updated.insert("files".to_string(), json!(["dist"]));

    let mut scripts = updated
        .get("scripts")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let build = format!("kiln build bundler {}", template.entry());
    for (name, command) in [
        ("build", build.as_str()),
        ("lint", "kiln lint"),
        ("format", "kiln format"),
        ("test", "kiln test"),
        ("prepublishOnly", "kiln build bundler --clean"),
    ] {
        scripts.insert(name.to_string(), json!(command));
    }
    if let Some(Value::String(prepublish)) = scripts.get_mut("prepublishOnly") {
        *prepublish = format!("{} {}", prepublish, template.entry());
    }
    updated.insert("scripts".to_string(), Value::Object(scripts));

    if template.is_react() {
        updated.insert(
            "peerDependencies".to_string(),
            json!({ "react": ">=16.8", "react-dom": ">=16.8" }),
        );
    }
    updated.insert(
        "husky".to_string(),
        json!({ "hooks": { "pre-commit": "kiln pre-commit" } }),
    );

    Value::Object(updated)
}

/// Dev dependencies the template needs that the project lacks, sorted
pub(crate) fn missing_dev_dependencies(project: &Project, template: Template) -> Vec<&'static str> {
    let react = template.is_react();
    let ts = template.is_typescript();

    let mut missing: Vec<&'static str> = [
        ((ts || react), "@types/jest"),
        (ts, "typescript"),
        (react, "react"),
        (react, "react-dom"),
        (react, "@types/react"),
        (react, "@types/react-dom"),
    ]
    .into_iter()
    .filter(|(wanted, name)| *wanted && !project.has_any_dependency(name))
    .map(|(_, name)| name)
    .collect();
    missing.sort_unstable();
    missing
}

/// yarn when available, npm otherwise
async fn install_dev_dependencies(ctx: &Context, packages: &[&str]) -> bool {
    let (program, args) = match resolve_bin(ctx.root(), "yarn", None) {
        Ok(yarn) => (yarn, vec!["add", "--dev"]),
        Err(_) => match resolve_bin(ctx.root(), "npm", None) {
            Ok(npm) => (npm, vec!["install", "--save-dev"]),
            Err(e) => {
                output::failure(format!("Failed to install dev dependencies: {}", e));
                return false;
            }
        },
    };

    let invocation = Invocation::new(program, ctx.root())
        .args(args)
        .args(packages.iter().copied())
        .stdio(OutputMode::Inherit);
    match ctx.runner.run(&invocation).await {
        Ok(result) if result.success() => {
            output::success(format!("Installed {}", packages.join(", ")));
            true
        }
        Ok(_) => {
            output::failure("Failed to install dev dependencies");
            false
        }
        Err(e) => {
            output::failure(format!("Failed to install dev dependencies: {:#}", e));
            false
        }
    }
}

async fn init_git(ctx: &Context) -> bool {
    let Ok(git) = resolve_bin(ctx.root(), "git", None) else {
        return false;
    };
    let invocation = Invocation::new(git, ctx.root())
        .args(["init"])
        .stdio(OutputMode::Null);
    matches!(ctx.runner.run(&invocation).await, Ok(result) if result.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigCache, ResolvedConfig, Tool};
    use std::path::PathBuf;

    #[test]
    fn test_descriptor_keeps_existing_fields() {
        let descriptor = json!({
            "name": "widget",
            "scripts": { "start": "node ." }
        });
        let updated = updated_descriptor(&descriptor, Template::Typescript);

        assert_eq!(updated["name"], json!("widget"));
        assert_eq!(updated["scripts"]["start"], json!("node ."));
        assert_eq!(updated["scripts"]["build"], json!("kiln build bundler src/index.ts"));
        assert_eq!(
            updated["scripts"]["prepublishOnly"],
            json!("kiln build bundler --clean src/index.ts")
        );
        assert_eq!(updated["typings"], json!("dist/types/index.d.ts"));
        assert!(updated.get("peerDependencies").is_none());
    }

    #[test]
    fn test_react_templates_declare_peers() {
        let updated = updated_descriptor(&json!({}), Template::ReactJs);
        assert_eq!(updated["peerDependencies"]["react"], json!(">=16.8"));
        assert!(updated.get("typings").is_none());
    }

    #[test]
    fn test_missing_dev_dependencies() {
        let project = Project::from_value(
            PathBuf::from("/nowhere"),
            json!({ "devDependencies": { "react": "^18.0.0", "typescript": "^5.0.0" } }),
        );
        assert_eq!(
            missing_dev_dependencies(&project, Template::ReactTs),
            vec!["@types/jest", "@types/react", "@types/react-dom", "react-dom"]
        );
        assert!(missing_dev_dependencies(&project, Template::Empty).is_empty());
    }

    #[test]
    fn test_descriptor_entries_match_bundle_output() {
        let updated = updated_descriptor(&json!({}), Template::Javascript);
        assert_eq!(updated["main"], json!("dist/cjs/index.cjs.js"));
        assert_eq!(updated["module"], json!("dist/esm/index.es.js"));
    }

    #[test]
    fn test_config_files_embed_lint_rules() {
        let temp = tempfile::tempdir().unwrap();
        let project = Project::from_value(temp.path().to_path_buf(), json!({}));

        let files = config_files(Template::Typescript, &project).unwrap();
        let names: Vec<&str> = files.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec![".gitignore", ".prettierrc.json", ".eslintrc.json", "tsconfig.json"]);

        let eslintrc: Value = serde_json::from_str(&files[2].1).unwrap();
        assert_eq!(eslintrc, lint::builtin(&project));
        assert!(!files[2].1.contains("node_modules"));
    }

    #[test]
    fn test_eslintrc_unaffected_by_later_cache_writes() {
        let temp = tempfile::tempdir().unwrap();
        let cache = ConfigCache::new(temp.path().join("node_modules/.cache/kiln"));
        let plain = Project::from_value(temp.path().to_path_buf(), json!({}));
        let eslintrc = config_files(Template::Javascript, &plain).unwrap()[2].1.clone();

        let with_react = Project::from_value(
            temp.path().to_path_buf(),
            json!({ "dependencies": { "react": "^18.0.0" } }),
        );
        let regenerated = ResolvedConfig::builtin(Tool::Linter, lint::builtin(&with_react), None);
        cache.materialize(&regenerated, "json").unwrap();
        fs::remove_dir_all(temp.path().join("node_modules")).unwrap();

        let parsed: Value = serde_json::from_str(&eslintrc).unwrap();
        assert_eq!(parsed, lint::rules_for(false));
        assert!(parsed["extends"]
            .as_array()
            .unwrap()
            .iter()
            .all(|entry| !entry.as_str().unwrap().starts_with("./")));
    }

    #[test]
    fn test_react_template_gets_react_rules_before_install() {
        let project = Project::from_value(PathBuf::from("/nowhere"), json!({}));
        let files = config_files(Template::ReactTs, &project).unwrap();
        let eslintrc: Value = serde_json::from_str(&files[2].1).unwrap();
        assert_eq!(eslintrc, lint::rules_for(true));
    }
}
