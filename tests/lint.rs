//! Lint and format commands against fake tools

mod common;

use std::fs;
use std::sync::Arc;

use clap::Parser;
use common::{arg_after, context, project, write, FakeRunner};
use kiln_lib::Cli;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

#[tokio::test]
async fn test_builtin_config_without_react() {
    let temp = project(json!({ "name": "plain-lib" }), &["eslint"]);
    let runner = Arc::new(FakeRunner::exiting(0));
    let ctx = context(temp.path(), runner.clone());

    let cli = Cli::try_parse_from(["kiln", "lint"]).unwrap();
    let code = cli.run(&ctx).await.unwrap();
    assert_eq!(code, 0);

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    let args = &calls[0].args;
    assert_eq!(calls[0].program_name(), "eslint");
    assert_eq!(arg_after(args, "--ext"), Some(".js,.jsx,.ts,.tsx"));
    assert_eq!(args.last().map(String::as_str), Some("."));
    assert!(arg_after(args, "--cache-location")
        .unwrap()
        .ends_with(".eslintcache"));

    let config_path = arg_after(args, "--config").unwrap();
    let config: Value = serde_json::from_str(&fs::read_to_string(config_path).unwrap()).unwrap();
    let rules = config["rules"].as_object().unwrap();
    assert!(rules.keys().all(|rule| !rule.starts_with("react")));
    assert!(config["plugins"].as_array().unwrap().iter().all(|p| p != "react"));

    let ignore_path = arg_after(args, "--ignore-path").unwrap();
    assert!(fs::read_to_string(ignore_path).unwrap().contains("node_modules"));
}

#[tokio::test]
async fn test_exit_code_follows_linter() {
    let temp = project(json!({ "name": "plain-lib" }), &["eslint"]);
    let ctx = context(temp.path(), Arc::new(FakeRunner::exiting(1)));

    let cli = Cli::try_parse_from(["kiln", "lint", "--no-cache"]).unwrap();
    assert_eq!(cli.run(&ctx).await.unwrap(), 1);
}

#[tokio::test]
async fn test_project_config_is_left_to_the_linter() {
    let temp = project(
        json!({ "name": "custom", "eslintConfig": { "root": true } }),
        &["eslint"],
    );
    let runner = Arc::new(FakeRunner::exiting(0));
    let ctx = context(temp.path(), runner.clone());

    let cli = Cli::try_parse_from(["kiln", "lint", "src/a.ts", "src/b.css", "--", "--fix"]).unwrap();
    cli.run(&ctx).await.unwrap();

    let args = &runner.calls()[0].args;
    assert_eq!(arg_after(args, "--config"), None);
    assert!(args.contains(&"--fix".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("src/a.ts"));
    assert!(!args.contains(&"src/b.css".to_string()));
}

#[tokio::test]
async fn test_typescript_projects_are_type_checked_first() {
    let temp = project(json!({ "name": "typed" }), &["eslint", "tsc"]);
    fs::write(temp.path().join("tsconfig.json"), "{}").unwrap();
    let runner = Arc::new(FakeRunner::exiting(0));
    let ctx = context(temp.path(), runner.clone());

    let cli = Cli::try_parse_from(["kiln", "lint"]).unwrap();
    cli.run(&ctx).await.unwrap();

    let programs: Vec<String> = runner.calls().iter().map(|c| c.program_name()).collect();
    assert_eq!(programs, vec!["tsc".to_string(), "eslint".to_string()]);
    assert_eq!(runner.calls()[0].args, vec!["--noEmit".to_string()]);
}

#[tokio::test]
async fn test_runs_from_the_invocation_directory() {
    let temp = project(json!({ "name": "nested" }), &["eslint"]);
    write(temp.path(), "packages/ui/src/a.js", "export {};\n");
    write(temp.path(), "packages/ui/.eslintrc.custom.json", "{ \"root\": true }\n");
    let runner = Arc::new(FakeRunner::exiting(0));
    let mut ctx = context(temp.path(), runner.clone());
    ctx.cwd = temp.path().join("packages/ui");

    let cli = Cli::try_parse_from(["kiln", "lint", "src/a.js", "--config", ".eslintrc.custom.json"]).unwrap();
    assert_eq!(cli.run(&ctx).await.unwrap(), 0);

    let call = &runner.calls()[0];
    assert_eq!(call.cwd, temp.path().join("packages/ui"));
    assert_eq!(call.args.last().map(String::as_str), Some("src/a.js"));
    assert_eq!(
        arg_after(&call.args, "--config"),
        Some(temp.path().join("packages/ui/.eslintrc.custom.json").display().to_string().as_str())
    );
    assert!(arg_after(&call.args, "--cache-location")
        .unwrap()
        .starts_with(&temp.path().display().to_string()));
}

#[tokio::test]
async fn test_missing_explicit_config_is_relative_to_cwd() {
    let temp = project(json!({ "name": "nested" }), &["eslint"]);
    write(temp.path(), ".eslintrc.custom.json", "{}\n");
    let mut ctx = context(temp.path(), Arc::new(FakeRunner::exiting(0)));
    ctx.cwd = temp.path().join("packages/ui");

    let cli = Cli::try_parse_from(["kiln", "lint", "--config", ".eslintrc.custom.json"]).unwrap();
    assert!(cli.run(&ctx).await.is_err());
}

#[tokio::test]
async fn test_format_resolves_config_from_cwd() {
    let temp = project(json!({ "name": "nested" }), &["prettier"]);
    write(temp.path(), "packages/ui/prettier.custom.json", "{ \"semi\": false }\n");
    let runner = Arc::new(FakeRunner::exiting(0));
    let mut ctx = context(temp.path(), runner.clone());
    ctx.cwd = temp.path().join("packages/ui");

    let cli = Cli::try_parse_from(["kiln", "format", "--config", "prettier.custom.json"]).unwrap();
    assert_eq!(cli.run(&ctx).await.unwrap(), 0);

    let call = &runner.calls()[0];
    assert_eq!(call.cwd, temp.path().join("packages/ui"));
    assert_eq!(
        arg_after(&call.args, "--config"),
        Some(temp.path().join("packages/ui/prettier.custom.json").display().to_string().as_str())
    );
}
