//! Bundler pipeline against a fake bundler

mod common;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use common::{arg_after, context, project, write, FakeRunner};
use kiln_lib::config::Settings;
use kiln_lib::env::{keys, EnvSnapshot, TaskEnv};
use kiln_lib::error::KilnError;
use kiln_lib::pipeline::transpile::{self, TranspileOptions, Transpiler};
use kiln_lib::pipeline::watch::{rebuild, WatchEvent, WatchScope};
use kiln_lib::pipeline::{BuildOutcome, BundleOptions, FormatRequest, OutputFormat, Pipeline};
use kiln_lib::project::Project;
use kiln_lib::tools::{Invocation, ToolOutput};
use kiln_lib::Cli;
use pretty_assertions::assert_eq;
use serde_json::json;

fn env_value<'a>(invocation: &'a Invocation, key: &str) -> Option<&'a str> {
    invocation
        .env
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn options(formats: &str) -> BundleOptions {
    BundleOptions {
        input: "src/index.ts".to_string(),
        formats: FormatRequest::parse_list(formats).unwrap(),
        dir: "dist".to_string(),
        watch: false,
        typescript: false,
        environment: Vec::new(),
        config: None,
        passthrough: vec!["--silent".to_string()],
    }
}

fn pipeline(root: &std::path::Path, runner: Arc<FakeRunner>) -> Pipeline {
    let project = Project::discover(root).unwrap();
    Pipeline::new(Arc::new(project), Settings::default(), runner)
}

#[test]
fn test_plan_follows_requested_formats() {
    let temp = project(json!({ "name": "widget" }), &["rollup"]);
    write(temp.path(), "src/index.ts", "export const a = 1;\n");
    let pipeline = pipeline(temp.path(), Arc::new(FakeRunner::exiting(0)));

    let tasks = pipeline
        .plan(&EnvSnapshot::default(), &options("esm,cjs,umd.min"))
        .unwrap();

    assert_eq!(tasks.len(), 3);
    let labels: Vec<&str> = tasks.iter().map(|t| t.label()).collect();
    assert_eq!(labels, vec!["esm", "cjs", "umd.min"]);
    assert_eq!(tasks[2].request.format, OutputFormat::Umd);
    assert!(tasks[2].request.minify);
    assert!(tasks[2].env.minify);
    assert!(!tasks[0].env.minify);

    // Each task gets its own generated config
    assert_ne!(tasks[0].config_path, tasks[1].config_path);
    assert_ne!(tasks[1].config_path, tasks[2].config_path);
    for task in &tasks {
        assert!(task.config_path.is_file());
    }
}

#[tokio::test]
async fn test_results_keep_request_order_and_failures_stay_isolated() {
    let temp = project(json!({ "name": "widget" }), &["rollup"]);
    write(temp.path(), "src/index.ts", "export const a = 1;\n");

    let runner = Arc::new(
        FakeRunner::responding(|invocation| match env_value(invocation, "BUILD_FORMAT") {
            Some("cjs") => ToolOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: "[!] (plugin babel) SyntaxError: Unexpected token (3:4)\n\
                         src/index.ts (3:4)\n\
                         3:   const = 1;\n"
                    .to_string(),
            },
            _ => ToolOutput {
                code: Some(0),
                ..Default::default()
            },
        })
        // The first task finishes last
        .with_delay(|invocation| match env_value(invocation, "BUILD_FORMAT") {
            Some("esm") => Duration::from_millis(60),
            _ => Duration::from_millis(5),
        }),
    );
    let pipeline = pipeline(temp.path(), runner.clone());
    let options = options("esm,cjs,umd.min");

    let tasks = pipeline.plan(&EnvSnapshot::default(), &options).unwrap();
    let report = pipeline.build(&tasks, &options).await.unwrap();

    let labels: Vec<&str> = report.results.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["esm", "cjs", "umd.min"]);
    assert!(report.results[0].outcome.is_success());
    assert!(report.results[2].outcome.is_success());

    let BuildOutcome::Failed(failure) = &report.results[1].outcome else {
        panic!("cjs should have failed");
    };
    assert_eq!(failure.plugin.as_deref(), Some("babel"));
    assert_eq!(failure.message, "SyntaxError: Unexpected token (3:4)");
    assert!(failure.frame.as_deref().unwrap().contains("const = 1"));

    assert_eq!(report.failed(), 1);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.declarations, None);

    let calls = runner.calls();
    assert_eq!(calls.len(), 3);
    for call in &calls {
        assert_eq!(call.program_name(), "rollup");
        assert!(arg_after(&call.args, "--config").unwrap().ends_with(".mjs"));
        assert_eq!(call.args.last().map(String::as_str), Some("--silent"));
        assert_eq!(env_value(call, "BUILD_BUNDLER"), Some("true"));
        assert_eq!(env_value(call, "KILN_ENV_VERSION"), Some("1"));
    }
    let umd = calls
        .iter()
        .find(|c| env_value(c, "BUILD_FORMAT") == Some("umd"))
        .unwrap();
    assert_eq!(env_value(umd, "BUILD_MINIFY"), Some("true"));
    assert_eq!(env_value(umd, "BUILD_SOURCEMAP"), Some("true"));
    assert_eq!(env_value(umd, "NODE_ENV"), Some("production"));
}

#[tokio::test]
async fn test_missing_bundler_is_fatal() {
    let temp = project(json!({ "name": "widget" }), &[]);
    write(temp.path(), "src/index.ts", "export const a = 1;\n");
    let pipeline = pipeline(temp.path(), Arc::new(FakeRunner::exiting(0))).with_search_path(None);
    let options = options("esm");

    let tasks = pipeline.plan(&EnvSnapshot::default(), &options).unwrap();
    let err = pipeline.run(&tasks, &[]).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KilnError>(),
        Some(KilnError::ToolNotFound(name)) if name == "rollup"
    ));
}

#[tokio::test]
async fn test_typescript_builds_emit_declarations_once() {
    let temp = project(json!({ "name": "widget" }), &["rollup", "tsc"]);
    write(temp.path(), "src/index.ts", "export const a = 1;\n");
    let runner = Arc::new(FakeRunner::exiting(0));
    let pipeline = pipeline(temp.path(), runner.clone());
    let mut options = options("esm,cjs");
    options.typescript = true;

    let tasks = pipeline.plan(&EnvSnapshot::default(), &options).unwrap();
    let report = pipeline.build(&tasks, &options).await.unwrap();
    assert_eq!(report.declarations, Some(true));

    let tsc_calls: Vec<Invocation> = runner
        .calls()
        .into_iter()
        .filter(|c| c.program_name() == "tsc")
        .collect();
    assert_eq!(tsc_calls.len(), 1);
    assert_eq!(arg_after(&tsc_calls[0].args, "--declarationDir"), Some("dist/types"));
}

fn failing_when(marker: &'static str, stderr: &'static str) -> FakeRunner {
    FakeRunner::responding(move |invocation| {
        let failing = invocation.args.iter().any(|a| a == marker)
            || env_value(invocation, "BUILD_FORMAT") == Some(marker);
        ToolOutput {
            code: Some(if failing { 1 } else { 0 }),
            stdout: String::new(),
            stderr: if failing { stderr.to_string() } else { String::new() },
        }
    })
}

#[tokio::test]
async fn test_rebuild_reports_start_and_end() {
    let temp = project(json!({ "name": "widget" }), &["rollup"]);
    write(temp.path(), "src/index.ts", "export const a = 1;\n");
    let pipeline = pipeline(temp.path(), Arc::new(FakeRunner::exiting(0)));
    let mut options = options("esm,cjs");
    options.watch = true;

    let tasks = pipeline.plan(&EnvSnapshot::default(), &options).unwrap();
    assert!(tasks.iter().all(|task| task.env.watch));

    let mut events = Vec::new();
    rebuild(&pipeline, &tasks, &[], &mut |event| events.push(event))
        .await
        .unwrap();

    assert_eq!(events, vec![WatchEvent::Start, WatchEvent::End { bundles: 2 }]);
}

#[tokio::test]
async fn test_rebuild_reports_failures_and_keeps_going() {
    let temp = project(json!({ "name": "widget" }), &["rollup"]);
    write(temp.path(), "src/index.ts", "export const a = 1;\n");
    let runner = Arc::new(failing_when(
        "cjs",
        "[!] (plugin babel) SyntaxError: Unexpected token (1:6)\n1: const = 1;\n",
    ));
    let pipeline = pipeline(temp.path(), runner.clone());
    let options = options("esm,cjs,umd");

    let tasks = pipeline.plan(&EnvSnapshot::default(), &options).unwrap();
    let mut events = Vec::new();
    for _ in 0..2 {
        rebuild(&pipeline, &tasks, &[], &mut |event| events.push(event))
            .await
            .unwrap();
    }

    assert_eq!(events.len(), 6);
    for round in events.chunks(3) {
        assert_eq!(round[0], WatchEvent::Start);
        let WatchEvent::Error { label, failure } = &round[1] else {
            panic!("expected an error event, got {:?}", round[1]);
        };
        assert_eq!(label, "cjs");
        assert_eq!(failure.plugin.as_deref(), Some("babel"));
        assert!(failure.frame.as_deref().unwrap().contains("const = 1"));
        assert_eq!(round[2], WatchEvent::End { bundles: 2 });
    }
    assert_eq!(runner.calls().len(), 6);
}

#[test]
fn test_watch_scope_excludes_prefixed_output() {
    let temp = project(json!({ "name": "widget" }), &["rollup"]);
    write(temp.path(), "packages/src/index.ts", "export const a = 1;\n");
    let pipeline = pipeline(temp.path(), Arc::new(FakeRunner::exiting(0)));
    let mut options = options("esm,cjs");
    options.input = "packages/src/index.ts".to_string();
    options.environment = vec![(keys::FILENAME_PREFIX.to_string(), "packages".to_string())];

    let tasks = pipeline.plan(&EnvSnapshot::default(), &options).unwrap();
    let dirs: Vec<String> = tasks.iter().map(|task| task.output_dir()).collect();
    assert_eq!(dirs, vec!["packages/dist/esm", "packages/dist/cjs"]);

    let scope = WatchScope::new(temp.path(), std::slice::from_ref(&options.input), &dirs).unwrap();
    assert!(scope.matches(&temp.path().join("packages/src/index.ts")));
    assert!(!scope.matches(&temp.path().join("packages/dist/esm/index.es.js")));
}

fn transpile_fixture() -> tempfile::TempDir {
    let temp = project(json!({ "name": "widget" }), &["babel"]);
    for file in ["src/a.js", "src/b.js", "src/c.js"] {
        write(temp.path(), file, "export default 1;\n");
    }
    temp
}

#[tokio::test]
async fn test_transpiler_continues_past_failing_file() {
    let temp = transpile_fixture();
    let runner = Arc::new(failing_when("src/b.js", "SyntaxError: src/b.js: Unexpected token (1:7)\n"));
    let project = Project::discover(temp.path()).unwrap();
    let settings = Settings::default();
    let env = TaskEnv::decode(EnvSnapshot::default().with(keys::NODE_ENV, "production")).unwrap();
    let options = TranspileOptions {
        input: "src/**/*".to_string(),
        out_dir: "dist".to_string(),
        ignore: Vec::new(),
        copy_files: Vec::new(),
    };

    let jobs = transpile::plan(temp.path(), &options).unwrap();
    let (transpiler, _) = Transpiler::new(&project, runner.as_ref(), &env, &settings).unwrap();
    let results = transpiler.run(jobs).await.unwrap();

    let summary: Vec<(String, bool)> = results
        .iter()
        .map(|r| (r.job.source.display().to_string(), r.outcome.is_success()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("src/a.js".to_string(), true),
            ("src/b.js".to_string(), false),
            ("src/c.js".to_string(), true),
        ]
    );
    let BuildOutcome::Failed(failure) = &results[1].outcome else {
        panic!("src/b.js should have failed");
    };
    assert!(failure.message.contains("Unexpected token"));
    assert_eq!(runner.calls().len(), 3);
}

#[tokio::test]
async fn test_build_transpiler_exits_one_on_partial_failure() {
    let temp = transpile_fixture();
    let runner = Arc::new(failing_when("src/b.js", "SyntaxError: Unexpected token\n"));
    let ctx = context(temp.path(), runner.clone());

    let cli = Cli::try_parse_from(["kiln", "build", "transpiler"]).unwrap();
    assert_eq!(cli.run(&ctx).await.unwrap(), 1);
    assert_eq!(runner.calls().len(), 3);

    let clean = Arc::new(FakeRunner::exiting(0));
    let ctx = context(temp.path(), clean);
    let cli = Cli::try_parse_from(["kiln", "build", "transpiler"]).unwrap();
    assert_eq!(cli.run(&ctx).await.unwrap(), 0);
}
