//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use kiln_lib::cli::Context;
use kiln_lib::config::Settings;
use kiln_lib::env::EnvSnapshot;
use kiln_lib::project::Project;
use kiln_lib::tools::{Invocation, ToolOutput, ToolRunner};
use serde_json::Value;
use tempfile::TempDir;

type Responder = Box<dyn Fn(&Invocation) -> ToolOutput + Send + Sync>;
type Delay = Box<dyn Fn(&Invocation) -> Duration + Send + Sync>;

/// Records every invocation and answers with a canned output
pub struct FakeRunner {
    calls: Mutex<Vec<Invocation>>,
    respond: Responder,
    delay: Option<Delay>,
}

impl FakeRunner {
    pub fn exiting(code: i32) -> Self {
        Self::responding(move |_| ToolOutput {
            code: Some(code),
            ..Default::default()
        })
    }

    pub fn responding(respond: impl Fn(&Invocation) -> ToolOutput + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: impl Fn(&Invocation) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(invocation)).await;
        }
        Ok((self.respond)(invocation))
    }
}

/// A temporary project with the given descriptor and stub executables
pub fn project(descriptor: Value, bins: &[&str]) -> TempDir {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("package.json"), descriptor.to_string()).unwrap();

    let bin_dir = temp.path().join("node_modules/.bin");
    fs::create_dir_all(&bin_dir).unwrap();
    for bin in bins {
        stub_bin(&bin_dir.join(bin));
    }
    temp
}

/// An executable shell stub
pub fn stub_bin(path: &Path) {
    fs::write(path, "#!/bin/sh\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

pub fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

pub fn context(root: &Path, runner: Arc<FakeRunner>) -> Context {
    let project = Project::discover(root).unwrap();
    Context {
        settings: Settings::load(project.root_directory()).unwrap(),
        project: Arc::new(project),
        env: EnvSnapshot::default(),
        runner,
        cwd: root.to_path_buf(),
    }
}

/// Value following `flag` in an argument list
pub fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
