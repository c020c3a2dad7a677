//! Fake system environment shared by the unit tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::env::{ProcessOutput, SystemEnv};
use crate::error::DetectError;

/// Canned reaction to a process invocation
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Output(ProcessOutput),
    NotFound,
    Timeout,
}

impl FakeResponse {
    pub fn exit(code: i32, stdout: &str) -> Self {
        FakeResponse::Output(ProcessOutput {
            exit_code: Some(code),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }
}

/// In-memory [`SystemEnv`] recording every invocation
#[derive(Default)]
pub struct FakeEnv {
    executables: Mutex<HashSet<String>>,
    responses: HashMap<String, FakeResponse>,
    installs: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FakeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` resolvable on the fake PATH
    pub fn with_executable(self, name: &str) -> Self {
        self.executables.lock().unwrap().insert(name.to_string());
        self
    }

    /// React to `command` (program file name plus args, space separated)
    pub fn on(mut self, command: &str, response: FakeResponse) -> Self {
        self.responses.insert(command.to_string(), response);
        self
    }

    /// Running `program` puts `tool` on the fake PATH
    pub fn installs(mut self, program: &str, tool: &str) -> Self {
        self.installs.insert(program.to_string(), tool.to_string());
        self
    }

    /// Every command line run so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn file_name(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

#[async_trait]
impl SystemEnv for FakeEnv {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.executables
            .lock()
            .unwrap()
            .contains(name)
            .then(|| PathBuf::from("/usr/bin").join(name))
    }

    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ProcessOutput, DetectError> {
        let program = file_name(program);
        let line = std::iter::once(program.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line.clone());

        let response = self
            .responses
            .get(&line)
            .or_else(|| self.responses.get(&program))
            .cloned()
            .unwrap_or(FakeResponse::NotFound);

        match response {
            FakeResponse::Output(output) => {
                if let Some(tool) = self.installs.get(&program) {
                    self.executables.lock().unwrap().insert(tool.clone());
                }
                Ok(output)
            }
            FakeResponse::NotFound => Err(DetectError::ToolNotFound(program)),
            FakeResponse::Timeout => Err(DetectError::Timeout {
                what: program,
                after: timeout,
            }),
        }
    }
}
