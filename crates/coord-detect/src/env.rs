//! Access to executables and subprocesses
//!
//! Enumeration, the Ember prober and the installer all shell out to other
//! programs. They do it through [`SystemEnv`] so tests can substitute a fake
//! environment and never touch the real system.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::DetectError;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// True if the process exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Executable lookup and process execution
#[async_trait]
pub trait SystemEnv: Send + Sync {
    /// Resolve `name` on the executable search path
    fn find_executable(&self, name: &str) -> Option<PathBuf>;

    /// Run `program` with `args`, capturing output, bounded by `timeout`
    ///
    /// A missing program yields [`DetectError::ToolNotFound`] and an
    /// expired timeout [`DetectError::Timeout`].
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ProcessOutput, DetectError>;
}

#[async_trait]
impl<T: SystemEnv + ?Sized> SystemEnv for Arc<T> {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        (**self).find_executable(name)
    }

    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ProcessOutput, DetectError> {
        (**self).run(program, args, timeout).await
    }
}

#[async_trait]
impl<'a, T: SystemEnv + ?Sized> SystemEnv for &'a T {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        (**self).find_executable(name)
    }

    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ProcessOutput, DetectError> {
        (**self).run(program, args, timeout).await
    }
}

/// The real operating system environment
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEnv;

impl OsEnv {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SystemEnv for OsEnv {
    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        if name.contains(std::path::MAIN_SEPARATOR) {
            let path = PathBuf::from(name);
            return is_executable(&path).then_some(path);
        }

        let search_path = std::env::var_os("PATH")?;
        std::env::split_paths(&search_path)
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }

    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ProcessOutput, DetectError> {
        debug!("Running {} {:?} (timeout {:?})", program, args, timeout);

        let mut command = tokio::process::Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DetectError::ToolNotFound(program.to_string()));
            }
            Ok(Err(e)) => {
                return Err(DetectError::Process {
                    program: program.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(DetectError::Timeout {
                    what: program.to_string(),
                    after: timeout,
                });
            }
        };

        let result = ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        trace!("{} exited with {:?}", program, result.exit_code);
        Ok(result)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output() {
        let output = ProcessOutput {
            exit_code: Some(0),
            stdout: "out\n".to_string(),
            stderr: "err\n".to_string(),
        };
        assert!(output.success());
        assert_eq!(output.combined(), "out\nerr\n");
    }

    #[test]
    fn test_killed_process_is_not_success() {
        let output = ProcessOutput {
            exit_code: None,
            ..Default::default()
        };
        assert!(!output.success());
    }

    #[test]
    fn test_find_executable_missing() {
        assert_eq!(
            OsEnv::new().find_executable("definitely-not-a-real-tool-7f3a"),
            None
        );
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let result = OsEnv::new()
            .run(
                "definitely-not-a-real-tool-7f3a",
                &[],
                Duration::from_secs(1),
            )
            .await;
        assert!(matches!(result, Err(DetectError::ToolNotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out_and_returns_promptly() {
        let started = std::time::Instant::now();
        let result = OsEnv::new()
            .run("sleep", &["10"], Duration::from_millis(200))
            .await;

        assert!(matches!(result, Err(DetectError::Timeout { ref what, .. }) if what == "sleep"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_exit_code() {
        let result = OsEnv::new()
            .run("sh", &["-c", "echo hi; exit 3"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.stdout, "hi\n");
    }
}
