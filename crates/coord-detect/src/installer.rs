//! Installation of the Silicon Labs flasher tool
//!
//! Tries the Python packaging front-ends in order of preference and stops at
//! the first one after which the tool can be found on the search path.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ember::FLASHER_TOOL;
use crate::env::SystemEnv;

/// Upper bound for a single installer invocation
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

const PIP_MISSING: &str = "No module named pip";

/// Outcome of an installation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInstallResult {
    pub ok: bool,
    pub tool_name: String,
    pub message: String,
    /// Trimmed output of the last installer that ran
    pub raw_output: Option<String>,
}

/// Installer configuration
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Package name handed to the installers
    pub package: String,
    /// Executable the package provides, by name or by path
    pub executable: String,
    /// Interpreter used for the `-m pip` fallback
    pub python: String,
    pub timeout: Duration,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            package: FLASHER_TOOL.to_string(),
            executable: FLASHER_TOOL.to_string(),
            python: "python3".to_string(),
            timeout: INSTALL_TIMEOUT,
        }
    }
}

/// One way of installing a Python tool
struct InstallStep {
    program: String,
    args: Vec<String>,
    label: &'static str,
}

fn install_steps(config: &InstallerConfig) -> Vec<InstallStep> {
    let tool = config.package.clone();
    vec![
        InstallStep {
            program: "pipx".to_string(),
            args: vec!["install".to_string(), "--force".to_string(), tool.clone()],
            label: "pipx",
        },
        InstallStep {
            program: "uv".to_string(),
            args: vec!["pip".to_string(), "install".to_string(), tool.clone()],
            label: "uv pip",
        },
        InstallStep {
            program: config.python.clone(),
            args: vec!["-m".to_string(), "pip".to_string(), "install".to_string(), tool],
            label: "pip",
        },
    ]
}

/// Install the flasher tool with the default configuration
pub async fn install_flasher<E: SystemEnv + ?Sized>(env: &E) -> ToolInstallResult {
    install_tool(env, &InstallerConfig::default()).await
}

/// Resolve the installed tool: the configured executable, else the
/// package's own entry point on PATH
fn locate_tool<E: SystemEnv + ?Sized>(env: &E, config: &InstallerConfig) -> Option<PathBuf> {
    env.find_executable(&config.executable).or_else(|| {
        (config.executable != config.package)
            .then(|| env.find_executable(&config.package))
            .flatten()
    })
}

/// Install `config.package`, trying pipx, then `uv pip`, then `python -m pip`
///
/// Returns immediately without running anything when the tool is already
/// resolvable. An installer that is not on the search path is skipped. A step
/// only counts as successful if the tool is resolvable afterwards.
pub async fn install_tool<E: SystemEnv + ?Sized>(
    env: &E,
    config: &InstallerConfig,
) -> ToolInstallResult {
    let tool = config.package.as_str();
    let manual_hint = format!("pipx install {}", tool);

    if let Some(path) = locate_tool(env, config) {
        debug!("{} already installed at {}", tool, path.display());
        return ToolInstallResult {
            ok: true,
            tool_name: tool.to_string(),
            message: format!("{} is already installed ({})", tool, path.display()),
            raw_output: None,
        };
    }

    let mut last_message = None;
    let mut last_output = None;

    for step in install_steps(config) {
        let Some(program) = env.find_executable(&step.program) else {
            debug!("{} not available, skipping", step.program);
            continue;
        };
        let program = program.to_string_lossy().into_owned();
        let args: Vec<&str> = step.args.iter().map(String::as_str).collect();

        info!("Installing {} via {}", tool, step.label);
        let output = match env.run(&program, &args, config.timeout).await {
            Ok(output) => {
                let text = output.combined().trim().to_string();
                if output.success() {
                    debug!("{} exited successfully", step.label);
                } else {
                    debug!("{} exited with {:?}", step.label, output.exit_code);
                }
                Some(text)
            }
            Err(e) => {
                warn!("{} install of {} failed: {}", step.label, tool, e);
                last_message = Some(format!("{} install failed: {}", step.label, e));
                last_output = None;
                None
            }
        };

        if locate_tool(env, config).is_some() {
            info!("Installed {} via {}", tool, step.label);
            return ToolInstallResult {
                ok: true,
                tool_name: tool.to_string(),
                message: format!("installed via {}", step.label),
                raw_output: output,
            };
        }

        if let Some(text) = output {
            last_message = Some(if text.contains(PIP_MISSING) {
                format!(
                    "pip is not available for {} (try installing with: {})",
                    step.program, manual_hint
                )
            } else {
                format!("{} could not install {}", step.label, tool)
            });
            last_output = Some(text);
        }
    }

    let message = last_message.unwrap_or_else(|| {
        format!(
            "no installer found (pipx, uv, {}); install it manually: {}",
            config.python, manual_hint
        )
    });
    warn!("Could not install {}: {}", tool, message);

    ToolInstallResult {
        ok: false,
        tool_name: tool.to_string(),
        message,
        raw_output: last_output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeEnv, FakeResponse};

    const PIPX: &str = "pipx install --force universal-silabs-flasher";
    const UV: &str = "uv pip install universal-silabs-flasher";
    const PIP: &str = "python3 -m pip install universal-silabs-flasher";

    #[tokio::test]
    async fn test_already_installed_runs_nothing() {
        let env = FakeEnv::new().with_executable(FLASHER_TOOL).with_executable("pipx");
        let result = install_flasher(&env).await;

        assert!(result.ok);
        assert!(result.message.contains("already installed"));
        assert!(env.calls().is_empty());
    }

    #[tokio::test]
    async fn test_pipx_success() {
        let env = FakeEnv::new()
            .with_executable("pipx")
            .with_executable("uv")
            .on(PIPX, FakeResponse::exit(0, "installed package\n"))
            .installs("pipx", FLASHER_TOOL);
        let result = install_flasher(&env).await;

        assert!(result.ok);
        assert_eq!(result.tool_name, FLASHER_TOOL);
        assert_eq!(result.raw_output.as_deref(), Some("installed package"));
        assert_eq!(env.calls(), vec![PIPX.to_string()]);
    }

    #[tokio::test]
    async fn test_missing_installers_are_skipped() {
        let env = FakeEnv::new()
            .with_executable("python3")
            .on(PIP, FakeResponse::exit(0, "Successfully installed\n"))
            .installs("python3", FLASHER_TOOL);
        let result = install_flasher(&env).await;

        assert!(result.ok);
        assert_eq!(result.message, "installed via pip");
        assert_eq!(env.calls(), vec![PIP.to_string()]);
    }

    #[tokio::test]
    async fn test_exit_code_alone_is_not_success() {
        // uv reports success but the tool lands outside PATH, pip then works
        let env = FakeEnv::new()
            .with_executable("uv")
            .with_executable("python3")
            .on(UV, FakeResponse::exit(0, "Resolved 1 package\n"))
            .on(PIP, FakeResponse::exit(0, "Successfully installed\n"))
            .installs("python3", FLASHER_TOOL);
        let result = install_flasher(&env).await;

        assert!(result.ok);
        assert_eq!(env.calls(), vec![UV.to_string(), PIP.to_string()]);
    }

    #[tokio::test]
    async fn test_failure_continues_down_the_chain() {
        let env = FakeEnv::new()
            .with_executable("pipx")
            .with_executable("uv")
            .on(PIPX, FakeResponse::exit(1, "error: no venv module"))
            .on(UV, FakeResponse::Timeout)
            .on(PIP, FakeResponse::exit(1, "ERROR: no matching distribution"));
        let env = env.with_executable("python3");
        let result = install_flasher(&env).await;

        assert!(!result.ok);
        assert_eq!(env.calls(), vec![PIPX.to_string(), UV.to_string(), PIP.to_string()]);
        assert_eq!(
            result.raw_output.as_deref(),
            Some("ERROR: no matching distribution")
        );
    }

    #[tokio::test]
    async fn test_pip_missing_suggests_pipx() {
        let env = FakeEnv::new().with_executable("python3").on(
            PIP,
            FakeResponse::exit(1, "/usr/bin/python3: No module named pip\n"),
        );
        let result = install_flasher(&env).await;

        assert!(!result.ok);
        assert!(result.message.contains("pipx install universal-silabs-flasher"));
    }

    #[tokio::test]
    async fn test_nothing_available() {
        let env = FakeEnv::new();
        let result = install_flasher(&env).await;

        assert!(!result.ok);
        assert!(result.message.contains("pipx install universal-silabs-flasher"));
        assert!(result.raw_output.is_none());
        assert!(env.calls().is_empty());
    }

    #[tokio::test]
    async fn test_custom_interpreter() {
        let config = InstallerConfig {
            python: "python3.12".to_string(),
            ..InstallerConfig::default()
        };
        let env = FakeEnv::new()
            .with_executable("python3.12")
            .on("python3.12", FakeResponse::exit(0, "ok"))
            .installs("python3.12", FLASHER_TOOL);
        let result = install_tool(&env, &config).await;

        assert!(result.ok);
        assert_eq!(
            env.calls(),
            vec!["python3.12 -m pip install universal-silabs-flasher".to_string()]
        );
    }

    #[tokio::test]
    async fn test_executable_path_is_not_the_package_name() {
        let config = InstallerConfig {
            executable: "/opt/usf/bin/universal-silabs-flasher".to_string(),
            ..InstallerConfig::default()
        };
        let env = FakeEnv::new()
            .with_executable("pipx")
            .on(PIPX, FakeResponse::exit(0, "installed package\n"))
            .installs("pipx", FLASHER_TOOL);
        let result = install_tool(&env, &config).await;

        assert!(result.ok);
        assert_eq!(result.tool_name, FLASHER_TOOL);
        assert_eq!(env.calls(), vec![PIPX.to_string()]);
    }

    #[tokio::test]
    async fn test_configured_executable_counts_as_installed() {
        let config = InstallerConfig {
            executable: "/opt/usf/bin/universal-silabs-flasher".to_string(),
            ..InstallerConfig::default()
        };
        let env = FakeEnv::new()
            .with_executable("/opt/usf/bin/universal-silabs-flasher")
            .with_executable("pipx");
        let result = install_tool(&env, &config).await;

        assert!(result.ok);
        assert!(result.message.contains("/opt/usf/bin/universal-silabs-flasher"));
        assert!(env.calls().is_empty());
    }
}
