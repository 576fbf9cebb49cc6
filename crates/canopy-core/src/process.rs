//! Child process execution with an enforced deadline.

use std::ffi::OsStr;
use std::process::{Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// How long a `--version` probe may take.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

/// Run `command` to completion, capturing stdout and stderr.
///
/// The child is killed when the deadline passes.
pub async fn run_with_timeout(
    mut command: Command,
    timeout: Duration,
) -> Result<Output, ToolError> {
    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .to_string();
    command.stdin(Stdio::null()).kill_on_drop(true);

    tracing::debug!(program = %program, timeout_secs = timeout.as_secs(), "Running external tool");

    match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(ToolError::Spawn { program, source }),
        Err(_) => Err(ToolError::Timeout { program, timeout }),
    }
}

/// Whether `program args...` runs and exits successfully.
pub async fn probe(program: impl AsRef<OsStr>, args: &[&str]) -> bool {
    let mut command = Command::new(program);
    command.args(args);
    match run_with_timeout(command, PROBE_TIMEOUT).await {
        Ok(output) => output.status.success(),
        Err(err) => {
            tracing::debug!(error = %err, "Tool probe failed");
            false
        }
    }
}

/// Write an executable `sh` script standing in for an external tool.
#[cfg(all(test, unix))]
pub(crate) fn fake_tool(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_output() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo out; echo err >&2"]);
        let output = run_with_timeout(command, Duration::from_secs(10))
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "err");
    }

    #[tokio::test]
    async fn times_out() {
        let mut command = Command::new("sh");
        command.args(["-c", "sleep 5"]);
        let err = run_with_timeout(command, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let command = Command::new("canopy-definitely-not-installed");
        let err = run_with_timeout(command, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
        assert!(!probe("canopy-definitely-not-installed", &["--version"]).await);
    }
}
