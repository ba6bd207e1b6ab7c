//! Shell command execution.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use super::{floor_char_boundary, resolve_path, Tool};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_OUTPUT_BYTES: usize = 10_000;

/// Destructive patterns refused outright. Runaway commands are bounded
/// by the timeout instead.
const BLOCKED_COMMANDS: &[(&str, &str)] = &[
    ("rm -rf /", "recursive delete of an absolute path"),
    ("rm -fr /", "recursive delete of an absolute path"),
    ("dd if=/dev/", "raw device access"),
    ("dd of=/dev/", "raw device access"),
    ("> /dev/", "writing to device files"),
    ("mkfs", "formatting filesystems"),
    ("shutdown", "host power control"),
    ("reboot", "host power control"),
];

/// Wrappers stripped before matching so `sudo rm -rf /` is still caught.
const WRAPPER_PREFIXES: &[&str] = &["sudo ", "nohup ", "time ", "nice "];

fn check_blocked(command: &str) -> Result<(), String> {
    let mut cmd = command.trim();
    loop {
        let before = cmd;
        for prefix in WRAPPER_PREFIXES {
            if let Some(rest) = cmd.strip_prefix(prefix) {
                cmd = rest.trim_start();
            }
        }
        if cmd == before {
            break;
        }
    }
    for (pattern, reason) in BLOCKED_COMMANDS {
        if cmd.starts_with(pattern) {
            return Err(format!("Command blocked ({}): {}", reason, pattern));
        }
    }
    Ok(())
}

/// Lossy decode with control characters stripped; mostly-binary output
/// is summarised instead of returned.
fn printable(bytes: &[u8]) -> String {
    let control = bytes
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\n' && b != b'\r' && b != b'\t')
        .count();
    if bytes.len() > 64 && control * 10 > bytes.len() {
        return format!("[binary output, {} bytes]", bytes.len());
    }
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| matches!(c, '\n' | '\r' | '\t') || !c.is_control())
        .collect()
}

/// Run a shell command in the workspace.
pub struct RunCommand;

#[async_trait]
impl Tool for RunCommand {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace. Captures stdout, stderr and the exit code."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command line" },
                "cwd": { "type": "string", "description": "Working directory, relative to the workspace (default: workspace root)" },
                "timeout_secs": { "type": "integer", "description": "Kill the command after this many seconds (default: 60)" }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let command = args["command"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'command' argument"))?;
        if let Err(reason) = check_blocked(command) {
            tracing::warn!(command, "refusing blocked command");
            anyhow::bail!(reason);
        }

        let cwd = args["cwd"]
            .as_str()
            .map(|p| resolve_path(p, workspace))
            .unwrap_or_else(|| workspace.to_path_buf());
        let timeout = Duration::from_secs(
            args["timeout_secs"].as_u64().unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        tracing::debug!(command, cwd = %cwd.display(), "running command");
        let run = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();
        let output = match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => anyhow::bail!("Failed to spawn command: {}", e),
            Err(_) => anyhow::bail!("Command timed out after {} seconds", timeout.as_secs()),
        };

        let stdout = printable(&output.stdout);
        let stderr = printable(&output.stderr);
        let mut report = format!("exit code: {}\n", output.status.code().unwrap_or(-1));
        if !stdout.is_empty() {
            report.push_str("--- stdout ---\n");
            report.push_str(&stdout);
            if !stdout.ends_with('\n') {
                report.push('\n');
            }
        }
        if !stderr.is_empty() {
            report.push_str("--- stderr ---\n");
            report.push_str(&stderr);
        }
        if report.len() > MAX_OUTPUT_BYTES {
            let cut = floor_char_boundary(&report, MAX_OUTPUT_BYTES);
            report.truncate(cut);
            report.push_str("\n[output truncated]");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunCommand
            .execute(json!({"command": "echo hello"}), dir.path())
            .await
            .unwrap();
        assert!(report.starts_with("exit code: 0"));
        assert!(report.contains("--- stdout ---\nhello"));
    }

    #[tokio::test]
    async fn nonzero_exit_and_stderr_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunCommand
            .execute(json!({"command": "echo oops >&2; exit 3"}), dir.path())
            .await
            .unwrap();
        assert!(report.starts_with("exit code: 3"));
        assert!(report.contains("--- stderr ---\noops"));
    }

    #[tokio::test]
    async fn relative_cwd_resolves_in_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/marker.txt"), "x").unwrap();

        let report = RunCommand
            .execute(json!({"command": "ls", "cwd": "sub"}), dir.path())
            .await
            .unwrap();
        assert!(report.contains("marker.txt"));
    }

    #[tokio::test]
    async fn destructive_commands_are_blocked() {
        let dir = tempfile::tempdir().unwrap();
        for cmd in ["rm -rf /", "sudo rm -rf /tmp", "dd if=/dev/sda of=out"] {
            let err = RunCommand
                .execute(json!({"command": cmd}), dir.path())
                .await
                .unwrap_err();
            assert!(err.to_string().contains("Command blocked"), "{}", cmd);
        }
    }

    #[tokio::test]
    async fn long_running_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunCommand
            .execute(json!({"command": "sleep 5", "timeout_secs": 1}), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out after 1 seconds"));
    }

    #[test]
    fn binary_output_is_summarised() {
        let mut bytes = vec![0u8; 200];
        bytes.extend_from_slice(b"tail");
        let text = printable(&bytes);
        assert!(text.starts_with("[binary output"));
        assert_eq!(printable(b"plain\ttext\n"), "plain\ttext\n");
    }
}
