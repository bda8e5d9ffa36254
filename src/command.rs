//! Resilient external command execution.
//!
//! Every packaging and scanning tool this orchestrator drives (curl,
//! dpkg-deb, hab, grype, trivy) is an external process. This module
//! captures their output for classification and offers an optional
//! retry loop built on [`crate::retry`].

use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

use crate::classify;
use crate::retry::{self, RetryAction, RetryConfig};

/// Captured result of one process run.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with status {exit_code}: {stderr}")]
    Failed {
        program: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}

impl CommandError {
    /// Default retry verdict: spawn failures abort (the binary is missing,
    /// not the network), non-zero exits go through the output classifier.
    pub fn default_retry_action(&self) -> RetryAction {
        match self {
            CommandError::Spawn { .. } => RetryAction::Abort,
            CommandError::Failed { stdout, stderr, .. } => {
                if classify::is_retryable_output(stderr, stdout) {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            }
        }
    }
}

/// Run a command once, capturing exit code, stdout, and stderr.
///
/// A non-zero exit is not an error here; callers that care use
/// [`run_checked`] or inspect [`CommandOutput::success`].
pub async fn run(
    program: &str,
    args: &[&str],
    envs: &[(&str, &str)],
) -> Result<CommandOutput, CommandError> {
    let output = Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    Ok(CommandOutput {
        // Signal-terminated processes report no code; treat as generic failure.
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a command once and fail on non-zero exit.
pub async fn run_checked(
    program: &str,
    args: &[&str],
    envs: &[(&str, &str)],
) -> Result<CommandOutput, CommandError> {
    let output = run(program, args, envs).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(CommandError::Failed {
            program: program.to_string(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Run a command with jittered exponential-backoff retry.
///
/// The classifier decides per failure whether another attempt is worth it;
/// [`CommandError::default_retry_action`] is the usual choice. Callers with
/// extra policy (the fallback downloader's strategy escalation) pass their
/// own.
pub async fn run_with_retry<C>(
    program: &str,
    args: &[&str],
    envs: &[(&str, &str)],
    config: &RetryConfig,
    classifier: C,
) -> Result<CommandOutput, CommandError>
where
    C: Fn(&CommandError) -> RetryAction,
{
    retry::retry_with_backoff(config, classifier, || run_checked(program, args, envs)).await
}
