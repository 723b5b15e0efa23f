//! Supervised external processes
//!
//! A [`ProcessInvocation`] is built per call, handed to a [`CommandRunner`],
//! and dropped once its [`ProcessOutput`] has been classified. Nothing is
//! pooled or reused.

use async_trait::async_trait;
use pf_core::Secret;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Reason recorded when a process fails without writing to stderr.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// A process that could not be run at all, as opposed to one that ran and failed.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    #[error("Lost contact with '{program}': {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

/// One external command: program, arguments, optional stdin script and
/// environment. Environment values are secrets and never printed.
#[derive(Clone)]
pub struct ProcessInvocation {
    program: PathBuf,
    args: Vec<String>,
    stdin_script: Option<String>,
    env: Vec<(String, Secret)>,
}

impl ProcessInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin_script: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Text written to the child's stdin, which is then closed.
    pub fn stdin_script(mut self, script: impl Into<String>) -> Self {
        self.stdin_script = Some(script.into());
        self
    }

    /// Set an environment variable for this child only.
    pub fn env_secret(mut self, key: impl Into<String>, value: Secret) -> Self {
        self.env.push((key.into(), value));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn script(&self) -> Option<&str> {
        self.stdin_script.as_deref()
    }

    pub fn env_keys(&self) -> impl Iterator<Item = &str> {
        self.env.iter().map(|(k, _)| k.as_str())
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Shell-like rendering for logs, e.g. `PGPASSWORD=*** pg_dump --host h`.
    pub fn display_command(&self) -> String {
        let mut parts: Vec<String> = self.env.iter().map(|(k, _)| format!("{}=***", k)).collect();
        parts.push(self.program_name());
        parts.extend(self.args.iter().map(|a| {
            if a.is_empty() || a.contains(char::is_whitespace) {
                format!("'{}'", a)
            } else {
                a.clone()
            }
        }));
        parts.join(" ")
    }
}

impl fmt::Debug for ProcessInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessInvocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("stdin_script", &self.stdin_script.as_ref().map(|s| s.len()))
            .field("env", &self.env_keys().collect::<Vec<_>>())
            .finish()
    }
}

/// How a finished process is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Failed on non-empty stderr or a non-zero exit code (dump and export)
    StderrOrExitCode,
    /// Failed on a non-zero exit code only (restore)
    ExitCodeOnly,
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    /// Classify the run. Returns the failure reason, or `None` on success.
    ///
    /// The reason is the trimmed stderr text, or [`UNKNOWN_ERROR`] when the
    /// process failed without saying why.
    pub fn failure_reason(&self, policy: FailurePolicy) -> Option<String> {
        let stderr = self.stderr.trim();
        let exit_failed = self.exit_code != Some(0);
        let stderr_failed = policy == FailurePolicy::StderrOrExitCode && !stderr.is_empty();

        if !exit_failed && !stderr_failed {
            return None;
        }
        if stderr.is_empty() {
            Some(UNKNOWN_ERROR.to_string())
        } else {
            Some(stderr.to_string())
        }
    }
}

/// Runs invocations. The seam between orchestration and the OS.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &ProcessInvocation) -> Result<ProcessOutput, ProcessError>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &ProcessInvocation) -> Result<ProcessOutput, ProcessError> {
        log::debug!("Running {}", invocation.display_command());

        let mut command = tokio::process::Command::new(invocation.program());
        command
            .args(invocation.arguments())
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.expose())))
            .stdin(if invocation.stdin_script.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| ProcessError::Launch {
            program: invocation.program_name(),
            source,
        })?;

        // Stdin is written concurrently with draining stdout and stderr.
        let writer = match (child.stdin.take(), invocation.stdin_script.clone()) {
            (Some(mut stdin), Some(script)) => Some(tokio::spawn(async move {
                stdin.write_all(script.as_bytes()).await?;
                stdin.shutdown().await
            })),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ProcessError::Io {
                program: invocation.program_name(),
                source,
            })?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    log::warn!(
                        "Failed to write script to {}: {}",
                        invocation.program_name(),
                        e
                    );
                }
                Err(e) => log::warn!("stdin writer task failed: {}", e),
                _ => {}
            }
        }

        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

#[cfg(test)]
#[path = "process_test.rs"]
mod tests;
