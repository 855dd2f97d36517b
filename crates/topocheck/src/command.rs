use std::{process::Stdio, time::Duration};

use tokio::process::Command;

use crate::{
    error::{Error, ExecutionFailure, Result},
    parse::normalize_output,
};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes external command lines and returns their captured output.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn run(&self, command_line: &str) -> Result<String>;
}

/// Runs command lines as child processes, one at a time.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    rewrite_quotes: bool,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
            rewrite_quotes: true,
        }
    }
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Only trim the output, leaving quotes untouched.
    pub fn without_quote_rewrite(mut self) -> Self {
        self.rewrite_quotes = false;
        self
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(&self, command_line: &str) -> Result<String> {
        let words = shlex::split(command_line).unwrap_or_default();
        let Some((program, args)) = words.split_first() else {
            return Err(Error::command(
                command_line,
                ExecutionFailure::InvalidCommandLine,
            ));
        };

        tracing::debug!(command = %command_line, "running command");
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::command(command_line, ExecutionFailure::Launch(e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::command(command_line, ExecutionFailure::TimedOut(self.timeout)))?
            .map_err(|e| Error::command(command_line, ExecutionFailure::Launch(e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::warn!(command = %command_line, status = %output.status, "command failed");
            return Err(Error::command(
                command_line,
                ExecutionFailure::ExitStatus {
                    code: output.status.code(),
                    stderr,
                },
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = if self.rewrite_quotes {
            normalize_output(&stdout)
        } else {
            stdout.trim().to_owned()
        };
        tracing::debug!(command = %command_line, output = %stdout, "command output");
        Ok(stdout)
    }
}
