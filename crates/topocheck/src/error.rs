use std::{borrow::Cow, time::Duration};

use thiserror::Error;

use crate::{address::NodeId, compare::Mismatch, parse::Format};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("command `{command}` failed: {reason}")]
    CommandExecution {
        command: String,
        reason: ExecutionFailure,
    },
    #[error("unable to parse {format} output ({reason}): {text:?}")]
    Parse {
        format: Format,
        text: String,
        reason: Cow<'static, str>,
    },
    #[error("topology mismatch: {0}")]
    TopologyMismatch(Box<Mismatch>),
    #[error("network not ready after {}ms, pending nodes: {pending:?} (first cause: {cause})", .waited.as_millis())]
    NotReady {
        waited: Duration,
        pending: Vec<NodeId>,
        /// Why the first pending node was not ready on the last attempt.
        #[source]
        cause: Box<Error>,
    },
    #[error("invalid topology: {0}")]
    InvalidTopology(Cow<'static, str>),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn command(command: impl Into<String>, reason: ExecutionFailure) -> Self {
        Self::CommandExecution {
            command: command.into(),
            reason,
        }
    }

    pub(crate) fn parse(
        format: Format,
        text: impl Into<String>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::Parse {
            format,
            text: text.into(),
            reason: reason.into(),
        }
    }

    /// Exit status of the failed command, if it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandExecution {
                reason: ExecutionFailure::ExitStatus { code, .. },
                ..
            } => *code,
            Self::NotReady { cause, .. } => cause.exit_code(),
            _ => None,
        }
    }
}

impl From<Mismatch> for Error {
    fn from(mismatch: Mismatch) -> Self {
        Self::TopologyMismatch(Box::new(mismatch))
    }
}

#[derive(Debug, Error)]
pub enum ExecutionFailure {
    #[error("command line could not be split into words")]
    InvalidCommandLine,
    #[error("failed to launch: {0}")]
    Launch(std::io::Error),
    #[error("exited with {}{}", display_code(.code), display_stderr(.stderr))]
    ExitStatus { code: Option<i32>, stderr: String },
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_owned(),
    }
}

fn display_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}
