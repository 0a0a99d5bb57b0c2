//! Wire-level command and response types.

use std::fmt;

use crate::error::CommandError;

/// One parsed operator command: a name plus whitespace-separated arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Tokenize one input line. Blank lines are a parse error; everything
    /// else splits on runs of whitespace.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut tokens = line.split_whitespace().map(str::to_string);
        let name = tokens.next().ok_or(CommandError::EmptyLine)?;
        Ok(Self {
            name,
            args: tokens.collect(),
        })
    }
}

/// Outcome class of one command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    InvalidArgs,
    Failed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::NotFound => "not-found",
            Status::InvalidArgs => "invalid-args",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reply travelling back over the transport: the status word, then an
/// optional payload, on one line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub payload: String,
}

impl Response {
    pub fn ok(payload: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            payload: payload.into(),
        }
    }

    pub fn not_found(name: &str) -> Self {
        Self {
            status: Status::NotFound,
            payload: format!("command '{name}' not found"),
        }
    }

    pub fn invalid_args(payload: impl Into<String>) -> Self {
        Self {
            status: Status::InvalidArgs,
            payload: payload.into(),
        }
    }

    pub fn failed(payload: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            payload: payload.into(),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_empty() {
            write!(f, "{}", self.status)
        } else {
            write!(f, "{} {}", self.status, self.payload)
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
