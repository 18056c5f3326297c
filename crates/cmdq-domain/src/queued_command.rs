use crate::command_line::CommandLine;
use crate::registered_command::canonical_path;
use chrono::{DateTime, Utc};
use cmdq_core::{CmdqError, CmdqResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a queue row: Pending -> Processing -> Completed | Failed.
/// Processing rows whose lease expired are claimable again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Pending => "Pending",
            QueueState::Processing => "Processing",
            QueueState::Completed => "Completed",
            QueueState::Failed => "Failed",
        }
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueState {
    type Err = CmdqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(QueueState::Pending),
            "processing" => Ok(QueueState::Processing),
            "completed" => Ok(QueueState::Completed),
            "failed" => Ok(QueueState::Failed),
            other => Err(CmdqError::Validation(format!("unknown queue state '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub id: i64,
    pub registered_command_id: Option<i64>,
    pub path: String,
    pub args: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub leased_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub state: QueueState,
    pub error: Option<String>,
    pub output: Option<String>,
    pub duration_ms: Option<i64>,
    pub attempts: i64,
}

impl QueuedCommand {
    pub fn command_line(&self) -> CmdqResult<CommandLine> {
        CommandLine::from_parts(&self.path, &self.args)
    }
}

/// A command invocation to be enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQueuedCommand {
    pub path: String,
    pub args: String,
    pub payload: String,
}

impl NewQueuedCommand {
    pub fn new(path: &str, args: impl Into<String>) -> Self {
        Self {
            path: canonical_path(path),
            args: args.into(),
            payload: "{}".to_string(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn from_line(line: &CommandLine) -> Self {
        Self::new(&line.path_string(), line.args_string())
    }
}
