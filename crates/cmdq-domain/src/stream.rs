use crate::commands::CommandOutcome;
use cmdq_core::{CmdqError, CmdqResult};
use serde::de::DeserializeOwned;

/// Per-invocation channel: carries the input payload in and the last
/// written outcome out.
#[derive(Debug, Clone, Default)]
pub struct CommandStream {
    payload: String,
    outcome: Option<CommandOutcome>,
}

impl CommandStream {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            outcome: None,
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn payload_json<T: DeserializeOwned>(&self) -> CmdqResult<T> {
        serde_json::from_str(&self.payload).map_err(|e| CmdqError::Serialization(e.to_string()))
    }

    pub fn write(&mut self, outcome: CommandOutcome) {
        self.outcome = Some(outcome);
    }

    pub fn succeed(&mut self, output: impl Into<String>) {
        self.write(CommandOutcome::success(output));
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.write(CommandOutcome::failure(error));
    }

    pub fn outcome(&self) -> Option<&CommandOutcome> {
        self.outcome.as_ref()
    }

    pub fn take_outcome(&mut self) -> Option<CommandOutcome> {
        self.outcome.take()
    }
}
