use crate::interval::IntervalSpec;
use crate::queued_command::NewQueuedCommand;
use chrono::{DateTime, Utc};
use cmdq_core::CmdqError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to run: a command path plus predefined arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub target_command_id: Option<i64>,
    pub path: String,
    pub args: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHandler {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub path: String,
    pub args: String,
}

impl NewHandler {
    pub fn new(code: impl Into<String>, path: &str, args: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            name: code.clone(),
            code,
            description: None,
            path: crate::registered_command::canonical_path(path),
            args: args.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerMode {
    OnEvent,
    Scheduled,
}

impl TriggerMode {
    /// Value stored in `handler_triggers.mode`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMode::OnEvent => "Event",
            TriggerMode::Scheduled => "Scheduled",
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerMode {
    type Err = CmdqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Event" | "OnEvent" => Ok(TriggerMode::OnEvent),
            "Scheduled" => Ok(TriggerMode::Scheduled),
            other => Err(CmdqError::Validation(format!("unknown trigger mode '{}'", other))),
        }
    }
}

/// The one thing a trigger reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSource {
    Event(String),
    Interval(IntervalSpec),
}

impl TriggerSource {
    pub fn mode(&self) -> TriggerMode {
        match self {
            TriggerSource::Event(_) => TriggerMode::OnEvent,
            TriggerSource::Interval(_) => TriggerMode::Scheduled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerTrigger {
    pub id: i64,
    pub handler_id: i64,
    pub mode: TriggerMode,
    pub event_type_id: Option<i64>,
    pub interval_expr: Option<String>,
    pub active: bool,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrigger {
    pub handler_id: i64,
    pub source: TriggerSource,
    pub priority: i32,
}

impl NewTrigger {
    pub fn on_event(handler_id: i64, event_type_code: impl Into<String>, priority: i32) -> Self {
        Self {
            handler_id,
            source: TriggerSource::Event(event_type_code.into()),
            priority,
        }
    }

    pub fn scheduled(handler_id: i64, interval: IntervalSpec, priority: i32) -> Self {
        Self {
            handler_id,
            source: TriggerSource::Interval(interval),
            priority,
        }
    }
}

/// An active trigger joined to its active handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerBinding {
    pub trigger_id: i64,
    pub handler_id: i64,
    pub handler_code: String,
    pub path: String,
    pub args: String,
    pub mode: TriggerMode,
    pub event_type_code: Option<String>,
    pub interval_expr: Option<String>,
    pub priority: i32,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl HandlerBinding {
    pub fn queued_command(&self, payload: impl Into<String>) -> NewQueuedCommand {
        NewQueuedCommand::new(&self.path, self.args.clone()).with_payload(payload)
    }

    /// The trigger's interval. A missing or malformed expression falls back
    /// to [`IntervalSpec::DEFAULT`] with a warning.
    pub fn interval(&self) -> IntervalSpec {
        match self.interval_expr.as_deref() {
            Some(expr) => IntervalSpec::parse_or_default(expr),
            None => {
                tracing::warn!(
                    "Trigger {} has no interval, using {}",
                    self.trigger_id,
                    IntervalSpec::DEFAULT
                );
                IntervalSpec::DEFAULT
            }
        }
    }
}
