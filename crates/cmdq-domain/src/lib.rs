pub mod args;
pub mod command_line;
pub mod commands;
pub mod event_type;
pub mod handler;
pub mod interval;
pub mod outbox_event;
pub mod queued_command;
pub mod registered_command;
pub mod stream;
pub mod tree;

pub use args::{ArgSet, FromArgs, Prepare};
pub use command_line::CommandLine;
pub use commands::{hook, Command, CommandOutcome, Hook};
pub use event_type::{EventType, NewEventType};
pub use handler::{
    HandlerBinding, HandlerConfig, HandlerTrigger, NewHandler, NewTrigger, TriggerMode,
    TriggerSource,
};
pub use interval::{is_due, IntervalSpec};
pub use outbox_event::{NewOutboxEvent, OutboxEvent};
pub use queued_command::{NewQueuedCommand, QueueState, QueuedCommand};
pub use registered_command::{canonical_path, CommandDescriptor, RegisteredCommand};
pub use stream::CommandStream;
pub use tree::{CommandTree, Factory, Node};
