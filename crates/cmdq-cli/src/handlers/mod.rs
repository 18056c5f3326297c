pub mod command;
pub mod event;
pub mod event_type;
pub mod handler;
pub mod queue;
pub mod serve;
pub mod trigger;
