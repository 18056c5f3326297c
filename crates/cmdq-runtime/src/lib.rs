pub mod event_processor;
pub mod handler_registry;
pub mod queue_processor;
pub mod registry;
pub mod runtime;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use event_processor::{EventProcessor, EventProcessorOptions};
pub use handler_registry::HandlerRegistry;
pub use queue_processor::{QueueProcessorOptions, WorkQueueProcessor};
pub use registry::CommandRegistry;
pub use runtime::Runtime;
pub use scheduler::{ScheduledTaskCoordinator, SchedulerOptions};
