use crate::event_processor::{EventProcessor, EventProcessorOptions};
use crate::handler_registry::HandlerRegistry;
use crate::queue_processor::{QueueProcessorOptions, WorkQueueProcessor};
use crate::scheduler::{ScheduledTaskCoordinator, SchedulerOptions};
use cmdq_core::{CmdqError, CmdqResult, RuntimeConfig};
use cmdq_domain::CommandTree;
use cmdq_persistence::{CommandCatalog, EventTypeStore, HandlerStore, OutboxStore, WorkQueueStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The queue processor, event processor and scheduler running side by side,
/// sharing one cancellation token.
pub struct Runtime {
    shutdown: CancellationToken,
    loops: Vec<(&'static str, JoinHandle<CmdqResult<()>>)>,
}

impl Runtime {
    pub fn start(
        queue_processor: WorkQueueProcessor,
        event_processor: EventProcessor,
        scheduler: ScheduledTaskCoordinator,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let loops = vec![
            ("queue processor", {
                let token = shutdown.clone();
                tokio::spawn(async move { queue_processor.run(token).await })
            }),
            ("event processor", {
                let token = shutdown.clone();
                tokio::spawn(async move { event_processor.run(token).await })
            }),
            ("scheduler", {
                let token = shutdown.clone();
                tokio::spawn(async move { scheduler.run(token).await })
            }),
        ];
        tracing::info!("Runtime started");
        Self { shutdown, loops }
    }

    /// Wires all three loops to a single store implementing every contract.
    pub fn with_store<S>(store: Arc<S>, tree: Arc<CommandTree>, config: &RuntimeConfig) -> CmdqResult<Self>
    where
        S: WorkQueueStore + OutboxStore + CommandCatalog + EventTypeStore + HandlerStore + 'static,
    {
        config.validate()?;
        let handlers = Arc::new(HandlerRegistry::new(
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        let queue_processor = WorkQueueProcessor::new(
            store.clone(),
            tree,
            QueueProcessorOptions::from_config(config),
        )?;
        let event_processor = EventProcessor::new(
            store.clone(),
            handlers.clone(),
            store.clone(),
            EventProcessorOptions::from_config(config),
        )?;
        let scheduler =
            ScheduledTaskCoordinator::new(handlers, store, SchedulerOptions::from_config(config))?;
        Ok(Self::start(queue_processor, event_processor, scheduler))
    }

    /// Cancels every loop and waits for their in-flight work
    pub async fn shutdown(self) -> CmdqResult<()> {
        tracing::info!("Runtime shutting down");
        self.shutdown.cancel();
        self.join().await
    }

    /// Waits for the loops to stop after the token was cancelled elsewhere
    pub async fn join(self) -> CmdqResult<()> {
        let mut first_error = None;
        for (name, handle) in self.loops {
            let result = handle
                .await
                .map_err(|e| CmdqError::Internal(format!("{} task failed: {}", name, e)))
                .and_then(|r| r);
            if let Err(e) = result {
                tracing::error!("{} stopped with error: {}", name, e);
                first_error.get_or_insert(e);
            }
        }
        tracing::info!("Runtime stopped");
        first_error.map_or(Ok(()), Err)
    }
}
