use crate::handler_registry::HandlerRegistry;
use cmdq_core::{CmdqError, CmdqResult, RuntimeConfig};
use cmdq_domain::OutboxEvent;
use cmdq_persistence::{OutboxStore, WorkQueueStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventProcessorOptions {
    pub poll_interval: Duration,
    pub batch_size: usize,
}

impl Default for EventProcessorOptions {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl EventProcessorOptions {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            poll_interval: config.event_poll_interval(),
            batch_size: config.outbox_batch_size,
        }
    }
}

/// Fans outbox events out to the work queue, one queued command per active
/// event handler, in ascending priority.
///
/// An event is marked processed only after every handler was enqueued. If an
/// enqueue fails the batch stops and the event is retried whole on the next
/// pass, so handlers may see the same event more than once.
pub struct EventProcessor {
    outbox: Arc<dyn OutboxStore>,
    handlers: Arc<HandlerRegistry>,
    queue: Arc<dyn WorkQueueStore>,
    options: EventProcessorOptions,
}

impl EventProcessor {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        handlers: Arc<HandlerRegistry>,
        queue: Arc<dyn WorkQueueStore>,
        options: EventProcessorOptions,
    ) -> CmdqResult<Self> {
        if options.poll_interval.is_zero() || options.batch_size == 0 {
            return Err(CmdqError::Validation(
                "event poll interval and batch size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            outbox,
            handlers,
            queue,
            options,
        })
    }

    /// Processes one batch of pending events and returns how many were
    /// marked processed.
    pub async fn process_batch(&self) -> CmdqResult<usize> {
        let events = self.outbox.fetch_pending(self.options.batch_size).await?;
        for event in &events {
            self.dispatch(event).await?;
        }
        Ok(events.len())
    }

    async fn dispatch(&self, event: &OutboxEvent) -> CmdqResult<()> {
        let bindings = self
            .handlers
            .handlers_for_event(&event.event_type_code)
            .await?;

        if bindings.is_empty() {
            tracing::debug!(
                "No handlers for event {} '{}'",
                event.id,
                event.event_type_code
            );
        }
        for binding in &bindings {
            let id = self
                .queue
                .enqueue(&binding.queued_command(event.payload.clone()))
                .await?;
            tracing::debug!(
                "Event {} -> handler '{}' queued as {}",
                event.id,
                binding.handler_code,
                id
            );
        }

        self.outbox.mark_event_processed(event.id).await
    }

    pub async fn run(&self, shutdown: CancellationToken) -> CmdqResult<()> {
        tracing::info!(
            "Event processor started (batch {}, poll {:?})",
            self.options.batch_size,
            self.options.poll_interval
        );
        let mut wake = self.outbox.subscribe();

        loop {
            let backlog = match self.process_batch().await {
                Ok(count) => count == self.options.batch_size,
                Err(e) => {
                    tracing::error!("Event batch failed, will retry: {}", e);
                    false
                }
            };
            if shutdown.is_cancelled() {
                break;
            }
            if backlog {
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.options.poll_interval) => {}
                _ = next_notification(&mut wake) => {}
            }
        }

        tracing::info!("Event processor stopped");
        Ok(())
    }
}

/// Resolves when the outbox reports an append; never resolves without a
/// notification channel, leaving the poll timer in charge.
async fn next_notification(wake: &mut Option<broadcast::Receiver<i64>>) {
    let closed = match wake {
        Some(rx) => matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ),
        None => true,
    };
    if closed {
        *wake = None;
        std::future::pending::<()>().await;
    }
}
