use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cmdq_core::CmdqResult;
use cmdq_domain::{
    CommandDescriptor, CommandOutcome, EventType, HandlerBinding, HandlerConfig, HandlerTrigger,
    NewEventType, NewHandler, NewOutboxEvent, NewQueuedCommand, NewTrigger, OutboxEvent,
    QueueState, QueuedCommand, RegisteredCommand,
};
use std::time::Duration;
use tokio::sync::broadcast;

/// Durable catalogue of command paths
#[async_trait]
pub trait CommandCatalog: Send + Sync {
    /// Insert or update the row keyed by `path`, reactivating it
    async fn upsert_command(
        &self,
        path: &str,
        descriptor: &CommandDescriptor,
    ) -> CmdqResult<RegisteredCommand>;

    async fn find_command(&self, path: &str) -> CmdqResult<Option<RegisteredCommand>>;

    async fn active_commands(&self) -> CmdqResult<Vec<RegisteredCommand>>;

    /// Soft-delete; returns false when the path was unknown or already inactive
    async fn deactivate_command(&self, path: &str) -> CmdqResult<bool>;
}

/// Persisted queue of command invocations with lease metadata
///
/// `claim_batch` is the only way rows enter Processing and must be atomic
/// across processes: two concurrent callers never receive the same row
/// while its lease is live.
#[async_trait]
pub trait WorkQueueStore: Send + Sync {
    async fn enqueue(&self, command: &NewQueuedCommand) -> CmdqResult<i64>;

    /// Lease up to `limit` rows: Pending first, then Processing rows whose
    /// lease is older than `lease_timeout`. Results are ordered by id.
    async fn claim_batch(&self, limit: usize, lease_timeout: Duration)
        -> CmdqResult<Vec<QueuedCommand>>;

    /// Record the terminal state of a row claimed with lease `leased_at`.
    /// Fails with `LeaseContention` if the row was reclaimed meanwhile.
    async fn mark_processed(
        &self,
        id: i64,
        leased_at: DateTime<Utc>,
        outcome: &CommandOutcome,
        duration: Duration,
    ) -> CmdqResult<()>;

    /// Move a Failed row back to Pending, keeping its attempt count
    async fn requeue(&self, id: i64) -> CmdqResult<()>;

    async fn get(&self, id: i64) -> CmdqResult<Option<QueuedCommand>>;

    /// Most recent rows first
    async fn list(&self, state: Option<QueueState>, limit: usize)
        -> CmdqResult<Vec<QueuedCommand>>;
}

/// Append-only event log
#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn append_event(&self, event: &NewOutboxEvent) -> CmdqResult<i64>;

    /// Unprocessed events, oldest first. Read-only.
    async fn fetch_pending(&self, limit: usize) -> CmdqResult<Vec<OutboxEvent>>;

    async fn get_event(&self, id: i64) -> CmdqResult<Option<OutboxEvent>>;

    async fn mark_event_processed(&self, id: i64) -> CmdqResult<()>;

    async fn mark_events_processed(&self, ids: &[i64]) -> CmdqResult<()>;

    /// Ids of events appended through this store instance, if supported
    fn subscribe(&self) -> Option<broadcast::Receiver<i64>> {
        None
    }
}

/// Catalogue of event type codes
#[async_trait]
pub trait EventTypeStore: Send + Sync {
    async fn upsert_event_type(&self, event_type: &NewEventType) -> CmdqResult<EventType>;

    async fn find_event_type(&self, code: &str) -> CmdqResult<Option<EventType>>;

    async fn active_event_types(&self) -> CmdqResult<Vec<EventType>>;

    async fn deactivate_event_type(&self, code: &str) -> CmdqResult<bool>;
}

/// Handler configurations and their triggers
#[async_trait]
pub trait HandlerStore: Send + Sync {
    /// Upsert keyed by code; the target command id is looked up by path
    async fn register_handler(&self, handler: &NewHandler) -> CmdqResult<HandlerConfig>;

    async fn find_handler(&self, code: &str) -> CmdqResult<Option<HandlerConfig>>;

    async fn active_handlers(&self) -> CmdqResult<Vec<HandlerConfig>>;

    async fn deactivate_handler(&self, code: &str) -> CmdqResult<bool>;

    /// Upsert on (handler, event type) or (handler, interval)
    async fn add_trigger(&self, trigger: &NewTrigger) -> CmdqResult<HandlerTrigger>;

    async fn deactivate_trigger(&self, trigger_id: i64) -> CmdqResult<bool>;

    async fn triggers_for_handler(&self, handler_id: i64) -> CmdqResult<Vec<HandlerTrigger>>;

    /// Active OnEvent bindings for `event_type_code`, ascending priority
    async fn handlers_for_event(&self, event_type_code: &str) -> CmdqResult<Vec<HandlerBinding>>;

    /// Active Scheduled bindings
    async fn scheduled_handlers(&self) -> CmdqResult<Vec<HandlerBinding>>;

    async fn record_run(&self, trigger_id: i64, at: DateTime<Utc>) -> CmdqResult<()>;
}
