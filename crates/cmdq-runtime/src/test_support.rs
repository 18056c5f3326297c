use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cmdq_core::CmdqResult;
use cmdq_domain::{CommandOutcome, NewQueuedCommand, QueueState, QueuedCommand};
use cmdq_persistence::WorkQueueStore;
use mockall::mock;
use std::time::Duration;

mock! {
    pub Queue {}

    #[async_trait]
    impl WorkQueueStore for Queue {
        async fn enqueue(&self, command: &NewQueuedCommand) -> CmdqResult<i64>;
        async fn claim_batch(&self, limit: usize, lease_timeout: Duration) -> CmdqResult<Vec<QueuedCommand>>;
        async fn mark_processed(
            &self,
            id: i64,
            leased_at: DateTime<Utc>,
            outcome: &CommandOutcome,
            duration: Duration,
        ) -> CmdqResult<()>;
        async fn requeue(&self, id: i64) -> CmdqResult<()>;
        async fn get(&self, id: i64) -> CmdqResult<Option<QueuedCommand>>;
        async fn list(&self, state: Option<QueueState>, limit: usize) -> CmdqResult<Vec<QueuedCommand>>;
    }
}
