use cmdq_core::{CmdqError, CmdqResult, RuntimeConfig};
use cmdq_domain::{CommandOutcome, CommandStream, CommandTree, QueuedCommand};
use cmdq_persistence::WorkQueueStore;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueProcessorOptions {
    pub poll_interval: Duration,
    pub max_parallelism: usize,
    pub batch_size: usize,
    pub lease_timeout: Duration,
}

impl Default for QueueProcessorOptions {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl QueueProcessorOptions {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            poll_interval: config.queue_poll_interval(),
            max_parallelism: config.max_parallelism,
            batch_size: config.queue_batch_size,
            lease_timeout: config.lease_timeout(),
        }
    }

    fn validate(&self) -> CmdqResult<()> {
        if self.poll_interval.is_zero() {
            return Err(CmdqError::Validation(
                "queue poll interval must be greater than zero".to_string(),
            ));
        }
        if self.max_parallelism == 0 {
            return Err(CmdqError::Validation(
                "max parallelism must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(CmdqError::Validation(
                "queue batch size must be greater than zero".to_string(),
            ));
        }
        if self.lease_timeout.is_zero() {
            return Err(CmdqError::Validation(
                "lease timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Leases queued commands and runs them through the command tree with
/// bounded concurrency.
///
/// Execution errors never escape a task: they are written back as a Failed
/// row. A cancelled processor stops claiming and waits for running tasks.
pub struct WorkQueueProcessor {
    store: Arc<dyn WorkQueueStore>,
    tree: Arc<CommandTree>,
    options: QueueProcessorOptions,
    instance_id: Uuid,
}

impl WorkQueueProcessor {
    pub fn new(
        store: Arc<dyn WorkQueueStore>,
        tree: Arc<CommandTree>,
        options: QueueProcessorOptions,
    ) -> CmdqResult<Self> {
        options.validate()?;
        Ok(Self {
            store,
            tree,
            options,
            instance_id: Uuid::new_v4(),
        })
    }

    pub async fn run(&self, shutdown: CancellationToken) -> CmdqResult<()> {
        tracing::info!(
            "Queue processor {} started (parallelism {}, batch {}, poll {:?}, lease {:?})",
            self.instance_id,
            self.options.max_parallelism,
            self.options.batch_size,
            self.options.poll_interval,
            self.options.lease_timeout
        );

        let mut in_flight = JoinSet::new();
        loop {
            while let Some(joined) = in_flight.try_join_next() {
                log_join(joined);
            }

            let slots = self.options.max_parallelism.saturating_sub(in_flight.len());
            if slots > 0 {
                match self
                    .store
                    .claim_batch(slots.min(self.options.batch_size), self.options.lease_timeout)
                    .await
                {
                    Ok(claimed) => {
                        if !claimed.is_empty() {
                            tracing::debug!("Claimed {} queued commands", claimed.len());
                        }
                        for command in claimed {
                            in_flight.spawn(execute_claimed(
                                self.store.clone(),
                                self.tree.clone(),
                                command,
                            ));
                        }
                    }
                    Err(e) => tracing::error!("Failed to claim queued commands: {}", e),
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.options.poll_interval) => {}
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => log_join(joined),
            }
        }

        tracing::info!(
            "Queue processor {} cancelled, waiting for {} in-flight commands",
            self.instance_id,
            in_flight.len()
        );
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        tracing::info!("Queue processor {} stopped", self.instance_id);
        Ok(())
    }

    /// Claims one batch, runs it to completion and returns how many commands
    /// were processed.
    pub async fn process_batch(&self) -> CmdqResult<usize> {
        let limit = self.options.max_parallelism.min(self.options.batch_size);
        let claimed = self
            .store
            .claim_batch(limit, self.options.lease_timeout)
            .await?;
        let count = claimed.len();

        let mut tasks = JoinSet::new();
        for command in claimed {
            tasks.spawn(execute_claimed(self.store.clone(), self.tree.clone(), command));
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        Ok(count)
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("Queue task ended abnormally: {}", e);
    }
}

async fn execute_claimed(
    store: Arc<dyn WorkQueueStore>,
    tree: Arc<CommandTree>,
    command: QueuedCommand,
) {
    let Some(leased_at) = command.leased_at else {
        tracing::error!("Queued command {} was claimed without a lease", command.id);
        return;
    };

    let started = Instant::now();
    let outcome = match AssertUnwindSafe(run_command(&tree, &command))
        .catch_unwind()
        .await
    {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => CommandOutcome::failure(e.to_string()),
        Err(_) => CommandOutcome::failure(format!("command '{}' panicked", command.path)),
    };
    let duration = started.elapsed();

    if !outcome.success {
        tracing::debug!(
            "Queued command {} '{}' failed: {}",
            command.id,
            command.path,
            outcome.error.as_deref().unwrap_or_default()
        );
    }

    match store
        .mark_processed(command.id, leased_at, &outcome, duration)
        .await
    {
        Ok(()) => tracing::debug!(
            "Queued command {} finished in {:?} (success: {})",
            command.id,
            duration,
            outcome.success
        ),
        Err(CmdqError::LeaseContention(id)) => {
            tracing::warn!("Lease on queued command {} expired before completion", id)
        }
        Err(e) => tracing::error!("Failed to record result of command {}: {}", command.id, e),
    }
}

async fn run_command(tree: &CommandTree, command: &QueuedCommand) -> CmdqResult<CommandOutcome> {
    let line = command.command_line()?;
    let handler = tree.resolve(&line)?;
    let mut stream = CommandStream::new(command.payload.clone());
    handler.execute(&mut stream).await?;
    Ok(stream
        .take_outcome()
        .unwrap_or_else(|| CommandOutcome::failure("command finished without writing a result")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cmdq_domain::{ArgSet, Command, FromArgs, NewQueuedCommand, Node, QueueState};
    use cmdq_persistence::SqliteStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct Pay;

    impl FromArgs for Pay {
        fn from_args(args: &ArgSet) -> CmdqResult<Self> {
            args.required::<i64>("orderId")?;
            Ok(Pay)
        }
    }

    #[async_trait]
    impl Command for Pay {
        async fn execute(&self, stream: &mut CommandStream) -> CmdqResult<()> {
            stream.succeed("ok");
            Ok(())
        }
    }

    struct Silent;

    #[async_trait]
    impl Command for Silent {
        async fn execute(&self, _stream: &mut CommandStream) -> CmdqResult<()> {
            Ok(())
        }
    }

    struct Explode;

    #[async_trait]
    impl Command for Explode {
        async fn execute(&self, _stream: &mut CommandStream) -> CmdqResult<()> {
            Err(CmdqError::Execution("card declined".to_string()))
        }
    }

    fn tree() -> Arc<CommandTree> {
        let mut tree = CommandTree::new();
        tree.mount(&["orden", "pagar"], Node::typed::<Pay>()).unwrap();
        tree.mount(
            &["silent"],
            Node::with_factory(|_| Ok(Box::new(Silent) as Box<dyn Command>)),
        )
        .unwrap();
        tree.mount(
            &["explode"],
            Node::with_factory(|_| Ok(Box::new(Explode) as Box<dyn Command>)),
        )
        .unwrap();
        Arc::new(tree)
    }

    fn options() -> QueueProcessorOptions {
        QueueProcessorOptions {
            poll_interval: Duration::from_millis(20),
            ..QueueProcessorOptions::default()
        }
    }

    #[test]
    fn test_new_rejects_zero_options() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SqliteStore::new(dir.path().join("cmdq.db")));

        let zero_parallelism = QueueProcessorOptions {
            max_parallelism: 0,
            ..options()
        };
        assert!(matches!(
            WorkQueueProcessor::new(store.clone(), tree(), zero_parallelism),
            Err(CmdqError::Validation(_))
        ));

        let zero_poll = QueueProcessorOptions {
            poll_interval: Duration::ZERO,
            ..options()
        };
        assert!(WorkQueueProcessor::new(store, tree(), zero_poll).is_err());
    }

    #[tokio::test]
    async fn test_registered_command_completes_with_output() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SqliteStore::new(dir.path().join("cmdq.db")));
        let id = store
            .enqueue(&NewQueuedCommand::new("orden pagar", "--orderId=5"))
            .await
            .unwrap();

        let processor = WorkQueueProcessor::new(store.clone(), tree(), options()).unwrap();
        assert_eq!(processor.process_batch().await.unwrap(), 1);

        let row = store.get(id).await.unwrap().unwrap();
        assert_eq!(row.state, QueueState::Completed);
        assert_eq!(row.output.as_deref(), Some("ok"));
        assert_eq!(row.attempts, 1);
        assert!(row.duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_failures_are_recorded_not_raised() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SqliteStore::new(dir.path().join("cmdq.db")));
        let unknown = store
            .enqueue(&NewQueuedCommand::new("orden borrar", ""))
            .await
            .unwrap();
        let bad_args = store
            .enqueue(&NewQueuedCommand::new("orden pagar", ""))
            .await
            .unwrap();
        let silent = store.enqueue(&NewQueuedCommand::new("silent", "")).await.unwrap();
        let explode = store.enqueue(&NewQueuedCommand::new("explode", "")).await.unwrap();

        let processor = WorkQueueProcessor::new(store.clone(), tree(), options()).unwrap();
        assert_eq!(processor.process_batch().await.unwrap(), 4);

        let error_of = |row: QueuedCommand| {
            assert_eq!(row.state, QueueState::Failed);
            row.error.unwrap_or_default()
        };
        assert!(error_of(store.get(unknown).await.unwrap().unwrap()).contains("orden borrar"));
        assert!(error_of(store.get(bad_args).await.unwrap().unwrap()).contains("orderId"));
        assert!(error_of(store.get(silent).await.unwrap().unwrap()).contains("without"));
        assert!(error_of(store.get(explode).await.unwrap().unwrap()).contains("card declined"));
    }

    #[tokio::test]
    async fn test_run_drains_queue_and_stops_on_cancel() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SqliteStore::new(dir.path().join("cmdq.db")));
        for i in 0..10 {
            store
                .enqueue(&NewQueuedCommand::new("orden pagar", format!("--orderId={}", i)))
                .await
                .unwrap();
        }

        let processor = WorkQueueProcessor::new(store.clone(), tree(), options()).unwrap();
        let token = CancellationToken::new();
        let handle = {
            let token = token.clone();
            tokio::spawn(async move { processor.run(token).await })
        };

        for _ in 0..100 {
            if store.list(Some(QueueState::Completed), 20).await.unwrap().len() == 10 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        token.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(store.list(Some(QueueState::Completed), 20).await.unwrap().len(), 10);
    }

    struct Slow {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Command for Slow {
        async fn execute(&self, stream: &mut CommandStream) -> CmdqResult<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            stream.succeed("done");
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallelism_is_bounded_and_cancel_waits_for_running_work() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SqliteStore::new(dir.path().join("cmdq.db")));
        for _ in 0..8 {
            store.enqueue(&NewQueuedCommand::new("slow", "")).await.unwrap();
        }

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut tree = CommandTree::new();
        {
            let (running, peak) = (running.clone(), peak.clone());
            tree.mount(
                &["slow"],
                Node::with_factory(move |_| {
                    Ok(Box::new(Slow {
                        running: running.clone(),
                        peak: peak.clone(),
                    }) as Box<dyn Command>)
                }),
            )
            .unwrap();
        }

        let processor = WorkQueueProcessor::new(
            store.clone(),
            Arc::new(tree),
            QueueProcessorOptions {
                max_parallelism: 2,
                ..options()
            },
        )
        .unwrap();
        let token = CancellationToken::new();
        let handle = {
            let token = token.clone();
            tokio::spawn(async move { processor.run(token).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        handle.await.unwrap().unwrap();

        // nothing started was left running or stuck in Processing
        assert_eq!(running.load(Ordering::SeqCst), 0);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(store
            .list(Some(QueueState::Processing), 20)
            .await
            .unwrap()
            .is_empty());
        assert!(!store
            .list(Some(QueueState::Completed), 20)
            .await
            .unwrap()
            .is_empty());
    }
}
