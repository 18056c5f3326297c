use crate::handler_registry::HandlerRegistry;
use chrono::{DateTime, Utc};
use cmdq_core::{CmdqError, CmdqResult, RuntimeConfig};
use cmdq_domain::{is_due, HandlerBinding};
use cmdq_persistence::WorkQueueStore;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

const SCHEDULED_PAYLOAD: &str = "{}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub poll_interval: Duration,
    pub max_in_flight: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

impl SchedulerOptions {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            poll_interval: config.scheduler_poll_interval(),
            max_in_flight: config.scheduler_max_in_flight,
        }
    }
}

/// Removes a trigger from the in-flight set when its task ends, even if the
/// task panicked.
struct InFlight {
    set: Arc<Mutex<HashSet<i64>>>,
    trigger_id: i64,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set.lock().remove(&self.trigger_id);
    }
}

/// Enqueues commands for fixed-interval triggers that are due.
///
/// Each due trigger is handled by its own task so a slow enqueue does not
/// hold up the others; at most `max_in_flight` tasks do store work at once.
/// A trigger whose previous task is still running is skipped.
pub struct ScheduledTaskCoordinator {
    handlers: Arc<HandlerRegistry>,
    queue: Arc<dyn WorkQueueStore>,
    options: SchedulerOptions,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<i64>>>,
    tasks: Mutex<JoinSet<()>>,
}

impl ScheduledTaskCoordinator {
    pub fn new(
        handlers: Arc<HandlerRegistry>,
        queue: Arc<dyn WorkQueueStore>,
        options: SchedulerOptions,
    ) -> CmdqResult<Self> {
        if options.poll_interval.is_zero() || options.max_in_flight == 0 {
            return Err(CmdqError::Validation(
                "scheduler poll interval and max in-flight must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            handlers,
            queue,
            permits: Arc::new(Semaphore::new(options.max_in_flight)),
            options,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            tasks: Mutex::new(JoinSet::new()),
        })
    }

    /// Evaluates every active scheduled trigger once and launches a task for
    /// each due one. Returns the number of launched tasks.
    pub async fn tick(&self) -> CmdqResult<usize> {
        self.reap();

        let now = Utc::now();
        let bindings = self.handlers.scheduled_handlers().await?;
        let mut launched = 0;

        for binding in bindings {
            let interval = binding.interval();
            if !is_due(binding.last_run_at, &interval, now) {
                continue;
            }
            if !self.in_flight.lock().insert(binding.trigger_id) {
                tracing::debug!("Trigger {} still running, skipped", binding.trigger_id);
                continue;
            }

            let guard = InFlight {
                set: self.in_flight.clone(),
                trigger_id: binding.trigger_id,
            };
            let handlers = self.handlers.clone();
            let queue = self.queue.clone();
            let permits = self.permits.clone();
            self.tasks.lock().spawn(async move {
                let _guard = guard;
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                if let Err(e) = fire(&handlers, queue.as_ref(), &binding, now).await {
                    tracing::error!(
                        "Scheduled handler '{}' (trigger {}) failed: {}",
                        binding.handler_code,
                        binding.trigger_id,
                        e
                    );
                }
            });
            launched += 1;
        }

        if launched > 0 {
            tracing::debug!("Scheduler launched {} due triggers", launched);
        }
        Ok(launched)
    }

    /// Waits for every launched task to finish
    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub async fn run(&self, shutdown: CancellationToken) -> CmdqResult<()> {
        tracing::info!(
            "Scheduler started (poll {:?}, max in flight {})",
            self.options.poll_interval,
            self.options.max_in_flight
        );

        loop {
            if let Err(e) = self.tick().await {
                tracing::error!("Scheduler tick failed: {}", e);
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }

        tracing::info!(
            "Scheduler cancelled, waiting for {} in-flight triggers",
            self.in_flight()
        );
        self.drain().await;
        tracing::info!("Scheduler stopped");
        Ok(())
    }

    fn reap(&self) {
        let mut tasks = self.tasks.lock();
        while let Some(joined) = tasks.try_join_next() {
            log_join(joined);
        }
    }
}

async fn fire(
    handlers: &HandlerRegistry,
    queue: &dyn WorkQueueStore,
    binding: &HandlerBinding,
    at: DateTime<Utc>,
) -> CmdqResult<()> {
    let id = queue
        .enqueue(&binding.queued_command(SCHEDULED_PAYLOAD))
        .await?;
    handlers.record_run(binding.trigger_id, at).await?;
    tracing::debug!(
        "Scheduled handler '{}' queued as {}",
        binding.handler_code,
        id
    );
    Ok(())
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("Scheduled task ended abnormally: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockQueue;
    use cmdq_domain::{CommandDescriptor, IntervalSpec, NewHandler, QueueState};
    use cmdq_persistence::{CommandCatalog, HandlerStore, SqliteStore};
    use tempfile::tempdir;

    async fn seeded(dir: &tempfile::TempDir) -> (Arc<SqliteStore>, Arc<HandlerRegistry>) {
        let store = Arc::new(SqliteStore::new(dir.path().join("cmdq.db")));
        store
            .upsert_command("report daily", &CommandDescriptor::default())
            .await
            .unwrap();
        let registry = Arc::new(HandlerRegistry::new(
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        registry
            .register_handler(&NewHandler::new("daily", "report daily", "--format=csv"))
            .await
            .unwrap();
        (store, registry)
    }

    fn coordinator(
        store: &Arc<SqliteStore>,
        registry: &Arc<HandlerRegistry>,
    ) -> ScheduledTaskCoordinator {
        ScheduledTaskCoordinator::new(
            registry.clone(),
            store.clone(),
            SchedulerOptions {
                poll_interval: Duration::from_millis(20),
                max_in_flight: 4,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_never_run_trigger_fires_once_per_interval() {
        let dir = tempdir().unwrap();
        let (store, registry) = seeded(&dir).await;
        let trigger = registry.scheduled("daily", "01:00:00:00", 0).await.unwrap();
        let scheduler = coordinator(&store, &registry);

        assert_eq!(scheduler.tick().await.unwrap(), 1);
        scheduler.drain().await;

        let queued = store.list(Some(QueueState::Pending), 10).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].path, "report daily");
        assert_eq!(queued[0].args, "--format=csv");
        assert_eq!(queued[0].payload, "{}");

        let triggers = store.triggers_for_handler(trigger.handler_id).await.unwrap();
        assert!(triggers[0].last_run_at.is_some());

        // not due again until a day has passed
        assert_eq!(scheduler.tick().await.unwrap(), 0);
        scheduler.drain().await;
        assert_eq!(store.list(None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_due_after_interval_elapsed() {
        let dir = tempdir().unwrap();
        let (store, registry) = seeded(&dir).await;
        let trigger = registry.scheduled("daily", "00:00:10:00", 0).await.unwrap();
        let scheduler = coordinator(&store, &registry);

        store
            .record_run(trigger.id, Utc::now() - chrono::TimeDelta::minutes(9))
            .await
            .unwrap();
        assert_eq!(scheduler.tick().await.unwrap(), 0);

        store
            .record_run(trigger.id, Utc::now() - chrono::TimeDelta::minutes(10))
            .await
            .unwrap();
        assert_eq!(scheduler.tick().await.unwrap(), 1);
        scheduler.drain().await;
        assert_eq!(store.list(None, 10).await.unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_interval_defaults_to_one_hour() {
        let binding = HandlerBinding {
            trigger_id: 1,
            handler_id: 1,
            handler_code: "daily".to_string(),
            path: "report daily".to_string(),
            args: String::new(),
            mode: cmdq_domain::TriggerMode::Scheduled,
            event_type_code: None,
            interval_expr: Some("bad".to_string()),
            priority: 0,
            last_run_at: Some(Utc::now() - chrono::TimeDelta::minutes(30)),
        };
        let interval = binding.interval();
        assert_eq!(interval, IntervalSpec::DEFAULT);
        assert!(!is_due(binding.last_run_at, &interval, Utc::now()));

        let missing = HandlerBinding {
            interval_expr: None,
            ..binding
        };
        assert_eq!(missing.interval(), IntervalSpec::DEFAULT);
    }

    #[tokio::test]
    async fn test_failing_trigger_does_not_stall_others() {
        let dir = tempdir().unwrap();
        let (store, registry) = seeded(&dir).await;
        registry
            .register_handler(&NewHandler::new("broken", "report daily", "--k=bad"))
            .await
            .unwrap();
        let daily = registry.scheduled("daily", "01:00:00:00", 0).await.unwrap();
        let broken = registry.scheduled("broken", "01:00:00:00", 0).await.unwrap();

        let queued = Arc::new(Mutex::new(Vec::new()));
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let mut queue = MockQueue::new();
        {
            let queued = queued.clone();
            let attempts = attempts.clone();
            queue.expect_enqueue().returning(move |command| {
                attempts.lock().push(command.args.clone());
                if command.args.contains("bad") {
                    return Err(CmdqError::Database("disk full".to_string()));
                }
                let mut queued = queued.lock();
                queued.push(command.args.clone());
                Ok(queued.len() as i64)
            });
        }
        let scheduler = ScheduledTaskCoordinator::new(
            registry.clone(),
            Arc::new(queue),
            SchedulerOptions {
                poll_interval: Duration::from_millis(20),
                max_in_flight: 1,
            },
        )
        .unwrap();

        assert_eq!(scheduler.tick().await.unwrap(), 2);
        scheduler.drain().await;
        assert_eq!(*queued.lock(), vec!["--format=csv".to_string()]);
        assert_eq!(scheduler.in_flight(), 0);

        let daily_run = store.triggers_for_handler(daily.handler_id).await.unwrap();
        assert!(daily_run[0].last_run_at.is_some());
        let broken_run = store.triggers_for_handler(broken.handler_id).await.unwrap();
        assert!(broken_run[0].last_run_at.is_none());

        // only the failed trigger is still due
        assert_eq!(scheduler.tick().await.unwrap(), 1);
        scheduler.drain().await;
        assert_eq!(queued.lock().len(), 1);
        let retried = attempts.lock().iter().filter(|a| a.contains("bad")).count();
        assert_eq!(retried, 2);
    }

    #[tokio::test]
    async fn test_inactive_trigger_is_ignored() {
        let dir = tempdir().unwrap();
        let (store, registry) = seeded(&dir).await;
        let trigger = registry.scheduled("daily", "00:00:00:30", 0).await.unwrap();
        registry.deactivate_trigger(trigger.id).await.unwrap();
        let scheduler = coordinator(&store, &registry);

        assert_eq!(scheduler.tick().await.unwrap(), 0);
        assert!(store.list(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let dir = tempdir().unwrap();
        let (store, registry) = seeded(&dir).await;
        registry.scheduled("daily", "00:01:00:00", 0).await.unwrap();
        let scheduler = coordinator(&store, &registry);

        let token = CancellationToken::new();
        let handle = {
            let token = token.clone();
            tokio::spawn(async move { scheduler.run(token).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(store.list(None, 10).await.unwrap().len(), 1);
    }
}
