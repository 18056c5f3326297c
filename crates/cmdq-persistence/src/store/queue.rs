use super::sqlite_store::{db_error, from_db_time, from_db_time_opt, to_db_time, SqliteStore};
use crate::traits::WorkQueueStore;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use cmdq_core::{CmdqError, CmdqResult};
use cmdq_domain::{CommandOutcome, NewQueuedCommand, QueueState, QueuedCommand};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::time::Duration;

const QUEUE_COLUMNS: &str = "id, registered_command_id, path, args, payload, created_at, \
    leased_at, completed_at, state, error, output, duration_ms, attempts";

fn row_to_queued(row: &SqliteRow) -> CmdqResult<QueuedCommand> {
    Ok(QueuedCommand {
        id: row.get("id"),
        registered_command_id: row.get("registered_command_id"),
        path: row.get("path"),
        args: row.get("args"),
        payload: row.get("payload"),
        created_at: from_db_time(&row.get::<String, _>("created_at"))?,
        leased_at: from_db_time_opt(row.get("leased_at"))?,
        completed_at: from_db_time_opt(row.get("completed_at"))?,
        state: row.get::<String, _>("state").parse()?,
        error: row.get("error"),
        output: row.get("output"),
        duration_ms: row.get("duration_ms"),
        attempts: row.get("attempts"),
    })
}

#[async_trait]
impl WorkQueueStore for SqliteStore {
    async fn enqueue(&self, command: &NewQueuedCommand) -> CmdqResult<i64> {
        if command.path.trim().is_empty() {
            return Err(CmdqError::EmptyPath);
        }
        let pool = self.get_pool().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO work_queue (registered_command_id, path, args, payload, created_at, state)
             VALUES (
                (SELECT id FROM commands_registered WHERE path = ?1 AND active = 1),
                ?1, ?2, ?3, ?4, 'Pending'
             )
             RETURNING id",
        )
        .bind(&command.path)
        .bind(&command.args)
        .bind(&command.payload)
        .bind(to_db_time(Utc::now()))
        .fetch_one(pool)
        .await
        .map_err(db_error)?;

        tracing::debug!("Enqueued command {} '{}'", id, command.path);
        Ok(id)
    }

    async fn claim_batch(
        &self,
        limit: usize,
        lease_timeout: Duration,
    ) -> CmdqResult<Vec<QueuedCommand>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let pool = self.get_pool().await?;

        let now = Utc::now();
        let timeout = TimeDelta::from_std(lease_timeout)
            .map_err(|e| CmdqError::Validation(format!("lease timeout: {}", e)))?;
        let expired_before = now - timeout;

        // One statement: the selection and the state flip cannot interleave
        // with another claimer.
        let rows = sqlx::query(&format!(
            "UPDATE work_queue
             SET state = 'Processing', leased_at = ?1
             WHERE id IN (
                SELECT id FROM work_queue
                WHERE (state = 'Pending' AND leased_at IS NULL)
                   OR (state = 'Processing' AND leased_at < ?2)
                ORDER BY CASE WHEN state = 'Pending' THEN 0 ELSE 1 END, id
                LIMIT ?3
             )
             RETURNING {}",
            QUEUE_COLUMNS
        ))
        .bind(to_db_time(now))
        .bind(to_db_time(expired_before))
        .bind(limit as i64)
        .fetch_all(pool)
        .await
        .map_err(db_error)?;

        let mut claimed = rows.iter().map(row_to_queued).collect::<CmdqResult<Vec<_>>>()?;
        claimed.sort_by_key(|c| c.id);
        Ok(claimed)
    }

    async fn mark_processed(
        &self,
        id: i64,
        leased_at: DateTime<Utc>,
        outcome: &CommandOutcome,
        duration: Duration,
    ) -> CmdqResult<()> {
        let pool = self.get_pool().await?;
        let state = if outcome.success {
            QueueState::Completed
        } else {
            QueueState::Failed
        };

        let result = sqlx::query(
            "UPDATE work_queue
             SET state = ?1, completed_at = ?2, output = ?3, error = ?4,
                 duration_ms = ?5, attempts = attempts + 1
             WHERE id = ?6 AND state = 'Processing' AND leased_at = ?7",
        )
        .bind(state.as_str())
        .bind(to_db_time(Utc::now()))
        .bind(&outcome.output)
        .bind(&outcome.error)
        .bind(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
        .bind(id)
        .bind(to_db_time(leased_at))
        .execute(pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(CmdqError::LeaseContention(id));
        }
        Ok(())
    }

    async fn requeue(&self, id: i64) -> CmdqResult<()> {
        let pool = self.get_pool().await?;
        let result = sqlx::query(
            "UPDATE work_queue
             SET state = 'Pending', leased_at = NULL, completed_at = NULL,
                 error = NULL, output = NULL, duration_ms = NULL
             WHERE id = ? AND state = 'Failed'",
        )
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }
        match self.get(id).await? {
            None => Err(CmdqError::NotFound(format!("queued command {}", id))),
            Some(row) => Err(CmdqError::Validation(format!(
                "queued command {} is {}, only Failed commands can be retried",
                id, row.state
            ))),
        }
    }

    async fn get(&self, id: i64) -> CmdqResult<Option<QueuedCommand>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!("SELECT {} FROM work_queue WHERE id = ?", QUEUE_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(row_to_queued)
            .transpose()
    }

    async fn list(
        &self,
        state: Option<QueueState>,
        limit: usize,
    ) -> CmdqResult<Vec<QueuedCommand>> {
        let pool = self.get_pool().await?;
        let rows = match state {
            Some(state) => {
                sqlx::query(&format!(
                    "SELECT {} FROM work_queue WHERE state = ? ORDER BY id DESC LIMIT ?",
                    QUEUE_COLUMNS
                ))
                .bind(state.as_str())
                .bind(limit as i64)
                .fetch_all(pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM work_queue ORDER BY id DESC LIMIT ?",
                    QUEUE_COLUMNS
                ))
                .bind(limit as i64)
                .fetch_all(pool)
                .await
            }
        }
        .map_err(db_error)?;

        rows.iter().map(row_to_queued).collect()
    }
}
