use super::sqlite_store::{db_error, from_db_time, from_db_time_opt, to_db_time, SqliteStore};
use crate::traits::OutboxStore;
use async_trait::async_trait;
use chrono::Utc;
use cmdq_core::{CmdqError, CmdqResult};
use cmdq_domain::{NewOutboxEvent, OutboxEvent};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tokio::sync::broadcast;

const OUTBOX_COLUMNS: &str =
    "id, event_type_code, aggregate_id, payload, metadata, created_at, processed_at";

fn row_to_event(row: &SqliteRow) -> CmdqResult<OutboxEvent> {
    Ok(OutboxEvent {
        id: row.get("id"),
        event_type_code: row.get("event_type_code"),
        aggregate_id: row.get("aggregate_id"),
        payload: row.get("payload"),
        metadata: row.get("metadata"),
        created_at: from_db_time(&row.get::<String, _>("created_at"))?,
        processed_at: from_db_time_opt(row.get("processed_at"))?,
    })
}

#[async_trait]
impl OutboxStore for SqliteStore {
    async fn append_event(&self, event: &NewOutboxEvent) -> CmdqResult<i64> {
        if event.event_type_code.trim().is_empty() {
            return Err(CmdqError::Validation("event type code is empty".to_string()));
        }
        let pool = self.get_pool().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO outbox_events (event_type_code, aggregate_id, payload, metadata, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(event.event_type_code.trim())
        .bind(&event.aggregate_id)
        .bind(&event.payload)
        .bind(&event.metadata)
        .bind(to_db_time(Utc::now()))
        .fetch_one(pool)
        .await
        .map_err(db_error)?;

        tracing::debug!("Appended event {} '{}'", id, event.event_type_code);
        self.notify_event(id);
        Ok(id)
    }

    async fn fetch_pending(&self, limit: usize) -> CmdqResult<Vec<OutboxEvent>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "SELECT {} FROM outbox_events
             WHERE processed_at IS NULL
             ORDER BY created_at, id
             LIMIT ?",
            OUTBOX_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(row_to_event)
        .collect()
    }

    async fn get_event(&self, id: i64) -> CmdqResult<Option<OutboxEvent>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!("SELECT {} FROM outbox_events WHERE id = ?", OUTBOX_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(row_to_event)
            .transpose()
    }

    async fn mark_event_processed(&self, id: i64) -> CmdqResult<()> {
        self.mark_events_processed(&[id]).await
    }

    async fn mark_events_processed(&self, ids: &[i64]) -> CmdqResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let pool = self.get_pool().await?;
        let now = to_db_time(Utc::now());

        let mut tx = pool.begin().await.map_err(db_error)?;
        for id in ids {
            sqlx::query(
                "UPDATE outbox_events SET processed_at = ? WHERE id = ? AND processed_at IS NULL",
            )
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<i64>> {
        Some(self.event_sender().subscribe())
    }
}
