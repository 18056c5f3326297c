use super::sqlite_store::{db_error, from_db_time, from_db_time_opt, to_db_time, SqliteStore};
use crate::traits::{EventTypeStore, HandlerStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cmdq_core::{CmdqError, CmdqResult};
use cmdq_domain::{
    canonical_path, HandlerBinding, HandlerConfig, HandlerTrigger, NewHandler, NewTrigger,
    TriggerSource,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const HANDLER_COLUMNS: &str =
    "id, code, name, description, target_command_id, path, args, active, created_at";
const TRIGGER_COLUMNS: &str =
    "id, handler_id, mode, event_type_id, interval_expr, active, priority, created_at, last_run_at";
const BINDING_SELECT: &str = "SELECT t.id AS trigger_id, h.id AS handler_id,
        h.code AS handler_code, h.path, h.args, t.mode, e.code AS event_type_code,
        t.interval_expr, t.priority, t.last_run_at
     FROM handler_triggers t
     JOIN handlers h ON h.id = t.handler_id
     LEFT JOIN event_types e ON e.id = t.event_type_id
     WHERE t.active = 1 AND h.active = 1";

fn row_to_handler(row: &SqliteRow) -> CmdqResult<HandlerConfig> {
    Ok(HandlerConfig {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        description: row.get("description"),
        target_command_id: row.get("target_command_id"),
        path: row.get("path"),
        args: row.get("args"),
        active: row.get("active"),
        created_at: from_db_time(&row.get::<String, _>("created_at"))?,
    })
}

fn row_to_trigger(row: &SqliteRow) -> CmdqResult<HandlerTrigger> {
    Ok(HandlerTrigger {
        id: row.get("id"),
        handler_id: row.get("handler_id"),
        mode: row.get::<String, _>("mode").parse()?,
        event_type_id: row.get("event_type_id"),
        interval_expr: row.get("interval_expr"),
        active: row.get("active"),
        priority: row.get("priority"),
        created_at: from_db_time(&row.get::<String, _>("created_at"))?,
        last_run_at: from_db_time_opt(row.get("last_run_at"))?,
    })
}

fn row_to_binding(row: &SqliteRow) -> CmdqResult<HandlerBinding> {
    Ok(HandlerBinding {
        trigger_id: row.get("trigger_id"),
        handler_id: row.get("handler_id"),
        handler_code: row.get("handler_code"),
        path: row.get("path"),
        args: row.get("args"),
        mode: row.get::<String, _>("mode").parse()?,
        event_type_code: row.get("event_type_code"),
        interval_expr: row.get("interval_expr"),
        priority: row.get("priority"),
        last_run_at: from_db_time_opt(row.get("last_run_at"))?,
    })
}

#[async_trait]
impl HandlerStore for SqliteStore {
    async fn register_handler(&self, handler: &NewHandler) -> CmdqResult<HandlerConfig> {
        if handler.code.trim().is_empty() {
            return Err(CmdqError::Validation("handler code is empty".to_string()));
        }
        let path = canonical_path(&handler.path);
        if path.is_empty() {
            return Err(CmdqError::EmptyPath);
        }
        let pool = self.get_pool().await?;

        let row = sqlx::query(&format!(
            "INSERT INTO handlers (code, name, description, target_command_id, path, args, active, created_at)
             VALUES (
                ?1, ?2, ?3,
                (SELECT id FROM commands_registered WHERE path = ?4 AND active = 1),
                ?4, ?5, 1, ?6
             )
             ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                target_command_id = excluded.target_command_id,
                path = excluded.path,
                args = excluded.args,
                active = 1
             RETURNING {}",
            HANDLER_COLUMNS
        ))
        .bind(handler.code.trim())
        .bind(&handler.name)
        .bind(&handler.description)
        .bind(&path)
        .bind(&handler.args)
        .bind(to_db_time(Utc::now()))
        .fetch_one(pool)
        .await
        .map_err(db_error)?;

        row_to_handler(&row)
    }

    async fn find_handler(&self, code: &str) -> CmdqResult<Option<HandlerConfig>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!("SELECT {} FROM handlers WHERE code = ?", HANDLER_COLUMNS))
            .bind(code)
            .fetch_optional(pool)
            .await
            .map_err(db_error)?
            .as_ref()
            .map(row_to_handler)
            .transpose()
    }

    async fn active_handlers(&self) -> CmdqResult<Vec<HandlerConfig>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "SELECT {} FROM handlers WHERE active = 1 ORDER BY code",
            HANDLER_COLUMNS
        ))
        .fetch_all(pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(row_to_handler)
        .collect()
    }

    async fn deactivate_handler(&self, code: &str) -> CmdqResult<bool> {
        let pool = self.get_pool().await?;
        let result = sqlx::query("UPDATE handlers SET active = 0 WHERE code = ? AND active = 1")
            .bind(code)
            .execute(pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_trigger(&self, trigger: &NewTrigger) -> CmdqResult<HandlerTrigger> {
        let pool = self.get_pool().await?;

        let handler_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM handlers WHERE id = ?")
            .bind(trigger.handler_id)
            .fetch_optional(pool)
            .await
            .map_err(db_error)?;
        if handler_exists.is_none() {
            return Err(CmdqError::NotFound(format!("handler {}", trigger.handler_id)));
        }

        let now = to_db_time(Utc::now());
        let row = match &trigger.source {
            TriggerSource::Event(code) => {
                let event_type = self
                    .find_event_type(code)
                    .await?
                    .ok_or_else(|| CmdqError::NotFound(format!("event type {}", code)))?;
                sqlx::query(&format!(
                    "INSERT INTO handler_triggers (handler_id, mode, event_type_id, priority, created_at)
                     VALUES (?1, ?5, ?2, ?3, ?4)
                     ON CONFLICT(handler_id, event_type_id) DO UPDATE SET
                        priority = excluded.priority,
                        active = 1
                     RETURNING {}",
                    TRIGGER_COLUMNS
                ))
                .bind(trigger.handler_id)
                .bind(event_type.id)
                .bind(trigger.priority)
                .bind(&now)
                .bind(trigger.source.mode().as_str())
                .fetch_one(pool)
                .await
            }
            TriggerSource::Interval(interval) => {
                sqlx::query(&format!(
                    "INSERT INTO handler_triggers (handler_id, mode, interval_expr, priority, created_at)
                     VALUES (?1, ?5, ?2, ?3, ?4)
                     ON CONFLICT(handler_id, interval_expr) DO UPDATE SET
                        priority = excluded.priority,
                        active = 1
                     RETURNING {}",
                    TRIGGER_COLUMNS
                ))
                .bind(trigger.handler_id)
                .bind(interval.to_string())
                .bind(trigger.priority)
                .bind(&now)
                .bind(trigger.source.mode().as_str())
                .fetch_one(pool)
                .await
            }
        }
        .map_err(db_error)?;

        row_to_trigger(&row)
    }

    async fn deactivate_trigger(&self, trigger_id: i64) -> CmdqResult<bool> {
        let pool = self.get_pool().await?;
        let result =
            sqlx::query("UPDATE handler_triggers SET active = 0 WHERE id = ? AND active = 1")
                .bind(trigger_id)
                .execute(pool)
                .await
                .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn triggers_for_handler(&self, handler_id: i64) -> CmdqResult<Vec<HandlerTrigger>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "SELECT {} FROM handler_triggers WHERE handler_id = ? ORDER BY priority, id",
            TRIGGER_COLUMNS
        ))
        .bind(handler_id)
        .fetch_all(pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(row_to_trigger)
        .collect()
    }

    async fn handlers_for_event(&self, event_type_code: &str) -> CmdqResult<Vec<HandlerBinding>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "{} AND t.mode = 'Event' AND e.active = 1 AND e.code = ?
             ORDER BY t.priority, t.id",
            BINDING_SELECT
        ))
        .bind(event_type_code)
        .fetch_all(pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(row_to_binding)
        .collect()
    }

    async fn scheduled_handlers(&self) -> CmdqResult<Vec<HandlerBinding>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "{} AND t.mode = 'Scheduled' ORDER BY t.priority, t.id",
            BINDING_SELECT
        ))
        .fetch_all(pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(row_to_binding)
        .collect()
    }

    async fn record_run(&self, trigger_id: i64, at: DateTime<Utc>) -> CmdqResult<()> {
        let pool = self.get_pool().await?;
        let result = sqlx::query("UPDATE handler_triggers SET last_run_at = ? WHERE id = ?")
            .bind(to_db_time(at))
            .bind(trigger_id)
            .execute(pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(CmdqError::NotFound(format!("trigger {}", trigger_id)));
        }
        Ok(())
    }
}
