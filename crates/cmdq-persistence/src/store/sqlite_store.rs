use crate::traits::{CommandCatalog, EventTypeStore};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use cmdq_core::{CmdqError, CmdqResult};
use cmdq_domain::{canonical_path, CommandDescriptor, EventType, NewEventType, RegisteredCommand};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::broadcast;

const SCHEMA: &str = include_str!("../../schema.sql");
const EVENT_CHANNEL_CAPACITY: usize = 256;

pub(crate) const COMMAND_COLUMNS: &str = "id, path, description, param_schema, active, created_at";
pub(crate) const EVENT_TYPE_COLUMNS: &str = "id, code, name, description, active, created_at";

/// SQLite-backed implementation of every store trait.
///
/// The pool is opened lazily and the schema applied on first use. Several
/// `SqliteStore` values (or processes) may share one database file; the
/// queue claim is a single statement so they never lease the same row.
pub struct SqliteStore {
    path: PathBuf,
    pool: tokio::sync::OnceCell<Pool<Sqlite>>,
    events: broadcast::Sender<i64>,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            path: path.as_ref().to_path_buf(),
            pool: tokio::sync::OnceCell::new(),
            events,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the pool and applies the schema if not done yet
    pub async fn init(&self) -> CmdqResult<()> {
        self.get_pool().await.map(|_| ())
    }

    pub(crate) async fn get_pool(&self) -> CmdqResult<&Pool<Sqlite>> {
        self.pool
            .get_or_try_init(|| async {
                let options = SqliteConnectOptions::from_str(&format!(
                    "sqlite://{}?mode=rwc",
                    self.path.display()
                ))
                .map_err(db_error)?
                .create_if_missing(true)
                .foreign_keys(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(10));

                let pool = SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await
                    .map_err(db_error)?;

                sqlx::raw_sql(SCHEMA).execute(&pool).await.map_err(db_error)?;

                tracing::debug!("Opened store at {}", self.path.display());
                Ok(pool)
            })
            .await
    }

    pub(crate) fn notify_event(&self, id: i64) {
        // no receivers is fine; the outbox row is what counts
        let _ = self.events.send(id);
    }

    pub(crate) fn event_sender(&self) -> &broadcast::Sender<i64> {
        &self.events
    }
}

pub(crate) fn db_error(e: sqlx::Error) -> CmdqError {
    CmdqError::Database(e.to_string())
}

/// Fixed-width RFC 3339 so that text comparison orders by time
pub(crate) fn to_db_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn from_db_time(raw: &str) -> CmdqResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CmdqError::Serialization(format!("bad timestamp '{}': {}", raw, e)))
}

pub(crate) fn from_db_time_opt(raw: Option<String>) -> CmdqResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(from_db_time).transpose()
}

pub(crate) fn row_to_command(row: &SqliteRow) -> CmdqResult<RegisteredCommand> {
    Ok(RegisteredCommand {
        id: row.get("id"),
        path: row.get("path"),
        description: row.get("description"),
        param_schema: row.get("param_schema"),
        active: row.get("active"),
        created_at: from_db_time(&row.get::<String, _>("created_at"))?,
    })
}

pub(crate) fn row_to_event_type(row: &SqliteRow) -> CmdqResult<EventType> {
    Ok(EventType {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        description: row.get("description"),
        active: row.get("active"),
        created_at: from_db_time(&row.get::<String, _>("created_at"))?,
    })
}

#[async_trait]
impl CommandCatalog for SqliteStore {
    async fn upsert_command(
        &self,
        path: &str,
        descriptor: &CommandDescriptor,
    ) -> CmdqResult<RegisteredCommand> {
        let path = canonical_path(path);
        if path.is_empty() {
            return Err(CmdqError::EmptyPath);
        }
        let pool = self.get_pool().await?;

        let row = sqlx::query(&format!(
            "INSERT INTO commands_registered (path, description, param_schema, active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(path) DO UPDATE SET
                description = excluded.description,
                param_schema = excluded.param_schema,
                active = 1
             RETURNING {}",
            COMMAND_COLUMNS
        ))
        .bind(&path)
        .bind(&descriptor.description)
        .bind(&descriptor.param_schema)
        .bind(to_db_time(Utc::now()))
        .fetch_one(pool)
        .await
        .map_err(db_error)?;

        row_to_command(&row)
    }

    async fn find_command(&self, path: &str) -> CmdqResult<Option<RegisteredCommand>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "SELECT {} FROM commands_registered WHERE path = ?",
            COMMAND_COLUMNS
        ))
        .bind(canonical_path(path))
        .fetch_optional(pool)
        .await
        .map_err(db_error)?
        .as_ref()
        .map(row_to_command)
        .transpose()
    }

    async fn active_commands(&self) -> CmdqResult<Vec<RegisteredCommand>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "SELECT {} FROM commands_registered WHERE active = 1 ORDER BY path",
            COMMAND_COLUMNS
        ))
        .fetch_all(pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(row_to_command)
        .collect()
    }

    async fn deactivate_command(&self, path: &str) -> CmdqResult<bool> {
        let pool = self.get_pool().await?;
        let result =
            sqlx::query("UPDATE commands_registered SET active = 0 WHERE path = ? AND active = 1")
                .bind(canonical_path(path))
                .execute(pool)
                .await
                .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl EventTypeStore for SqliteStore {
    async fn upsert_event_type(&self, event_type: &NewEventType) -> CmdqResult<EventType> {
        if event_type.code.trim().is_empty() {
            return Err(CmdqError::Validation("event type code is empty".to_string()));
        }
        let pool = self.get_pool().await?;

        let row = sqlx::query(&format!(
            "INSERT INTO event_types (code, name, description, active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                active = 1
             RETURNING {}",
            EVENT_TYPE_COLUMNS
        ))
        .bind(event_type.code.trim())
        .bind(&event_type.name)
        .bind(&event_type.description)
        .bind(to_db_time(Utc::now()))
        .fetch_one(pool)
        .await
        .map_err(db_error)?;

        row_to_event_type(&row)
    }

    async fn find_event_type(&self, code: &str) -> CmdqResult<Option<EventType>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "SELECT {} FROM event_types WHERE code = ?",
            EVENT_TYPE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(pool)
        .await
        .map_err(db_error)?
        .as_ref()
        .map(row_to_event_type)
        .transpose()
    }

    async fn active_event_types(&self) -> CmdqResult<Vec<EventType>> {
        let pool = self.get_pool().await?;
        sqlx::query(&format!(
            "SELECT {} FROM event_types WHERE active = 1 ORDER BY code",
            EVENT_TYPE_COLUMNS
        ))
        .fetch_all(pool)
        .await
        .map_err(db_error)?
        .iter()
        .map(row_to_event_type)
        .collect()
    }

    async fn deactivate_event_type(&self, code: &str) -> CmdqResult<bool> {
        let pool = self.get_pool().await?;
        let result = sqlx::query("UPDATE event_types SET active = 0 WHERE code = ? AND active = 1")
            .bind(code)
            .execute(pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}
