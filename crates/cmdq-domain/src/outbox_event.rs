use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only domain event. Only `processed_at` is ever updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub event_type_code: String,
    pub aggregate_id: Option<String>,
    pub payload: String,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOutboxEvent {
    pub event_type_code: String,
    pub aggregate_id: Option<String>,
    pub payload: String,
    pub metadata: Option<String>,
}

impl NewOutboxEvent {
    pub fn new(event_type_code: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            event_type_code: event_type_code.into(),
            aggregate_id: None,
            payload: payload.into(),
            metadata: None,
        }
    }

    pub fn with_aggregate(mut self, aggregate_id: impl Into<String>) -> Self {
        self.aggregate_id = Some(aggregate_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}
