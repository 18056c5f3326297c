use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalogue entry for a command path. Rows are deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredCommand {
    pub id: i64,
    pub path: String,
    pub description: Option<String>,
    pub param_schema: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Descriptive data upserted alongside a path registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub description: Option<String>,
    pub param_schema: Option<String>,
}

impl CommandDescriptor {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            param_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.param_schema = Some(schema.into());
        self
    }
}

/// Canonical form of a command path: tokens joined by single spaces.
pub fn canonical_path(path: &str) -> String {
    path.split_whitespace().collect::<Vec<_>>().join(" ")
}
