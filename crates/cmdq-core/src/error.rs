use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmdqError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Empty command path")]
    EmptyPath,

    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    #[error("Misconfigured node: {0}")]
    MisconfiguredNode(String),

    /// The queue row is no longer held under the caller's lease.
    #[error("Lease on queued command {0} was lost")]
    LeaseContention(i64),

    #[error("Invalid interval expression: {0}")]
    InvalidInterval(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
