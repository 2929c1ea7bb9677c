use thiserror::Error;

/// Error types for the compute module
#[derive(Error, Debug)]
pub enum ComputeError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A caller or configuration defect, e.g. a non-positive interval.
    /// Never retried automatically.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An unknown recurrence unit; indicates corrupted data.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Calendar arithmetic left the representable date range
    #[error("Date error: {0}")]
    Date(String),

    /// The user a recurring expense belongs to does not exist
    #[error("Owner with id {0} does not exist")]
    OwnerNotFound(i32),

    /// No recurring expense template with the given id
    #[error("Recurring expense with id {0} does not exist")]
    TemplateNotFound(i32),

    /// Input rejected by validation
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Type alias for Result with ComputeError
pub type Result<T> = std::result::Result<T, ComputeError>;
