use thiserror::Error;

/// Store-level failure taxonomy. Every entity-lookup and constraint failure
/// is recovered at the component boundary and translated to one of these;
/// the HTTP layer maps them onto status codes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    /// Moment exists but is hidden, expired, or already past its end time.
    #[error("moment is not joinable")]
    NotJoinable,

    #[error("moment is full")]
    Full,

    #[error("{0}")]
    Forbidden(&'static str),

    /// Target content was already deleted; used by remediation flows.
    #[error("{0}")]
    Gone(&'static str),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("{0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
