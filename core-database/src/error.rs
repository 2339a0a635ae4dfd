use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("Database URL is not configured")]
    MissingDatabaseUrl,

    #[error("Invalid JSON payload: {0}")]
    InvalidPayload(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
