use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid auth endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to encode request payload: {0}")]
    Payload(String),

    #[error("API key is missing")]
    MissingApiKey,
}

pub type Result<T> = std::result::Result<T, AuthError>;
