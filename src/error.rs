/// Error type shared by the store, the classifier and the browser bridge
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PinexError {
    #[error("storage unavailable: {0}")]
    Storage(String),

    #[error("broadcast failed: {0}")]
    Channel(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid color: {0}")]
    InvalidColor(String),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

pub type Result<T> = std::result::Result<T, PinexError>;
