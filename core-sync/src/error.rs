use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid offline action: {field} - {message}")]
    InvalidAction { field: String, message: String },

    #[error("Queue storage error: {0}")]
    Storage(#[from] BridgeError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
