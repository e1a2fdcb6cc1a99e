use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The remote endpoint could not be reached at the transport level
    /// (connect failure, DNS, reset, timeout). Received HTTP statuses are
    /// never reported through this variant.
    #[error("Network unavailable: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns true when the error means the origin was unreachable.
    pub fn is_network(&self) -> bool {
        matches!(self, BridgeError::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
