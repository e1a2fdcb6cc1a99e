use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("Refusing to cache {url}: {reason}")]
    Refused { url: String, reason: String },

    #[error("Cache storage error: {0}")]
    Storage(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, CacheError>;
