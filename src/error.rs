//! Error types for auto_seller

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for auto_seller operations
#[derive(Debug, Error)]
pub enum SellerError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Failed to parse JSON
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP error status code
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),
    /// Config file is present but unusable
    #[error("Configuration error: {0}")]
    Config(String),
    /// A persisted id set could not be decoded
    #[error("Malformed state file {}: {source}", path.display())]
    MalformedState {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The auth cookie was rejected
    #[error("Invalid cookie provided")]
    InvalidCredential,
    /// The login endpoint did not hand out a csrf token
    #[error("Failed to get csrf token")]
    MissingCsrfToken,
    /// Reselling requires a premium membership
    #[error("Account has no premium membership, limiteds can not be resold")]
    NoPremium,
    /// The inventory holds no serialized collectibles at all
    #[error("No limited collectibles found in inventory")]
    NoInventory,
    /// Everything owned was excluded by dedup sets or filters
    #[error("Nothing left to sell: {0}")]
    NothingToSell(String),
    /// Entry id is not part of the queue
    #[error("Catalog entry {0} is not in the queue")]
    UnknownEntry(u64),
    /// Serial is not owned, or its listing ids are not known yet
    #[error("Collectible #{0} can not be listed or unlisted")]
    UnknownCollectible(u64),
    /// A sell cycle is already running
    #[error("This item is already being sold")]
    AlreadySelling,
}

pub type Error = SellerError;

/// Result alias for auto_seller operations
pub type Result<T> = std::result::Result<T, SellerError>;
