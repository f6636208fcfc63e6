//! Error types for the SDK layer.

use arbor_core::TreeError;
use thiserror::Error;

/// Errors that can occur in session and transport operations.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

pub type Result<T> = std::result::Result<T, SdkError>;
