//! Panel error types

use soomfon_transport::TransportError;
use thiserror::Error;

/// Errors from panel operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PanelError {
    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Argument rejected before any report was written
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Source image could not be decoded
    #[error("Image decode failed: {0}")]
    DecodeError(String),
}
