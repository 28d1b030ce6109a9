//! Error types for the export pipeline

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while exporting a post
#[derive(Error, Debug)]
pub enum Error {
    /// Rasterization could not complete
    #[error("Capture failed: {0}")]
    CaptureFailure(#[from] CaptureFault),

    /// The captured image could not be handed to the user
    #[error("Delivery failed: {0}")]
    DeliveryFailure(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Why a capture could not produce an image
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureFault {
    /// A cross-origin image would taint the canvas
    #[error("cross-origin image taints the capture: {0}")]
    Tainted(String),

    /// The canvas would exceed the configured pixel budget
    #[error("canvas of {width}x{height} exceeds the pixel limit of {limit}")]
    ResourceExhausted { width: u32, height: u32, limit: u64 },

    /// An embedded image could not be fetched or decoded
    #[error("embedded image {url} could not be loaded: {reason}")]
    ImageLoad { url: String, reason: String },

    /// Encoding or drawing failed
    #[error("rendering error: {0}")]
    Render(String),
}

impl Error {
    /// Whether this failure happened while rasterizing
    pub fn is_capture_failure(&self) -> bool {
        matches!(self, Error::CaptureFailure(_))
    }

    /// Whether this failure happened while delivering
    pub fn is_delivery_failure(&self) -> bool {
        matches!(self, Error::DeliveryFailure(_))
    }
}
