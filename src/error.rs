//! Error types for the RX22 driver.

use thiserror::Error;

use crate::protocol::Status;

/// Main error type for all driver operations.
#[derive(Debug, Error)]
pub enum Rx22Error {
    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An argument failed validation before anything was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The codec saw an escape byte followed by a byte greater than `0x02`,
    /// or an escape byte as the last byte of a frame.
    #[error("invalid escape sequence at offset {offset}")]
    InvalidEscape {
        /// Offset of the escape byte within the frame body.
        offset: usize,
    },

    /// The underlying stream is closed or the receive loop died.
    #[error("transport closed")]
    TransportClosed,

    /// The module completed a request with a non-success status.
    #[error("module returned status {0:?}")]
    Protocol(Status),

    /// A completion packet was too short or structurally wrong.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The caller's cancellation signal fired before the operation finished.
    #[error("canceled")]
    Canceled,

    /// Serial port error (requires the `serial` feature).
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Port(#[from] tokio_serial::Error),
}

/// Result type alias using [`Rx22Error`].
pub type Result<T> = std::result::Result<T, Rx22Error>;
