//! # easywave-rx22
//!
//! Host-side driver for the Eldat EasyWave RX22 bidirectional radio
//! gateway.
//!
//! The RX22 attaches over a serial line (115200 baud, 8-N-1) and speaks an
//! octet-oriented framed protocol: every packet is byte-stuffed and wrapped
//! in `0x81 .. 0x82` delimiters. Requests run a three-phase exchange: the
//! host sends a command, the module optionally answers with a 2-byte
//! pending handle, and eventually completes the request with a status and
//! command-specific data. Remote devices push button, sensor, state-change
//! and learn notifications through the long-lived receive-notification
//! request.
//!
//! ## Architecture
//!
//! - **Framing** ([`protocol::stuffing`], [`protocol::FrameBuffer`]): pure
//!   byte-stuffing codec plus the accumulate-and-extract buffer.
//! - **Transport** ([`transport::Transport`]): owns the byte stream, runs
//!   the background reader, fans decoded payloads out to subscribers and
//!   serializes writes.
//! - **Engine** ([`Engine`]): correlates pending/completion packets by
//!   handle and enforces supersedure of the notification request.
//! - **Command surface** ([`Rx22`]): one typed method per module operation.
//! - **Events** ([`NotificationDispatcher`]): turns notifications into
//!   structured [`Event`]s.
//!
//! ## Example
//!
//! ```ignore
//! use easywave_rx22::transport::serial::{self, SerialConfig};
//! use easywave_rx22::Rx22;
//!
//! #[tokio::main]
//! async fn main() -> easywave_rx22::Result<()> {
//!     let rx22 = Rx22::new(serial::open(&SerialConfig::new("/dev/ttyUSB0"))?);
//!     let serial = rx22.fd_serial(0).await?;
//!     println!("stored device: {serial}");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod event;
pub mod gpio;
pub mod protocol;
pub mod transport;

mod client;
mod engine;

pub use client::{JoinedDevice, Rx22, StateReport};
pub use engine::Engine;
pub use error::{Result, Rx22Error};
pub use event::{Event, LearnPhase, NotificationDispatcher};
pub use protocol::{
    function_byte, split_function_byte, Button, ButtonFunction, Command, InfoType, Notification,
    Serial, StateVector, Status,
};
