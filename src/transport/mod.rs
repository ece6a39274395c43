//! Transport layer: byte stream ownership, frame extraction, fan-out.

#[cfg(feature = "serial")]
pub mod serial;
pub mod sim;
mod stream;

pub use stream::{Subscription, Transport};
