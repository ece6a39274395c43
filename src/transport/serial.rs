//! Physical serial port support (requires the `serial` feature).
//!
//! The RX22 presents as a UART at 115200 baud, 8 data bits, no parity, one
//! stop bit and no flow control.

use std::time::Duration;

use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};

use super::Transport;
use crate::error::Result;

/// Factory-default baud rate of the module.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default port-level read/write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Serial line configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    /// Baud rate; the module ships at [`DEFAULT_BAUD_RATE`].
    pub baud_rate: u32,
    /// Port-level read/write timeout.
    pub timeout: Duration,
}

impl SerialConfig {
    /// Configuration for `path` with the module's stock line settings.
    pub fn new(path: impl Into<String>) -> SerialConfig {
        SerialConfig {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Open the port 8-N-1 without flow control and spawn a transport over it.
pub fn open(config: &SerialConfig) -> Result<Transport> {
    let stream = tokio_serial::new(&config.path, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.timeout)
        .open_native_async()?;
    Ok(Transport::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.path, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }
}
