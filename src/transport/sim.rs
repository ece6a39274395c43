//! In-memory simulation of the serial link.
//!
//! [`simulated`] wires a [`Transport`] to an in-memory duplex pipe; the
//! returned [`SimPort`] plays the module side. Injected byte chunks travel
//! through the exact accumulate-and-extract path a physical port uses, so
//! behavior is identical without opening a device.
//!
//! # Example
//!
//! ```
//! use easywave_rx22::transport::sim::simulated;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> easywave_rx22::Result<()> {
//! let (transport, mut sim) = simulated();
//! let mut sub = transport.subscribe();
//!
//! sim.inject_frame(&[0x00, 0x00, 0x00]).await?;
//! assert_eq!(&sub.recv().await.unwrap()[..], &[0x00, 0x00, 0x00]);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use super::Transport;
use crate::error::Result;
use crate::protocol::{stuffing, FrameBuffer};

/// Buffer capacity of the in-memory pipe.
const PIPE_CAPACITY: usize = 16 * 1024;

/// Create a transport backed by an in-memory pipe, plus the module side.
pub fn simulated() -> (Transport, SimPort) {
    let (host, module) = tokio::io::duplex(PIPE_CAPACITY);
    (
        Transport::new(host),
        SimPort {
            stream: module,
            frames: FrameBuffer::new(),
            decoded: VecDeque::new(),
        },
    )
}

/// The module end of a simulated link.
///
/// Dropping it closes the link, which the host observes as end-of-input.
pub struct SimPort {
    stream: DuplexStream,
    frames: FrameBuffer,
    decoded: VecDeque<Bytes>,
}

impl SimPort {
    /// Inject raw bytes as if the module had written them.
    pub async fn inject(&mut self, chunk: &[u8]) -> Result<()> {
        self.stream.write_all(chunk).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Frame a payload and inject it.
    pub async fn inject_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.inject(&stuffing::encode(payload)).await
    }

    /// Read and decode the next frame the host sent.
    ///
    /// Returns `None` once the host side is gone.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            if let Some(frame) = self.decoded.pop_front() {
                return Some(frame);
            }
            let mut buf = [0u8; 256];
            match self.stream.read(&mut buf).await {
                Ok(0) | Err(_) => return None,
                Ok(n) => self.decoded.extend(self.frames.push(&buf[..n])),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_chunks_reach_subscribers() {
        let (transport, mut sim) = simulated();
        let mut sub = transport.subscribe();

        // Split one frame across two injections.
        let wire = stuffing::encode(&[0x08, 0x09]);
        sim.inject(&wire[..2]).await.unwrap();
        sim.inject(&wire[2..]).await.unwrap();

        assert_eq!(&sub.recv().await.unwrap()[..], &[0x08, 0x09]);
    }

    #[tokio::test]
    async fn test_next_frame_decodes_host_output() {
        let (transport, mut sim) = simulated();

        transport.send(&[0x21, 0x00, 0x2A]).await.unwrap();

        let frame = sim.next_frame().await.unwrap();
        assert_eq!(&frame[..], &[0x21, 0x00, 0x2A]);
    }
}
