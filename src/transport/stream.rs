//! Transport core: owns the byte stream, extracts frames, fans them out.
//!
//! A [`Transport`] is created once per serial device and lives for the
//! process. It splits the stream, spawns a background reader that
//! accumulates bytes and extracts complete frames, and hands every decoded
//! payload to all current subscribers in registration order. Outbound
//! writes go through a one-permit lock, so no two encoded frames can
//! interleave on the wire.
//!
//! A read error or end-of-input is fatal to the receive loop: the transport
//! latches closed, subscribers observe the end of their channel and further
//! operations fail with [`Rx22Error::TransportClosed`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Result, Rx22Error};
use crate::protocol::{stuffing, FrameBuffer};

/// Scratch buffer size for stream reads.
const READ_BUF_SIZE: usize = 4096;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle to a running transport. Cheap to clone.
#[derive(Clone)]
pub struct Transport {
    shared: Arc<Shared>,
}

struct Shared {
    /// Write half behind a one-permit lock; serializes outbound frames.
    writer: tokio::sync::Mutex<BoxedWriter>,
    /// Registered payload consumers, in registration order.
    listeners: Mutex<Vec<ListenerEntry>>,
    next_listener_id: AtomicU64,
    closed: AtomicBool,
}

struct ListenerEntry {
    id: u64,
    tx: mpsc::UnboundedSender<Bytes>,
}

impl Transport {
    /// Take ownership of a duplex byte stream and spawn the reader task.
    pub fn new<S>(stream: S) -> Transport
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let shared = Arc::new(Shared {
            writer: tokio::sync::Mutex::new(Box::new(writer) as BoxedWriter),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        tokio::spawn(read_loop(reader, Arc::clone(&shared)));
        Transport { shared }
    }

    /// Encode `payload` and write the frame atomically.
    ///
    /// Concurrent senders queue on the write lock; frames never interleave.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(Rx22Error::TransportClosed);
        }
        let frame = stuffing::encode(payload);
        let mut writer = self.shared.writer.lock().await;
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(Rx22Error::TransportClosed);
        }
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Register a consumer of fully-decoded payloads.
    ///
    /// Every payload is delivered to every live subscription in
    /// registration order. Dropping the subscription unregisters it.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.shared
            .listeners
            .lock()
            .unwrap()
            .push(ListenerEntry { id, tx });
        Subscription {
            id,
            rx,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether the receive loop has terminated.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Shut the stream down; all further operations fail.
    pub async fn close(&self) -> Result<()> {
        let mut writer = self.shared.writer.lock().await;
        self.shared.close();
        writer.shutdown().await?;
        Ok(())
    }
}

/// A registered payload consumer. Unregisters itself on drop.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Bytes>,
    shared: Arc<Shared>,
}

impl Subscription {
    /// Receive the next decoded payload.
    ///
    /// Returns `None` once the transport is closed.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut listeners = self.shared.listeners.lock().unwrap();
        listeners.retain(|entry| entry.id != self.id);
    }
}

impl Shared {
    /// Snapshot the listener list, then deliver outside the lock.
    fn deliver(&self, payload: &Bytes) {
        let targets: Vec<mpsc::UnboundedSender<Bytes>> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.tx.clone())
            .collect();
        for tx in targets {
            let _ = tx.send(payload.clone());
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the senders ends every subscription's channel.
        self.listeners.lock().unwrap().clear();
    }
}

async fn read_loop<R>(mut reader: R, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameBuffer::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("byte stream reached end of input");
                break;
            }
            Ok(n) => {
                for payload in frames.push(&buf[..n]) {
                    shared.deliver(&payload);
                }
            }
            Err(err) => {
                tracing::error!(%err, "read failed, shutting the transport down");
                break;
            }
        }
    }
    shared.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_send_writes_encoded_frame() {
        let (host, mut far) = duplex(1024);
        let transport = Transport::new(host);

        transport.send(&[0x01, 0x81]).await.unwrap();

        let mut buf = [0u8; 16];
        let n = far.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x81, 0x01, 0x80, 0x01, 0x82]);
    }

    #[tokio::test]
    async fn test_payloads_fan_out_to_all_subscribers() {
        let (host, mut far) = duplex(1024);
        let transport = Transport::new(host);
        let mut first = transport.subscribe();
        let mut second = transport.subscribe();

        far.write_all(&stuffing::encode(&[0x0A, 0x0B])).await.unwrap();

        assert_eq!(&first.recv().await.unwrap()[..], &[0x0A, 0x0B]);
        assert_eq!(&second.recv().await.unwrap()[..], &[0x0A, 0x0B]);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_unregistered() {
        let (host, mut far) = duplex(1024);
        let transport = Transport::new(host);
        let first = transport.subscribe();
        let mut second = transport.subscribe();
        drop(first);

        far.write_all(&stuffing::encode(&[0x01])).await.unwrap();

        assert_eq!(&second.recv().await.unwrap()[..], &[0x01]);
        assert_eq!(transport.shared.listeners.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_frame_is_not_delivered_early() {
        let (host, mut far) = duplex(1024);
        let transport = Transport::new(host);
        let mut sub = transport.subscribe();

        let wire = stuffing::encode(&[0x01, 0x02, 0x03]);
        far.write_all(&wire[..2]).await.unwrap();
        far.flush().await.unwrap();

        let early = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
        assert!(early.is_err(), "partial frame must not produce a payload");

        far.write_all(&wire[2..]).await.unwrap();
        assert_eq!(&sub.recv().await.unwrap()[..], &[0x01, 0x02, 0x03]);
    }

    #[tokio::test]
    async fn test_empty_payload_is_delivered() {
        let (host, mut far) = duplex(1024);
        let transport = Transport::new(host);
        let mut sub = transport.subscribe();

        far.write_all(&[stuffing::SOP, stuffing::EOP]).await.unwrap();

        let payload = sub.recv().await.unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_stream_end_closes_transport() {
        let (host, far) = duplex(1024);
        let transport = Transport::new(host);
        let mut sub = transport.subscribe();

        drop(far);

        assert_eq!(sub.recv().await, None);
        assert!(transport.is_closed());
        assert!(matches!(
            transport.send(&[0x01]).await,
            Err(Rx22Error::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let (host, _far) = duplex(1024);
        let transport = Transport::new(host);
        let mut sub = transport.subscribe();

        transport.close().await.unwrap();

        assert_eq!(sub.recv().await, None);
        assert!(matches!(
            transport.send(&[0x01]).await,
            Err(Rx22Error::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_sends_do_not_interleave() {
        let (host, mut far) = duplex(64 * 1024);
        let transport = Transport::new(host);

        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let transport = transport.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..16 {
                    transport.send(&[i; 24]).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Reassemble on the far side; every frame must decode to a single
        // repeated byte value.
        let mut frames = FrameBuffer::new();
        let mut buf = [0u8; 4096];
        let mut seen = 0;
        while seen < 8 * 16 {
            let n = far.read(&mut buf).await.unwrap();
            for payload in frames.push(&buf[..n]) {
                assert_eq!(payload.len(), 24);
                assert!(payload.iter().all(|&b| b == payload[0]));
                seen += 1;
            }
        }
    }
}
