//! Three-phase request/response engine.
//!
//! Every exchange starts with an Initial Request Packet: the command code
//! followed by its arguments. The module answers either synchronously with
//! a single completion whose handle is zero, or asynchronously with a
//! 2-byte pending packet carrying a handle, followed later by the
//! completion under that same handle. Which variant is used is the module's
//! choice; the engine supports both transparently for every command.
//!
//! Correlation: the engine subscribes to the transport *before* sending and
//! latches the first pending handle it observes. A completion is accepted
//! when its handle matches the latch, when its handle is zero, or when no
//! pending handle was latched yet (the synchronous reply arrives under
//! whatever handle the module chose). Completions under other handles are
//! another request's traffic on the shared wire and are ignored. A
//! handle-zero completion is accepted even while a pending handle is
//! latched; the module issues at most one outstanding handle-zero reply per
//! command, and the engine has no way to route them any tighter.
//!
//! The module accepts at most one outstanding Receive-Notification request.
//! The engine mirrors that with a single pending-notification slot: issuing
//! a new request first completes the previous waiter locally with a
//! synthetic `{handle 0, status Superseded}` completion, then installs the
//! new one. A waiter that was dropped instead of superseded leaves only a
//! dead sender behind, which the next request displaces silently.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::{Result, Rx22Error};
use crate::protocol::{
    Command, Notification, Status, MIN_COMPLETION_LEN, PENDING_LEN, SYNC_HANDLE,
};
use crate::transport::{Subscription, Transport};

/// Synthetic completion injected into a displaced notification waiter.
const SUPERSEDED_COMPLETION: [u8; 3] = [0x00, 0x00, 0x09];

/// Protocol engine bound to one transport. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    transport: Transport,
    notify_slot: Arc<Mutex<Option<oneshot::Sender<Bytes>>>>,
}

impl Engine {
    /// Create an engine over `transport`.
    pub fn new(transport: Transport) -> Engine {
        Engine {
            transport,
            notify_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// The transport this engine drives.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Send a request and await its successful completion.
    ///
    /// Returns the full completion payload (handle, status, trailing data)
    /// after verifying the status octet. The transport listener is
    /// unregistered on every exit path, including when the returned future
    /// is dropped.
    ///
    /// # Errors
    ///
    /// [`Rx22Error::Protocol`] for a non-success status,
    /// [`Rx22Error::MalformedResponse`] for an unknown status octet and
    /// [`Rx22Error::TransportClosed`] when the transport dies while waiting.
    pub async fn execute(&self, command: Command, args: &[u8]) -> Result<Bytes> {
        let mut sub = self.transport.subscribe();
        self.send_request(command, args).await?;
        let completion = await_completion(&mut sub).await?;
        match decode_status(&completion)? {
            Status::Success => Ok(completion),
            status => Err(Rx22Error::Protocol(status)),
        }
    }

    /// Await one notification from the module.
    ///
    /// Displaces any notification request already outstanding: the earlier
    /// caller resolves with a minimal [`Notification`] whose status is
    /// [`Status::Superseded`] before this one completes.
    pub async fn receive_notification(&self) -> Result<Notification> {
        let mut sub = self.transport.subscribe();
        let (tx, rx) = oneshot::channel();
        if let Some(previous) = self.notify_slot.lock().unwrap().replace(tx) {
            let _ = previous.send(Bytes::from_static(&SUPERSEDED_COMPLETION));
        }
        self.send_request(Command::ReceiveNotification, &[]).await?;

        let completion = tokio::select! {
            displaced = rx => displaced.map_err(|_| Rx22Error::Canceled)?,
            completion = await_completion(&mut sub) => completion?,
        };
        Notification::parse(&completion)
    }

    async fn send_request(&self, command: Command, args: &[u8]) -> Result<()> {
        let mut request = Vec::with_capacity(1 + args.len());
        request.push(command.code());
        request.extend_from_slice(args);
        self.transport.send(&request).await
    }
}

/// Correlate inbound payloads until this request's completion arrives.
async fn await_completion(sub: &mut Subscription) -> Result<Bytes> {
    let mut expected: Option<u16> = None;
    loop {
        let Some(payload) = sub.recv().await else {
            return Err(Rx22Error::TransportClosed);
        };
        if payload.len() == PENDING_LEN {
            // Latch the first pending handle; later ones belong to requests
            // issued after this one.
            if expected.is_none() {
                expected = Some(u16::from_be_bytes([payload[0], payload[1]]));
            }
            continue;
        }
        if payload.len() >= MIN_COMPLETION_LEN {
            let handle = u16::from_be_bytes([payload[0], payload[1]]);
            match expected {
                None => return Ok(payload),
                Some(latched) if handle == latched || handle == SYNC_HANDLE => {
                    return Ok(payload);
                }
                Some(_) => {
                    tracing::trace!(handle, "ignoring completion for another request");
                    continue;
                }
            }
        }
        tracing::trace!(len = payload.len(), "ignoring undersized payload");
    }
}

fn decode_status(completion: &Bytes) -> Result<Status> {
    Status::from_code(completion[2]).ok_or_else(|| {
        Rx22Error::MalformedResponse(format!("unknown status code {:#04x}", completion[2]))
    })
}
