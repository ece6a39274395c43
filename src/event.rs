//! Notification dispatch: classify inbound notifications into events.
//!
//! The dispatcher repeatedly awaits one notification and emits a structured
//! [`Event`] on an mpsc channel. Decode failures are logged and the loop
//! continues; a closed transport terminates it; cancelling the token exits
//! cleanly.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::Rx22;
use crate::error::{Result, Rx22Error};
use crate::protocol::{
    split_function_byte, Button, ButtonFunction, InfoType, Notification, Serial, StateVector,
    Status,
};

/// Phase of a learn workflow reported by the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearnPhase {
    Started,
    Completed,
    Failed,
}

/// A structured event decoded from one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A remote transmitter pressed or holds a button.
    ButtonPressed {
        serial: Serial,
        button: Button,
        /// Raw 6-bit function code from the function byte.
        function: u8,
    },
    /// A remote transmitter released a button.
    ButtonReleased { serial: Serial, button: Button },
    /// A transmitter reported a low battery.
    LowBattery { serial: Serial },
    /// A sensor delivered a reading.
    Sensor { serial: Serial, data: [u8; 8] },
    /// A device reported a state change.
    StateChanged {
        serial: Serial,
        mode: u8,
        state: StateVector,
    },
    /// A learn workflow changed phase.
    Learn { serial: Serial, phase: LearnPhase },
    /// A notification with an info type this driver does not know.
    Unhandled {
        serial: Serial,
        info_type: u8,
        additional: [u8; 8],
    },
}

/// Consumer loop turning notifications into [`Event`]s.
pub struct NotificationDispatcher {
    client: Rx22,
    events: mpsc::Sender<Event>,
}

impl NotificationDispatcher {
    /// Dispatch notifications from `client` onto `events`.
    pub fn new(client: Rx22, events: mpsc::Sender<Event>) -> NotificationDispatcher {
        NotificationDispatcher { client, events }
    }

    /// Run until cancellation, the event receiver going away, or a fatal
    /// transport error.
    ///
    /// Notification decode failures (non-success status, length mismatch)
    /// are logged and the loop continues; [`Rx22Error::TransportClosed`]
    /// terminates it.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                received = self.client.receive_notification() => received,
            };
            match received {
                Ok(notification) => {
                    if let Some(event) = classify(&notification) {
                        if self.events.send(event).await.is_err() {
                            // Consumer went away; nothing left to do.
                            return Ok(());
                        }
                    }
                }
                Err(Rx22Error::TransportClosed) => return Err(Rx22Error::TransportClosed),
                Err(err) => tracing::warn!(%err, "failed to decode notification"),
            }
        }
    }
}

/// Map a successfully received notification onto an event.
///
/// Minimal records (canceled/superseded) and structurally odd payloads
/// produce no event.
fn classify(notification: &Notification) -> Option<Event> {
    if notification.status != Status::Success {
        tracing::debug!(
            status = ?notification.status,
            "notification request completed without data"
        );
        return None;
    }
    let info_type = notification.info_type?;
    let serial = match Serial::try_from(notification.serial.as_ref()) {
        Ok(serial) => serial,
        Err(err) => {
            tracing::warn!(%err, "notification carries a malformed serial");
            return None;
        }
    };
    let additional: [u8; 8] = match notification.additional.as_ref().try_into() {
        Ok(additional) => additional,
        Err(_) => {
            tracing::warn!(
                len = notification.additional.len(),
                "notification carries malformed additional data"
            );
            return None;
        }
    };

    let event = match InfoType::from_code(info_type) {
        Some(InfoType::PushAndHold) => {
            let (button, function) = split_function_byte(additional[0]);
            if function == ButtonFunction::LowBattery.bits() {
                Event::LowBattery { serial }
            } else {
                Event::ButtonPressed {
                    serial,
                    button,
                    function,
                }
            }
        }
        Some(InfoType::Release) => Event::ButtonReleased {
            serial,
            button: Button::from_bits(additional[0]),
        },
        Some(InfoType::Sensor) => Event::Sensor {
            serial,
            data: additional,
        },
        Some(InfoType::StateChange) => Event::StateChanged {
            serial,
            mode: additional[0],
            state: StateVector::new([additional[1], additional[2], additional[3], additional[4]]),
        },
        Some(InfoType::LearnStart) => Event::Learn {
            serial,
            phase: LearnPhase::Started,
        },
        Some(InfoType::LearnComplete) => Event::Learn {
            serial,
            phase: LearnPhase::Completed,
        },
        Some(InfoType::LearnFail) => Event::Learn {
            serial,
            phase: LearnPhase::Failed,
        },
        None => Event::Unhandled {
            serial,
            info_type,
            additional,
        },
    };
    Some(event)
}
