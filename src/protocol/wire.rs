//! Packet vocabulary for the request/response protocol.
//!
//! Outbound payloads start with a one-octet command code followed by the
//! command's arguments. Inbound payloads start with a big-endian 16-bit
//! handle: a 2-byte payload is an intermediate pending packet, anything of
//! 3 bytes or more is an intermediate completion carrying its status at
//! offset 2 and command-specific data after it. All multi-byte integers are
//! big endian.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, Rx22Error};

/// Length of a device serial.
pub const SERIAL_LEN: usize = 16;
/// Length of a state vector.
pub const STATE_LEN: usize = 4;
/// Length of a full notification completion.
pub const NOTIFICATION_LEN: usize = 28;
/// Length of an intermediate pending packet.
pub const PENDING_LEN: usize = 2;
/// Minimum length of an intermediate completion packet.
pub const MIN_COMPLETION_LEN: usize = 3;
/// Handle denoting a synchronous, one-shot completion.
pub const SYNC_HANDLE: u16 = 0;

/// Command codes accepted by the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Transmit a button/command frame on behalf of a paired transmitter.
    SendCommand,
    /// Put the gateway into join mode and pair a device.
    JoinDevice,
    /// Remove a previously joined device.
    RemoveDevice,
    /// Drop every entry from the receive filter.
    ClearFilter,
    /// Add one serial to the receive filter.
    AddFilter,
    /// Await the next notification from a remote device.
    ReceiveNotification,
    /// Change a joined device's state vector.
    ChangeState,
    /// Query a joined device's state vector.
    QueryState,
    /// Drive the learn workflow of a joined device.
    LearnControl,
    /// Read a stored far-device or transmitter serial by index.
    GetSerial,
}

impl Command {
    /// Wire code of this command.
    pub const fn code(self) -> u8 {
        match self {
            Command::SendCommand => 0x02,
            Command::JoinDevice => 0x04,
            Command::RemoveDevice => 0x05,
            Command::ClearFilter => 0x06,
            Command::AddFilter => 0x07,
            Command::ReceiveNotification => 0x08,
            Command::ChangeState => 0x09,
            Command::QueryState => 0x0A,
            Command::LearnControl => 0x0B,
            Command::GetSerial => 0x21,
        }
    }
}

/// Completion status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Success,
    Canceled,
    OutOfQueue,
    InvalidRequest,
    SizeMismatch,
    InvalidParam,
    IncompleteFw,
    Timeout,
    InvalidSerial,
    /// The request was displaced by a newer one.
    Superseded,
    IncompatFw,
    SerialFilter,
    FilterOutOfMemory,
    Memory,
    TooLate,
}

impl Status {
    /// Decode a status octet. Returns `None` for codes outside the set.
    pub fn from_code(code: u8) -> Option<Status> {
        Some(match code {
            0x00 => Status::Success,
            0x01 => Status::Canceled,
            0x02 => Status::OutOfQueue,
            0x03 => Status::InvalidRequest,
            0x04 => Status::SizeMismatch,
            0x05 => Status::InvalidParam,
            0x06 => Status::IncompleteFw,
            0x07 => Status::Timeout,
            0x08 => Status::InvalidSerial,
            0x09 => Status::Superseded,
            0x0A => Status::IncompatFw,
            0x0B => Status::SerialFilter,
            0x0C => Status::FilterOutOfMemory,
            0x0D => Status::Memory,
            0x0E => Status::TooLate,
            _ => return None,
        })
    }

    /// Wire code of this status.
    pub const fn code(self) -> u8 {
        match self {
            Status::Success => 0x00,
            Status::Canceled => 0x01,
            Status::OutOfQueue => 0x02,
            Status::InvalidRequest => 0x03,
            Status::SizeMismatch => 0x04,
            Status::InvalidParam => 0x05,
            Status::IncompleteFw => 0x06,
            Status::Timeout => 0x07,
            Status::InvalidSerial => 0x08,
            Status::Superseded => 0x09,
            Status::IncompatFw => 0x0A,
            Status::SerialFilter => 0x0B,
            Status::FilterOutOfMemory => 0x0C,
            Status::Memory => 0x0D,
            Status::TooLate => 0x0E,
        }
    }
}

/// Notification info types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfoType {
    /// A remote transmitter released a button.
    Release,
    /// A remote transmitter pressed or holds a button.
    PushAndHold,
    /// A sensor delivered a reading.
    Sensor,
    /// A device reported a state change.
    StateChange,
    LearnStart,
    LearnComplete,
    LearnFail,
}

impl InfoType {
    /// Decode an info-type octet. Returns `None` for codes outside the set.
    pub fn from_code(code: u8) -> Option<InfoType> {
        Some(match code {
            0x00 => InfoType::Release,
            0x01 => InfoType::PushAndHold,
            0x02 => InfoType::Sensor,
            0x03 => InfoType::StateChange,
            0x40 => InfoType::LearnStart,
            0x41 => InfoType::LearnComplete,
            0x42 => InfoType::LearnFail,
            _ => return None,
        })
    }

    /// Wire code of this info type.
    pub const fn code(self) -> u8 {
        match self {
            InfoType::Release => 0x00,
            InfoType::PushAndHold => 0x01,
            InfoType::Sensor => 0x02,
            InfoType::StateChange => 0x03,
            InfoType::LearnStart => 0x40,
            InfoType::LearnComplete => 0x41,
            InfoType::LearnFail => 0x42,
        }
    }
}

/// Transmitter buttons, numbered by the low 2 bits of the function byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    A,
    B,
    C,
    D,
}

impl Button {
    /// Decode a button from the low 2 bits of a function byte.
    pub fn from_bits(bits: u8) -> Button {
        match bits & 0x03 {
            0 => Button::A,
            1 => Button::B,
            2 => Button::C,
            _ => Button::D,
        }
    }

    /// The button's 2-bit code.
    pub const fn bits(self) -> u8 {
        match self {
            Button::A => 0,
            Button::B => 1,
            Button::C => 2,
            Button::D => 3,
        }
    }
}

/// Function codes carried in the upper 6 bits of a function byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonFunction {
    Default,
    RemoteLearnDelete,
    RemoteLearnAdd,
    RemoteLearnReset,
    RemoteLearnSetTimer,
    EmulatedHold,
    EmulatedRelease,
    /// Reported by transmitters; never sent by the host.
    LowBattery,
}

impl ButtonFunction {
    /// Decode a function from the upper 6 bits of a function byte.
    pub fn from_bits(bits: u8) -> Option<ButtonFunction> {
        Some(match bits & 0x3F {
            0 => ButtonFunction::Default,
            1 => ButtonFunction::RemoteLearnDelete,
            2 => ButtonFunction::RemoteLearnAdd,
            3 => ButtonFunction::RemoteLearnReset,
            4 => ButtonFunction::RemoteLearnSetTimer,
            5 => ButtonFunction::EmulatedHold,
            6 => ButtonFunction::EmulatedRelease,
            0x20 => ButtonFunction::LowBattery,
            _ => return None,
        })
    }

    /// The function's 6-bit code.
    pub const fn bits(self) -> u8 {
        match self {
            ButtonFunction::Default => 0,
            ButtonFunction::RemoteLearnDelete => 1,
            ButtonFunction::RemoteLearnAdd => 2,
            ButtonFunction::RemoteLearnReset => 3,
            ButtonFunction::RemoteLearnSetTimer => 4,
            ButtonFunction::EmulatedHold => 5,
            ButtonFunction::EmulatedRelease => 6,
            ButtonFunction::LowBattery => 0x20,
        }
    }
}

/// Pack a button and a function into the wire function byte.
///
/// Layout: the low 2 bits select the button, the upper 6 bits carry the
/// function code.
pub fn function_byte(button: Button, function: ButtonFunction) -> u8 {
    ((function.bits() & 0x3F) << 2) | (button.bits() & 0x03)
}

/// Split a wire function byte into button and raw function code.
pub fn split_function_byte(byte: u8) -> (Button, u8) {
    (Button::from_bits(byte & 0x03), byte >> 2)
}

/// Opaque 16-byte device identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Serial([u8; SERIAL_LEN]);

impl Serial {
    /// Wrap a raw 16-byte identifier.
    pub const fn new(bytes: [u8; SERIAL_LEN]) -> Serial {
        Serial(bytes)
    }

    /// The raw identifier bytes.
    pub const fn as_bytes(&self) -> &[u8; SERIAL_LEN] {
        &self.0
    }
}

impl From<[u8; SERIAL_LEN]> for Serial {
    fn from(bytes: [u8; SERIAL_LEN]) -> Serial {
        Serial(bytes)
    }
}

impl TryFrom<&[u8]> for Serial {
    type Error = Rx22Error;

    fn try_from(value: &[u8]) -> Result<Serial> {
        let bytes: [u8; SERIAL_LEN] = value.try_into().map_err(|_| {
            Rx22Error::InvalidArgument(format!(
                "device serial must be {SERIAL_LEN} bytes, got {}",
                value.len()
            ))
        })?;
        Ok(Serial(bytes))
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Serial({self})")
    }
}

/// Fixed 4-byte device state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateVector([u8; STATE_LEN]);

impl StateVector {
    /// Wrap a raw 4-byte state.
    pub const fn new(bytes: [u8; STATE_LEN]) -> StateVector {
        StateVector(bytes)
    }

    /// The raw state bytes.
    pub const fn as_bytes(&self) -> &[u8; STATE_LEN] {
        &self.0
    }
}

impl From<[u8; STATE_LEN]> for StateVector {
    fn from(bytes: [u8; STATE_LEN]) -> StateVector {
        StateVector(bytes)
    }
}

impl TryFrom<&[u8]> for StateVector {
    type Error = Rx22Error;

    fn try_from(value: &[u8]) -> Result<StateVector> {
        let bytes: [u8; STATE_LEN] = value.try_into().map_err(|_| {
            Rx22Error::InvalidArgument(format!(
                "state vector must be {STATE_LEN} bytes, got {}",
                value.len()
            ))
        })?;
        Ok(StateVector(bytes))
    }
}

impl fmt::Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateVector({self})")
    }
}

/// A decoded Receive-Notification completion.
///
/// A full notification is exactly [`NOTIFICATION_LEN`] octets. The module
/// also completes the request with a bare 3-octet packet when it was
/// canceled or displaced by a newer one; that parses into a minimal record
/// with no info type and empty serial/additional fields, so a notification
/// loop can observe the cancellation without tearing down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Correlation handle the completion arrived under.
    pub handle: u16,
    /// Completion status.
    pub status: Status,
    /// Raw info-type octet; `None` for a minimal record.
    pub info_type: Option<u8>,
    /// Serial of the originating device; empty for a minimal record.
    pub serial: Bytes,
    /// Info-type specific data; empty for a minimal record.
    pub additional: Bytes,
}

impl Notification {
    /// Parse a Receive-Notification completion payload.
    ///
    /// # Errors
    ///
    /// Returns [`Rx22Error::Protocol`] when a full completion carries a
    /// non-success status, and [`Rx22Error::MalformedResponse`] when the
    /// status octet is unknown or the length is neither 3 nor 28.
    pub fn parse(payload: &Bytes) -> Result<Notification> {
        if payload.len() < MIN_COMPLETION_LEN {
            return Err(Rx22Error::MalformedResponse(format!(
                "notification completion of {} bytes",
                payload.len()
            )));
        }
        let handle = u16::from_be_bytes([payload[0], payload[1]]);
        let status = Status::from_code(payload[2]).ok_or_else(|| {
            Rx22Error::MalformedResponse(format!("unknown status code {:#04x}", payload[2]))
        })?;

        if payload.len() == MIN_COMPLETION_LEN {
            return Ok(Notification {
                handle,
                status,
                info_type: None,
                serial: Bytes::new(),
                additional: Bytes::new(),
            });
        }
        if status != Status::Success {
            return Err(Rx22Error::Protocol(status));
        }
        if payload.len() != NOTIFICATION_LEN {
            return Err(Rx22Error::MalformedResponse(format!(
                "notification of {} bytes",
                payload.len()
            )));
        }

        Ok(Notification {
            handle,
            status,
            info_type: Some(payload[3]),
            serial: payload.slice(4..4 + SERIAL_LEN),
            additional: payload.slice(4 + SERIAL_LEN..NOTIFICATION_LEN),
        })
    }
}
