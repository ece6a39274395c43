//! Wire protocol: byte stuffing, frame extraction and packet vocabulary.

mod frame_buffer;
pub mod stuffing;
mod wire;

pub use frame_buffer::{FrameBuffer, MAX_FRAME_SIZE};
pub use wire::{
    function_byte, split_function_byte, Button, ButtonFunction, Command, InfoType, Notification,
    Serial, StateVector, Status, MIN_COMPLETION_LEN, NOTIFICATION_LEN, PENDING_LEN, SERIAL_LEN,
    STATE_LEN, SYNC_HANDLE,
};
