//! Typed command surface for the RX22 module.
//!
//! [`Rx22`] wraps an [`Engine`] with one method per module operation. The
//! methods marshal their arguments into the wire layout, run the
//! three-phase exchange and decode the completion's trailing data into
//! typed records.
//!
//! Per-command timeouts are the caller's concern: wrap any method in
//! `tokio::time::timeout` to compose a deadline with its cancellation.
//! Dropping a command future cancels it cleanly.
//!
//! # Example
//!
//! ```ignore
//! use easywave_rx22::{transport::sim::simulated, Rx22};
//!
//! # async fn run() -> easywave_rx22::Result<()> {
//! let (transport, _sim) = simulated();
//! let rx22 = Rx22::new(transport);
//! let serial = rx22.fd_serial(0).await?;
//! rx22.add_filter(&serial).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::error::{Result, Rx22Error};
use crate::protocol::{Command, Notification, Serial, StateVector, SERIAL_LEN, STATE_LEN};
use crate::transport::Transport;

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinedDevice {
    /// Serial of the device that joined.
    pub serial: Serial,
    /// Raw device-type octet reported by the module.
    pub device_type: u8,
}

/// Result of a state query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateReport {
    /// Mode the state was read under.
    pub mode: u8,
    /// The device's 4-byte state.
    pub state: StateVector,
}

/// Handle to an RX22 module. Cheap to clone.
#[derive(Clone)]
pub struct Rx22 {
    engine: Engine,
}

impl Rx22 {
    /// Drive the module behind `transport`.
    pub fn new(transport: Transport) -> Rx22 {
        Rx22 {
            engine: Engine::new(transport),
        }
    }

    /// The underlying protocol engine, for raw exchanges.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Transport {
        self.engine.transport()
    }

    /// Read the serial of the far device stored at `index`.
    pub async fn fd_serial(&self, index: u16) -> Result<Serial> {
        let completion = self
            .engine
            .execute(Command::GetSerial, &index.to_be_bytes())
            .await?;
        Serial::try_from(trailing(&completion, 3, SERIAL_LEN)?)
    }

    /// Read the serial of the paired transmitter stored at `index`.
    ///
    /// Same wire command as [`Rx22::fd_serial`]; the module keeps a single
    /// table for both device classes.
    pub async fn tx_serial(&self, index: u16) -> Result<Serial> {
        self.fd_serial(index).await
    }

    /// Add `serial` to the receive filter.
    pub async fn add_filter(&self, serial: &Serial) -> Result<()> {
        self.engine
            .execute(Command::AddFilter, serial.as_bytes())
            .await
            .map(drop)
    }

    /// Drop every entry from the receive filter.
    pub async fn clear_filter(&self) -> Result<()> {
        self.engine.execute(Command::ClearFilter, &[]).await.map(drop)
    }

    /// Put the gateway into join mode and wait for a device to pair.
    pub async fn join_device(&self, gateway: &Serial) -> Result<JoinedDevice> {
        let completion = self
            .engine
            .execute(Command::JoinDevice, gateway.as_bytes())
            .await?;
        let device_type = *completion
            .get(3 + SERIAL_LEN)
            .ok_or_else(|| malformed("join completion carries no device type"))?;
        Ok(JoinedDevice {
            serial: Serial::try_from(trailing(&completion, 3, SERIAL_LEN)?)?,
            device_type,
        })
    }

    /// Remove a previously joined device.
    pub async fn remove_device(&self, initial: &Serial, joined: &Serial) -> Result<()> {
        let mut args = Vec::with_capacity(2 * SERIAL_LEN);
        args.extend_from_slice(initial.as_bytes());
        args.extend_from_slice(joined.as_bytes());
        self.engine
            .execute(Command::RemoveDevice, &args)
            .await
            .map(drop)
    }

    /// Change a joined device's state vector.
    pub async fn change_state(
        &self,
        initial: &Serial,
        joined: &Serial,
        mode: u8,
        state: &StateVector,
    ) -> Result<()> {
        let mut args = Vec::with_capacity(2 * SERIAL_LEN + 1 + STATE_LEN);
        args.extend_from_slice(initial.as_bytes());
        args.extend_from_slice(joined.as_bytes());
        args.push(mode);
        args.extend_from_slice(state.as_bytes());
        self.engine
            .execute(Command::ChangeState, &args)
            .await
            .map(drop)
    }

    /// Drive the learn workflow of a joined device.
    pub async fn learn_control(
        &self,
        initial: &Serial,
        joined: &Serial,
        function: u8,
        mode: u8,
        state: &StateVector,
    ) -> Result<()> {
        let mut args = Vec::with_capacity(2 * SERIAL_LEN + 2 + STATE_LEN);
        args.extend_from_slice(initial.as_bytes());
        args.extend_from_slice(joined.as_bytes());
        args.push(function);
        args.push(mode);
        args.extend_from_slice(state.as_bytes());
        self.engine
            .execute(Command::LearnControl, &args)
            .await
            .map(drop)
    }

    /// Query a joined device's state vector.
    pub async fn query_state(
        &self,
        initial: &Serial,
        joined: &Serial,
        mode: u8,
    ) -> Result<StateReport> {
        let mut args = Vec::with_capacity(2 * SERIAL_LEN + 1);
        args.extend_from_slice(initial.as_bytes());
        args.extend_from_slice(joined.as_bytes());
        args.push(mode);
        let completion = self.engine.execute(Command::QueryState, &args).await?;
        let mode = *completion
            .get(3)
            .ok_or_else(|| malformed("query completion carries no mode"))?;
        Ok(StateReport {
            mode,
            state: StateVector::try_from(trailing(&completion, 4, STATE_LEN)?)?,
        })
    }

    /// Await one notification; supersedes any outstanding request.
    pub async fn receive_notification(&self) -> Result<Notification> {
        self.engine.receive_notification().await
    }

    /// Transmit one command frame on behalf of `serial`.
    pub async fn send_command(&self, serial: &Serial, function: u8) -> Result<()> {
        let mut args = Vec::with_capacity(SERIAL_LEN + 1);
        args.extend_from_slice(serial.as_bytes());
        args.push(function);
        self.engine
            .execute(Command::SendCommand, &args)
            .await
            .map(drop)
    }

    /// Send `count` command frames separated by `delay`.
    ///
    /// Cancellation is honoured between frames: once the token fires the
    /// remaining frames are not issued and `Err(Canceled)` is returned.
    pub async fn send_burst(
        &self,
        serial: &Serial,
        function: u8,
        count: u32,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for sent in 0..count {
            if cancel.is_cancelled() {
                return Err(Rx22Error::Canceled);
            }
            self.send_command(serial, function).await?;
            if sent + 1 < count {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Rx22Error::Canceled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
        Ok(())
    }

    /// Send command frames every `interval` until the token fires.
    ///
    /// Cancellation is the expected way to stop and is not surfaced as an
    /// error; transport and protocol failures are.
    pub async fn continuous_emit(
        &self,
        serial: &Serial,
        function: u8,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            self.send_command(serial, function).await?;
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// [`Rx22::continuous_emit`] bounded by a deadline.
    ///
    /// Returns cleanly when either the deadline elapses or the caller's
    /// token fires, whichever comes first.
    pub async fn send_for_duration(
        &self,
        serial: &Serial,
        function: u8,
        duration: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match tokio::time::timeout(
            duration,
            self.continuous_emit(serial, function, interval, cancel),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => Ok(()),
        }
    }
}

fn trailing(completion: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    completion
        .get(offset..offset + len)
        .ok_or_else(|| malformed(format!("completion is missing {len} bytes at offset {offset}")))
}

fn malformed(message: impl Into<String>) -> Rx22Error {
    Rx22Error::MalformedResponse(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::sim::{simulated, SimPort};

    /// Expect one request on the wire, check it, answer with `reply`.
    async fn respond_once(sim: &mut SimPort, expected: &[u8], reply: &[u8]) {
        let request = sim.next_frame().await.unwrap();
        assert_eq!(&request[..], expected);
        sim.inject_frame(reply).await.unwrap();
    }

    #[tokio::test]
    async fn test_fd_serial_marshals_index_and_decodes_serial() {
        let (transport, mut sim) = simulated();
        let rx22 = Rx22::new(transport);

        let task = tokio::spawn({
            let rx22 = rx22.clone();
            async move { rx22.fd_serial(0x012A).await }
        });

        let mut reply = vec![0x00, 0x00, 0x00];
        reply.extend(1u8..=16);
        respond_once(&mut sim, &[0x21, 0x01, 0x2A], &reply).await;

        let serial = task.await.unwrap().unwrap();
        let expected: Vec<u8> = (1..=16).collect();
        assert_eq!(&serial.as_bytes()[..], &expected[..]);
    }

    #[tokio::test]
    async fn test_add_filter_sends_serial() {
        let (transport, mut sim) = simulated();
        let rx22 = Rx22::new(transport);
        let serial = Serial::new([0x42; 16]);

        let task = tokio::spawn({
            let rx22 = rx22.clone();
            async move { rx22.add_filter(&serial).await }
        });

        let mut expected = vec![0x07];
        expected.extend_from_slice(&[0x42; 16]);
        respond_once(&mut sim, &expected, &[0x00, 0x00, 0x00]).await;

        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_clear_filter_sends_bare_command() {
        let (transport, mut sim) = simulated();
        let rx22 = Rx22::new(transport);

        let task = tokio::spawn({
            let rx22 = rx22.clone();
            async move { rx22.clear_filter().await }
        });
        respond_once(&mut sim, &[0x06], &[0x00, 0x00, 0x00]).await;
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_join_device_decodes_serial_and_type() {
        let (transport, mut sim) = simulated();
        let rx22 = Rx22::new(transport);
        let gateway = Serial::new([0x01; 16]);

        let task = tokio::spawn({
            let rx22 = rx22.clone();
            async move { rx22.join_device(&gateway).await }
        });

        let mut expected = vec![0x04];
        expected.extend_from_slice(&[0x01; 16]);
        let mut reply = vec![0x00, 0x00, 0x00];
        reply.extend_from_slice(&[0x77; 16]);
        reply.push(0x05);
        respond_once(&mut sim, &expected, &reply).await;

        let joined = task.await.unwrap().unwrap();
        assert_eq!(joined.serial, Serial::new([0x77; 16]));
        assert_eq!(joined.device_type, 0x05);
    }

    #[tokio::test]
    async fn test_remove_device_sends_both_serials() {
        let (transport, mut sim) = simulated();
        let rx22 = Rx22::new(transport);
        let initial = Serial::new([0x10; 16]);
        let joined = Serial::new([0x20; 16]);

        let task = tokio::spawn({
            let rx22 = rx22.clone();
            async move { rx22.remove_device(&initial, &joined).await }
        });

        let mut expected = vec![0x05];
        expected.extend_from_slice(&[0x10; 16]);
        expected.extend_from_slice(&[0x20; 16]);
        respond_once(&mut sim, &expected, &[0x00, 0x00, 0x00]).await;
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_change_state_marshals_mode_and_state() {
        let (transport, mut sim) = simulated();
        let rx22 = Rx22::new(transport);
        let initial = Serial::new([0x10; 16]);
        let joined = Serial::new([0x20; 16]);
        let state = StateVector::new([0xDE, 0xAD, 0xBE, 0xEF]);

        let task = tokio::spawn({
            let rx22 = rx22.clone();
            async move { rx22.change_state(&initial, &joined, 0x02, &state).await }
        });

        let mut expected = vec![0x09];
        expected.extend_from_slice(&[0x10; 16]);
        expected.extend_from_slice(&[0x20; 16]);
        expected.push(0x02);
        expected.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        respond_once(&mut sim, &expected, &[0x00, 0x00, 0x00]).await;
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_learn_control_marshals_function_mode_state() {
        let (transport, mut sim) = simulated();
        let rx22 = Rx22::new(transport);
        let initial = Serial::new([0x10; 16]);
        let joined = Serial::new([0x20; 16]);
        let state = StateVector::new([1, 2, 3, 4]);

        let task = tokio::spawn({
            let rx22 = rx22.clone();
            async move { rx22.learn_control(&initial, &joined, 0x08, 0x01, &state).await }
        });

        let mut expected = vec![0x0B];
        expected.extend_from_slice(&[0x10; 16]);
        expected.extend_from_slice(&[0x20; 16]);
        expected.push(0x08);
        expected.push(0x01);
        expected.extend_from_slice(&[1, 2, 3, 4]);
        respond_once(&mut sim, &expected, &[0x00, 0x00, 0x00]).await;
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_query_state_decodes_mode_and_state() {
        let (transport, mut sim) = simulated();
        let rx22 = Rx22::new(transport);
        let initial = Serial::new([0x10; 16]);
        let joined = Serial::new([0x20; 16]);

        let task = tokio::spawn({
            let rx22 = rx22.clone();
            async move { rx22.query_state(&initial, &joined, 0x03).await }
        });

        let mut expected = vec![0x0A];
        expected.extend_from_slice(&[0x10; 16]);
        expected.extend_from_slice(&[0x20; 16]);
        expected.push(0x03);
        respond_once(&mut sim, &expected, &[0x00, 0x00, 0x00, 0x03, 0x0A, 0x0B, 0x0C, 0x0D]).await;

        let report = task.await.unwrap().unwrap();
        assert_eq!(report.mode, 0x03);
        assert_eq!(report.state, StateVector::new([0x0A, 0x0B, 0x0C, 0x0D]));
    }

    #[tokio::test]
    async fn test_send_command_appends_function_byte() {
        let (transport, mut sim) = simulated();
        let rx22 = Rx22::new(transport);
        let serial = Serial::new([0x33; 16]);

        let task = tokio::spawn({
            let rx22 = rx22.clone();
            async move { rx22.send_command(&serial, 0x15).await }
        });

        let mut expected = vec![0x02];
        expected.extend_from_slice(&[0x33; 16]);
        expected.push(0x15);
        respond_once(&mut sim, &expected, &[0x00, 0x00, 0x00]).await;
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_protocol_status_surfaces_to_caller() {
        let (transport, mut sim) = simulated();
        let rx22 = Rx22::new(transport);
        let serial = Serial::new([0x42; 16]);

        let task = tokio::spawn({
            let rx22 = rx22.clone();
            async move { rx22.add_filter(&serial).await }
        });
        sim.next_frame().await.unwrap();
        sim.inject_frame(&[0x00, 0x00, 0x0C]).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(Rx22Error::Protocol(crate::protocol::Status::FilterOutOfMemory))
        ));
    }

    #[tokio::test]
    async fn test_truncated_completion_is_malformed() {
        let (transport, mut sim) = simulated();
        let rx22 = Rx22::new(transport);

        let task = tokio::spawn({
            let rx22 = rx22.clone();
            async move { rx22.fd_serial(0).await }
        });
        sim.next_frame().await.unwrap();
        sim.inject_frame(&[0x00, 0x00, 0x00, 0x01, 0x02]).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(Rx22Error::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_serial_validation_is_caller_visible() {
        let result = Serial::try_from(&[0u8; 12][..]);
        assert!(matches!(result, Err(Rx22Error::InvalidArgument(_))));

        let result = StateVector::try_from(&[0u8; 5][..]);
        assert!(matches!(result, Err(Rx22Error::InvalidArgument(_))));
    }
}
