//! Reset and auxiliary pin control.
//!
//! The driver never talks to GPIO hardware itself. Hosts that wire the
//! module's reset line to a pin implement [`ResetLine`] and use
//! [`pulse_reset`] to recover a wedged module. The line is open drain and
//! active low: asserting drives it low, releasing returns it to
//! high-impedance input.

use std::time::Duration;

use crate::error::Result;

/// Open-drain reset line, active low.
pub trait ResetLine {
    /// Drive the line low.
    fn assert(&mut self) -> Result<()>;

    /// Release the line to high-impedance input.
    fn release(&mut self) -> Result<()>;
}

/// General-purpose output pin.
pub trait OutputPin {
    /// Drive the pin high or low.
    fn set(&mut self, high: bool) -> Result<()>;
}

/// Hold the reset line low for `pulse`, then release it.
pub async fn pulse_reset<R: ResetLine>(line: &mut R, pulse: Duration) -> Result<()> {
    line.assert()?;
    tokio::time::sleep(pulse).await;
    line.release()
}
