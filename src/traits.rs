//! Capability interfaces implemented by the drivers.
//!
//! These sit next to the `embedded-hal` traits rather than replacing them:
//! they report every failure through [`crate::Error`], expose the driver
//! lifecycle, and work on buffers instead of single words.

use core::ops::Not;

use crate::error::Result;
use crate::time::MicroSeconds;

/// Driver lifecycle: Uninitialized → `initialize` → Ready → `deinitialize` →
/// Uninitialized. Dropping a Ready driver deinitializes it.
pub trait Driver {
    type Config;

    /// Claims pins, powers the peripheral and programs it from `config`.
    /// Fails with `AlreadyInitialized` if the driver is Ready.
    fn initialize(&mut self, config: Self::Config) -> Result<()>;

    /// Releases pins, restores reset values and powers the peripheral down.
    fn deinitialize(&mut self) -> Result<()>;

    fn is_ready(&self) -> bool;
}

pub trait SerialPort {
    /// Returns how many bytes were queued. In non-blocking mode this is what
    /// the transmit FIFO accepted and may be zero.
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;
    /// Returns how many bytes were received into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// Blocks until every queued byte has left the shift register.
    fn flush(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Level {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl Not for Level {
    type Output = Level;
    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

pub trait DigitalOutput {
    fn set_level(&mut self, level: Level) -> Result<()>;
    /// Level the pin is being driven to.
    fn output_level(&self) -> Result<Level>;

    fn toggle_level(&mut self) -> Result<()> {
        let level = self.output_level()?;
        self.set_level(!level)
    }
}

pub trait DigitalInput {
    fn read_level(&self) -> Result<Level>;
}

pub trait AnalogInput {
    /// One conversion on `channel`, 12-bit raw result.
    fn sample(&mut self, channel: u8) -> Result<u16>;
    fn to_millivolts(&self, raw: u16) -> u32;
}

pub trait CountdownTimer {
    fn start_countdown(&mut self, duration: MicroSeconds) -> Result<()>;
    /// True once the countdown reached zero. Stays true until restarted.
    fn is_expired(&self) -> Result<bool>;
    fn cancel_countdown(&mut self) -> Result<()>;
}
