//! Errors returned by every fallible HAL operation.
//!
//! Nothing in the HAL swallows an error or retries on its own: a
//! [`HardwareFault`] on a physical bus is reported to the caller, who decides
//! whether a retry is safe.

use core::fmt;

use crate::pin::PinId;

/// HAL error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The requested parameters cannot be achieved by the hardware under the
    /// current clock configuration.
    Configuration(ConfigurationError),
    /// The pin is held by another peripheral or with another function.
    AlreadyClaimed(PinId),
    /// The PLL or main oscillator did not stabilize in time.
    ClockLockTimeout,
    /// The peripheral is mid-transaction. Retry later.
    Busy,
    /// The hardware reported a data-integrity error.
    HardwareFault(HardwareFault),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Why a configuration was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    /// Port/pin pair does not exist on the LPC40xx.
    InvalidPin,
    /// IOCON function number above 7.
    InvalidFunction,
    /// The pin cannot carry the requested peripheral signal.
    PinNotRoutable,
    /// Oscillator frequency outside 1..=25 MHz.
    OscillatorOutOfRange,
    /// PLL multiplier outside 1..=32.
    MultiplierOutOfRange,
    /// Clock divider outside 1..=31.
    DividerOutOfRange,
    /// No PLL post divider puts the CCO inside 156..=320 MHz.
    PllOutputOutOfRange,
    /// CPU clock above 120 MHz.
    CpuFrequencyTooHigh,
    /// The USB clock cannot be derived at exactly 48 MHz.
    UsbClockUnachievable,
    /// A driver needs clock frequencies before clocks were configured.
    ClocksNotConfigured,
    /// Baud rate unreachable within tolerance.
    BaudRate,
    /// Bus or sample clock frequency unreachable.
    Frequency,
    /// Frame or data width not supported.
    DataWidth,
    /// Channel number does not exist or was not enabled.
    Channel,
    /// Timeout outside the representable range.
    Timeout,
    /// The driver is already in the Ready state.
    AlreadyInitialized,
    /// The driver is not initialized.
    NotInitialized,
    /// A running watchdog cannot be stopped.
    WatchdogLocked,
}

/// Data-integrity errors reported by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareFault {
    /// Receive FIFO or ADC result overwritten before it was read.
    Overrun,
    Parity,
    Framing,
    /// Break condition on the receive line.
    Break,
    /// No device acknowledged the address.
    AddressNack,
    /// The device did not acknowledge a data byte.
    DataNack,
    ArbitrationLost,
    /// Illegal START/STOP on the bus.
    Bus,
}

impl From<ConfigurationError> for Error {
    fn from(e: ConfigurationError) -> Error {
        Error::Configuration(e)
    }
}

impl From<HardwareFault> for Error {
    fn from(e: HardwareFault) -> Error {
        Error::HardwareFault(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(e) => write!(f, "configuration error: {}", e),
            Error::AlreadyClaimed(pin) => write!(f, "pin {} already claimed", pin),
            Error::ClockLockTimeout => f.write_str("clock did not lock in time"),
            Error::Busy => f.write_str("peripheral busy"),
            Error::HardwareFault(e) => write!(f, "hardware fault: {}", e),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConfigurationError::InvalidPin => "no such pin",
            ConfigurationError::InvalidFunction => "no such pin function",
            ConfigurationError::PinNotRoutable => "pin cannot carry this signal",
            ConfigurationError::OscillatorOutOfRange => "oscillator frequency out of range",
            ConfigurationError::MultiplierOutOfRange => "PLL multiplier out of range",
            ConfigurationError::DividerOutOfRange => "clock divider out of range",
            ConfigurationError::PllOutputOutOfRange => "PLL output frequency out of range",
            ConfigurationError::CpuFrequencyTooHigh => "CPU frequency above 120 MHz",
            ConfigurationError::UsbClockUnachievable => "USB clock cannot be 48 MHz",
            ConfigurationError::ClocksNotConfigured => "clocks not configured",
            ConfigurationError::BaudRate => "baud rate out of range",
            ConfigurationError::Frequency => "frequency out of range",
            ConfigurationError::DataWidth => "data width out of range",
            ConfigurationError::Channel => "invalid channel",
            ConfigurationError::Timeout => "timeout out of range",
            ConfigurationError::AlreadyInitialized => "driver already initialized",
            ConfigurationError::NotInitialized => "driver not initialized",
            ConfigurationError::WatchdogLocked => "watchdog is running",
        };
        f.write_str(msg)
    }
}

impl fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            HardwareFault::Overrun => "overrun",
            HardwareFault::Parity => "parity error",
            HardwareFault::Framing => "framing error",
            HardwareFault::Break => "break condition",
            HardwareFault::AddressNack => "address not acknowledged",
            HardwareFault::DataNack => "data not acknowledged",
            HardwareFault::ArbitrationLost => "arbitration lost",
            HardwareFault::Bus => "bus error",
        };
        f.write_str(msg)
    }
}
