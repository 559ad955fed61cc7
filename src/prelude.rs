//! `use lpc40xx_hal::prelude::*;` brings the driver traits, the types every
//! bring-up needs, and the `embedded-hal` traits the drivers implement.
//!
//! The `embedded-hal` serial traits are left out: their `read`/`write`
//! would be ambiguous with [`SerialPort`]'s on the same driver. Import them
//! explicitly where needed.

pub use crate::clock::SystemControl;
pub use crate::gpio::{Gpio, InputConfig, OutputConfig};
pub use crate::time::U32Ext as _;
pub use crate::traits::{
    AnalogInput, CountdownTimer, DigitalInput, DigitalOutput, Driver, Level, SerialPort,
};

pub use embedded_hal::adc::OneShot as _;
pub use embedded_hal::blocking::delay::{DelayMs as _, DelayUs as _};
pub use embedded_hal::blocking::i2c::{Read as _, Write as _, WriteRead as _};
pub use embedded_hal::blocking::spi::{Transfer as _, Write as _};
pub use embedded_hal::digital::v2::{
    InputPin as _, OutputPin as _, StatefulOutputPin as _, ToggleableOutputPin as _,
};
pub use embedded_hal::spi::FullDuplex as _;
pub use embedded_hal::timer::{Cancel as _, CountDown as _};
pub use embedded_hal::watchdog::{Watchdog as _, WatchdogEnable as _};
pub use embedded_hal::PwmPin as _;
