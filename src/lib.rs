//! [Hardware Abstraction Layer](https://crates.io/crates/embedded-hal) (HAL)
//! for the NXP LPC40xx family of µ-controllers (LPC4072, LPC4074, LPC4076,
//! LPC4078, LPC4088).
//!
//! Start from [`Peripherals::take`], configure the clocks through
//! [`clock::SystemControl`], hand the IOCON block to a [`pin::PinMux`] and
//! build drivers borrowing both. Every driver follows the
//! [`traits::Driver`] lifecycle and reports failures as [`Error`].
//!
//! # Features
//!
//! - `lpc4072` .. `lpc4088`: target variant, selects `memory.x` and the FPU
//!   check in the build script. LPC4088 when none is given.
//! - `rt`: interrupt vector table for `cortex-m-rt`, dispatching into
//!   [`interrupt::DISPATCHER`].
//! - `critical-section-single-core`: use `cortex-m`'s critical section.
//! - `log` / `defmt`: driver logging.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

#[cfg(test)]
#[macro_use]
mod testing;

pub mod adc;
pub mod clock;
pub mod error;
pub mod fault;
pub mod gpio;
pub mod i2c;
pub mod interrupt;
pub mod pac;
pub mod peripherals;
pub mod pin;
mod power;
pub mod prelude;
pub mod pwm;
pub mod reg;
pub mod serial;
pub mod spi;
pub mod time;
pub mod timer;
pub mod traits;
pub mod variant;
pub mod watchdog;

pub use crate::error::{Error, Result};
pub use crate::peripherals::Peripherals;
