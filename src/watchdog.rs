//! Watchdog timer.
//!
//! Clocked from the 500 kHz watchdog oscillator through a fixed /4
//! prescaler. Once started it cannot be stopped by software; only a reset
//! clears it.
//!
//! The `embedded-hal` `Watchdog` and `WatchdogEnable` impls panic on a
//! timeout out of range or a feed before `initialize`, as their signatures
//! carry no error.

use embedded_hal::watchdog::{Watchdog as Feed, WatchdogEnable};

use crate::error::{ConfigurationError, Error, Result};
use crate::pac::wdt::{WdtRegisters, MOD};
use crate::peripherals::Peripheral;
use crate::reg::{Readable, Writeable};
use crate::time::MicroSeconds;
use crate::traits::Driver;

/// Counter rate: 500 kHz / 4.
pub const TICK_HZ: u32 = 125_000;
const US_PER_TICK: u32 = 1_000_000 / TICK_HZ;

const MIN_COUNT: u32 = 0xFF;
const MAX_COUNT: u32 = 0xFF_FFFF;

/// What happens when the counter runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    Reset,
    /// Raise the WDT interrupt and keep running.
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub timeout: MicroSeconds,
    pub action: Action,
}

impl WatchdogConfig {
    /// Resets the chip after `timeout`.
    pub fn new(timeout: MicroSeconds) -> WatchdogConfig {
        WatchdogConfig {
            timeout,
            action: Action::Reset,
        }
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }
}

/// Reload count for `timeout`.
pub fn reload(timeout: MicroSeconds) -> Result<u32> {
    match timeout.0 / US_PER_TICK {
        count @ MIN_COUNT..=MAX_COUNT => Ok(count),
        _ => Err(ConfigurationError::Timeout.into()),
    }
}

struct Session {
    action: Action,
}

pub struct Watchdog {
    wdt: Peripheral<WdtRegisters>,
    session: Option<Session>,
}

impl Watchdog {
    pub fn new(wdt: Peripheral<WdtRegisters>) -> Self {
        Watchdog { wdt, session: None }
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))
    }

    pub fn is_running(&self) -> bool {
        self.wdt.regs().mode.is_set(MOD::WDEN)
    }

    /// True if the last reset was caused by the watchdog.
    pub fn caused_reset(&self) -> bool {
        self.wdt.regs().mode.is_set(MOD::WDTOF)
    }

    /// Enables the counter. There is no way back.
    pub fn start(&mut self) -> Result<()> {
        let action = self.session()?.action;
        let reset = (action == Action::Reset) as u32;
        self.wdt
            .regs()
            .mode
            .write(MOD::WDEN::SET + MOD::WDRESET.val(reset));
        // The counter only starts on the first valid feed.
        Watchdog::feed(self)?;
        info!("watchdog started, {:?} on timeout", action);
        Ok(())
    }

    /// Reloads the counter.
    pub fn feed(&self) -> Result<()> {
        self.session()?;
        let regs = self.wdt.regs();
        // An interrupted sequence would itself trigger the watchdog.
        critical_section::with(|_| {
            regs.feed.set(0xAA);
            regs.feed.set(0x55);
        });
        Ok(())
    }

    /// Time left before the timeout action.
    pub fn remaining(&self) -> Result<MicroSeconds> {
        self.session()?;
        Ok(MicroSeconds(
            self.wdt.regs().tv.get().saturating_mul(US_PER_TICK),
        ))
    }
}

impl Driver for Watchdog {
    type Config = WatchdogConfig;

    fn initialize(&mut self, config: WatchdogConfig) -> Result<()> {
        if self.session.is_some() {
            return Err(ConfigurationError::AlreadyInitialized.into());
        }
        let count = reload(config.timeout)?;
        let regs = self.wdt.regs();
        regs.tc.set(count);
        regs.warnint.set(0);
        regs.window.set(MAX_COUNT);
        debug!("watchdog: {} ticks", count);
        self.session = Some(Session {
            action: config.action,
        });
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<()> {
        self.session()?;
        if self.is_running() {
            return Err(ConfigurationError::WatchdogLocked.into());
        }
        let regs = self.wdt.regs();
        regs.tc.set(MIN_COUNT);
        regs.window.set(MAX_COUNT);
        self.session = None;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.session.is_some()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if self.session.is_some() && !self.is_running() {
            let _ = self.deinitialize();
        }
    }
}

impl Feed for Watchdog {
    fn feed(&mut self) {
        if let Err(e) = Watchdog::feed(self) {
            panic!("watchdog not fed: {:?}", e);
        }
    }
}

impl WatchdogEnable for Watchdog {
    type Time = MicroSeconds;

    fn start<T>(&mut self, period: T)
    where
        T: Into<MicroSeconds>,
    {
        let config = WatchdogConfig::new(period.into());
        let started = self
            .initialize(config)
            .and_then(|()| Watchdog::start(self));
        if let Err(e) = started {
            panic!("watchdog not started: {:?}", e);
        }
    }
}
