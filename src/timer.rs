//! TIMER0..TIMER3 as countdowns and delays.
//!
//! The prescaler is programmed so the counter advances at the configured
//! tick rate. A countdown loads MR0 and lets the match stop and reset the
//! counter, raising MR0INT; nothing is polled in the background.
//!
//! The `embedded-hal` countdown and delay traits have no error channel, so
//! calling them on an uninitialized timer, or with a duration the counter
//! cannot hold, panics.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::timer::{Cancel, CountDown};

use crate::clock::SystemControl;
use crate::error::{ConfigurationError, Error, Result};
use crate::pac::timer::{TimerRegisters, IR, MCR, TCR};
use crate::peripherals::{Peripheral, PeripheralId};
use crate::reg::{Readable, Writeable};
use crate::time::{Hertz, MicroSeconds, MilliSeconds};
use crate::traits::{CountdownTimer, Driver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Counter rate. Must divide PCLK.
    pub tick: Hertz,
}

impl TimerConfig {
    pub fn new(tick: Hertz) -> TimerConfig {
        TimerConfig { tick }
    }
}

impl Default for TimerConfig {
    /// 1 MHz, one tick per microsecond.
    fn default() -> Self {
        TimerConfig::new(Hertz(1_000_000))
    }
}

/// Prescale register value for `tick`.
pub fn prescale(pclk: Hertz, tick: Hertz) -> Result<u32> {
    if tick.0 == 0 || tick > pclk || pclk.0 % tick.0 != 0 {
        return Err(ConfigurationError::Frequency.into());
    }
    Ok(pclk.0 / tick.0 - 1)
}

/// Ticks covering at least `duration`, never zero.
pub fn ticks(tick: Hertz, duration: MicroSeconds) -> Result<u32> {
    let ticks = (duration.0 as u64 * tick.0 as u64 + 999_999) / 1_000_000;
    u32::try_from(ticks.max(1)).map_err(|_| ConfigurationError::Timeout.into())
}

struct Session {
    tick: Hertz,
    armed: bool,
}

pub struct Timer<'a> {
    timer: Peripheral<TimerRegisters>,
    syscon: &'a SystemControl,
    session: Option<Session>,
}

impl<'a> Timer<'a> {
    pub fn new(timer: Peripheral<TimerRegisters>, syscon: &'a SystemControl) -> Self {
        Timer {
            timer,
            syscon,
            session: None,
        }
    }

    pub fn release(mut self) -> Peripheral<TimerRegisters> {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
        self.timer.reissue()
    }

    pub fn tick(&self) -> Result<Hertz> {
        self.session().map(|s| s.tick)
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))
    }

    /// Ticks counted since the last countdown started.
    pub fn elapsed(&self) -> Result<u32> {
        self.session()?;
        Ok(self.timer.regs().tc.get())
    }

    fn arm(&self, ticks: u32) {
        let regs = self.timer.regs();
        regs.tcr.write(TCR::CRST::SET);
        regs.ir.write(IR::MR0INT::SET);
        regs.mr[0].set(ticks);
        regs.tcr.write(TCR::CEN::SET);
    }

    fn expired(&self) -> bool {
        self.timer.regs().ir.is_set(IR::MR0INT)
    }

    /// Busy-waits for `duration`, in chunks if it exceeds the 32-bit counter.
    fn delay(&mut self, duration: MicroSeconds) {
        let tick = match self.session() {
            Ok(session) => session.tick,
            Err(e) => panic!("{:?}: delay failed: {:?}", self.timer.id(), e),
        };
        let mut remaining = (duration.0 as u64 * tick.0 as u64 + 999_999) / 1_000_000;
        while remaining > 0 {
            let chunk = remaining.min(u32::MAX as u64) as u32;
            self.arm(chunk);
            while !self.expired() {
                core::hint::spin_loop();
            }
            remaining -= chunk as u64;
        }
        if let Some(session) = self.session.as_mut() {
            session.armed = false;
        }
    }
}

impl Driver for Timer<'_> {
    type Config = TimerConfig;

    fn initialize(&mut self, config: TimerConfig) -> Result<()> {
        if self.session.is_some() {
            return Err(ConfigurationError::AlreadyInitialized.into());
        }
        let id = self.timer.id();
        let pr = prescale(self.syscon.clocks()?.peripheral(), config.tick)?;

        self.syscon.enable_peripheral_power(id);
        let regs = self.timer.regs();
        regs.tcr.write(TCR::CRST::SET);
        regs.ctcr.set(0);
        regs.pr.set(pr);
        regs.pc.set(0);
        regs.tc.set(0);
        regs.mr[0].set(0);
        regs.mcr.write(MCR::MR0I::SET + MCR::MR0R::SET + MCR::MR0S::SET);
        regs.ir.set(0x3F);
        regs.tcr.set(0);

        info!("{:?}: {} Hz tick", id, config.tick.0);
        self.session = Some(Session {
            tick: config.tick,
            armed: false,
        });
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<()> {
        self.session
            .take()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))?;
        let id = self.timer.id();
        let regs = self.timer.regs();
        regs.tcr.set(0);
        regs.mcr.set(0);
        regs.mr[0].set(0);
        regs.pr.set(0);
        regs.ir.set(0x3F);
        self.syscon.reset_peripheral(id);
        self.syscon.disable_peripheral_power(id);
        debug!("{:?} deinitialized", id);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.session.is_some()
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
    }
}

impl CountdownTimer for Timer<'_> {
    fn start_countdown(&mut self, duration: MicroSeconds) -> Result<()> {
        let ticks = ticks(self.session()?.tick, duration)?;
        self.arm(ticks);
        if let Some(session) = self.session.as_mut() {
            session.armed = true;
        }
        Ok(())
    }

    fn is_expired(&self) -> Result<bool> {
        self.session()?;
        Ok(self.expired())
    }

    fn cancel_countdown(&mut self) -> Result<()> {
        self.session()?;
        let regs = self.timer.regs();
        regs.tcr.write(TCR::CRST::SET);
        regs.ir.write(IR::MR0INT::SET);
        if let Some(session) = self.session.as_mut() {
            session.armed = false;
        }
        Ok(())
    }
}

impl CountDown for Timer<'_> {
    type Time = MicroSeconds;

    fn start<T>(&mut self, count: T)
    where
        T: Into<MicroSeconds>,
    {
        if let Err(e) = self.start_countdown(count.into()) {
            panic!("{:?}: countdown not started: {:?}", self.timer.id(), e);
        }
    }

    /// Returns at once when no countdown is armed.
    fn wait(&mut self) -> nb::Result<(), void::Void> {
        let armed = match self.session() {
            Ok(session) => session.armed,
            Err(e) => panic!("{:?}: wait failed: {:?}", self.timer.id(), e),
        };
        if !armed || self.expired() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl Cancel for Timer<'_> {
    type Error = Error;

    fn cancel(&mut self) -> Result<()> {
        self.cancel_countdown()
    }
}

impl DelayUs<u32> for Timer<'_> {
    fn delay_us(&mut self, us: u32) {
        self.delay(MicroSeconds(us));
    }
}

impl DelayUs<u16> for Timer<'_> {
    fn delay_us(&mut self, us: u16) {
        self.delay(MicroSeconds(us as u32));
    }
}

impl DelayMs<u32> for Timer<'_> {
    fn delay_ms(&mut self, ms: u32) {
        // Split so that the microsecond count cannot saturate.
        for _ in 0..ms / 1_000 {
            self.delay(MicroSeconds(1_000_000));
        }
        self.delay(MicroSeconds::from(MilliSeconds(ms % 1_000)));
    }
}

impl DelayMs<u16> for Timer<'_> {
    fn delay_ms(&mut self, ms: u16) {
        DelayMs::<u32>::delay_ms(self, ms as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, poke};
    use crate::time::U32Ext;

    #[test]
    fn tick_must_divide_pclk() {
        assert_eq!(prescale(60.mhz(), 1.mhz()), Ok(59));
        assert_eq!(prescale(60.mhz(), 60.mhz()), Ok(0));
        let rejected = Err(Error::Configuration(ConfigurationError::Frequency));
        assert_eq!(prescale(60.mhz(), 7.mhz()), rejected);
        assert_eq!(prescale(60.mhz(), 0.hz()), rejected);
        assert_eq!(prescale(60.mhz(), 120.mhz()), rejected);
    }

    #[test]
    fn tick_counts_round_up() {
        assert_eq!(ticks(1.mhz(), 500.us()), Ok(500));
        assert_eq!(ticks(10.khz(), 250.us()), Ok(3));
        assert_eq!(ticks(1.mhz(), 0.us()), Ok(1));
        assert_eq!(ticks(1.mhz(), MicroSeconds(u32::MAX)), Ok(u32::MAX));
        assert_eq!(
            ticks(60.mhz(), MicroSeconds(u32::MAX)),
            Err(Error::Configuration(ConfigurationError::Timeout))
        );
    }

    #[test]
    fn countdown_runs_on_match_zero() {
        let syscon = testing::system(5);
        let (p, regs) = testing::peripheral(PeripheralId::Timer2);
        let mut timer = Timer::new(p, &syscon);
        assert_eq!(
            timer.start_countdown(10.us()),
            Err(Error::Configuration(ConfigurationError::NotInitialized))
        );

        timer.initialize(TimerConfig::default()).unwrap();
        assert_eq!(regs.pr.get(), 59);
        assert!(regs.mcr.is_set(MCR::MR0I) && regs.mcr.is_set(MCR::MR0R) && regs.mcr.is_set(MCR::MR0S));
        assert!(syscon.is_powered(PeripheralId::Timer2));

        timer.start_countdown(1_500.us()).unwrap();
        assert_eq!(regs.mr[0].get(), 1_500);
        assert!(regs.tcr.is_set(TCR::CEN));
        assert!(!regs.tcr.is_set(TCR::CRST));

        // Write-one-to-clear has no memory to act on here; emulate it.
        poke(reg_ptr!(regs, ir), 0);
        assert_eq!(timer.is_expired(), Ok(false));
        assert_eq!(timer.wait(), Err(nb::Error::WouldBlock));
        poke(reg_ptr!(regs, tc), 1_500);
        poke(reg_ptr!(regs, ir), 1);
        assert_eq!(timer.is_expired(), Ok(true));
        assert_eq!(timer.wait(), Ok(()));
        assert_eq!(timer.elapsed(), Ok(1_500));

        timer.cancel().unwrap();
        assert!(regs.tcr.is_set(TCR::CRST));
        assert!(!regs.tcr.is_set(TCR::CEN));
        // Nothing armed, nothing to wait for.
        poke(reg_ptr!(regs, ir), 0);
        assert_eq!(timer.wait(), Ok(()));
    }

    #[test]
    #[should_panic(expected = "countdown not started")]
    fn countdown_beyond_the_counter_panics() {
        let syscon = testing::system(5);
        let (p, regs) = testing::peripheral(PeripheralId::Timer3);
        let mut timer = Timer::new(p, &syscon);
        timer.initialize(TimerConfig::new(60.mhz())).unwrap();
        CountDown::start(&mut timer, MicroSeconds(u32::MAX));
        // Unreachable: a silent failure would leave MR0 unset.
        assert_eq!(regs.mr[0].get(), 0);
    }

    #[test]
    #[should_panic(expected = "delay failed")]
    fn delay_on_an_uninitialized_timer_panics() {
        let syscon = testing::system(5);
        let (p, _) = testing::peripheral(PeripheralId::Timer0);
        let mut timer = Timer::new(p, &syscon);
        timer.delay_us(10u32);
    }

    #[test]
    fn delay_returns_once_matched() {
        let syscon = testing::system(5);
        let (p, regs) = testing::peripheral(PeripheralId::Timer0);
        let mut timer = Timer::new(p, &syscon);
        timer.initialize(TimerConfig::new(10.khz())).unwrap();
        // Arming writes MR0INT, which reads back as set on plain memory.
        timer.delay_ms(3u32);
        assert_eq!(regs.mr[0].get(), 30);
        timer.delay_us(1_000_000u32);
        assert_eq!(regs.mr[0].get(), 10_000);
    }

    #[test]
    fn reinitialize_reproduces_register_state() {
        let syscon = testing::system(5);
        let (p, regs) = testing::peripheral(PeripheralId::Timer1);
        let mut timer = Timer::new(p, &syscon);
        let snapshot = || {
            (
                regs.tcr.get(),
                regs.pr.get(),
                regs.mcr.get(),
                regs.mr[0].get(),
                regs.ctcr.get(),
            )
        };

        timer.initialize(TimerConfig::new(2.mhz())).unwrap();
        let first = snapshot();
        timer.deinitialize().unwrap();
        assert_eq!(snapshot(), (0, 0, 0, 0, 0));
        assert!(!syscon.is_powered(PeripheralId::Timer1));
        timer.initialize(TimerConfig::new(2.mhz())).unwrap();
        assert_eq!(snapshot(), first);
        assert_eq!(
            timer.initialize(TimerConfig::new(2.mhz())),
            Err(Error::Configuration(ConfigurationError::AlreadyInitialized))
        );
    }
}
