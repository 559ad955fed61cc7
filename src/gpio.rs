//! GPIO
//!
//! The fast GPIO block drives all six ports through one register window.
//! [`Gpio`] powers it and is shared by reference; each [`OutputPin`] or
//! [`InputPin`] claims a single pin (IOCON function 0) from the
//! [`PinMux`] and touches only its own bit: `SET`/`CLR` writes are
//! per-bit by construction, and the shared `DIR` register is updated inside
//! a critical section.
//!
//! Deinitializing a pin turns it back into an input and releases the claim.
//! The GPIO block itself stays powered, since other pins may still use it.

use crate::clock::SystemControl;
use crate::error::{ConfigurationError, Error, Result};
use crate::pac::gpio::{GpioRegisters, PortRegisters};
use crate::peripherals::{Peripheral, PeripheralId};
use crate::pin::{PinClaim, PinId, PinMode, PinMux, Pull};
use crate::reg::{Readable, Writeable};
use crate::traits::{DigitalInput, DigitalOutput, Driver};

pub use crate::traits::Level;

pub struct Gpio {
    regs: Peripheral<GpioRegisters>,
}

impl Gpio {
    pub fn new(regs: Peripheral<GpioRegisters>, syscon: &SystemControl) -> Gpio {
        syscon.enable_peripheral_power(PeripheralId::Gpio);
        Gpio { regs }
    }

    fn port(&self, pin: PinId) -> &PortRegisters {
        &self.regs.regs().port[pin.port() as usize]
    }

    fn set_direction(&self, pin: PinId, output: bool) {
        let dir = &self.port(pin).dir;
        critical_section::with(|_| {
            let bits = dir.get();
            dir.set(if output {
                bits | pin.mask()
            } else {
                bits & !pin.mask()
            });
        });
    }

    fn drive(&self, pin: PinId, level: Level) {
        let port = self.port(pin);
        match level {
            Level::High => port.set.set(pin.mask()),
            Level::Low => port.clr.set(pin.mask()),
        }
    }

    fn latch(&self, pin: PinId) -> Level {
        Level::from(self.port(pin).set.get() & pin.mask() != 0)
    }

    fn pad(&self, pin: PinId) -> Level {
        Level::from(self.port(pin).pin.get() & pin.mask() != 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub pin: PinId,
    /// Driven before the pin switches to output.
    pub initial: Level,
    pub open_drain: bool,
}

impl OutputConfig {
    pub fn new(pin: PinId) -> OutputConfig {
        OutputConfig {
            pin,
            initial: Level::Low,
            open_drain: false,
        }
    }

    pub fn initial(mut self, level: Level) -> Self {
        self.initial = level;
        self
    }

    pub fn open_drain(mut self, on: bool) -> Self {
        self.open_drain = on;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputConfig {
    pub pin: PinId,
    pub pull: Pull,
}

impl InputConfig {
    pub fn new(pin: PinId) -> InputConfig {
        InputConfig {
            pin,
            pull: Pull::Up,
        }
    }

    pub fn pull(mut self, pull: Pull) -> Self {
        self.pull = pull;
        self
    }
}

fn claim_gpio(pins: &PinMux, pin: PinId, mode: PinMode) -> Result<PinClaim> {
    let claim = pins.claim_exclusive(pin, 0, PeripheralId::Gpio)?;
    if let Err(e) = pins.configure(&claim, mode) {
        pins.release(claim);
        return Err(e);
    }
    Ok(claim)
}

fn not_initialized() -> Error {
    ConfigurationError::NotInitialized.into()
}

/// A push-pull or open-drain output.
pub struct OutputPin<'a> {
    gpio: &'a Gpio,
    pins: &'a PinMux,
    claim: Option<PinClaim>,
}

impl<'a> OutputPin<'a> {
    pub fn new(gpio: &'a Gpio, pins: &'a PinMux) -> OutputPin<'a> {
        OutputPin {
            gpio,
            pins,
            claim: None,
        }
    }

    fn pin(&self) -> Result<PinId> {
        self.claim
            .as_ref()
            .map(PinClaim::pin)
            .ok_or_else(not_initialized)
    }
}

impl Driver for OutputPin<'_> {
    type Config = OutputConfig;

    fn initialize(&mut self, config: OutputConfig) -> Result<()> {
        if self.claim.is_some() {
            return Err(ConfigurationError::AlreadyInitialized.into());
        }
        let mode = PinMode::default()
            .pull(Pull::None)
            .open_drain(config.open_drain);
        let claim = claim_gpio(self.pins, config.pin, mode)?;
        self.gpio.drive(config.pin, config.initial);
        self.gpio.set_direction(config.pin, true);
        debug!("{} output", config.pin);
        self.claim = Some(claim);
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<()> {
        let claim = self.claim.take().ok_or_else(not_initialized)?;
        self.gpio.set_direction(claim.pin(), false);
        self.pins.release(claim);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.claim.is_some()
    }
}

impl DigitalOutput for OutputPin<'_> {
    fn set_level(&mut self, level: Level) -> Result<()> {
        let pin = self.pin()?;
        self.gpio.drive(pin, level);
        Ok(())
    }

    fn output_level(&self) -> Result<Level> {
        Ok(self.gpio.latch(self.pin()?))
    }
}

impl DigitalInput for OutputPin<'_> {
    /// Level on the pad, which differs from the output level when an open
    /// drain output is held low externally.
    fn read_level(&self) -> Result<Level> {
        Ok(self.gpio.pad(self.pin()?))
    }
}

impl Drop for OutputPin<'_> {
    fn drop(&mut self) {
        if self.claim.is_some() {
            let _ = self.deinitialize();
        }
    }
}

impl embedded_hal::digital::v2::OutputPin for OutputPin<'_> {
    type Error = Error;

    fn set_low(&mut self) -> Result<()> {
        self.set_level(Level::Low)
    }

    fn set_high(&mut self) -> Result<()> {
        self.set_level(Level::High)
    }
}

impl embedded_hal::digital::v2::StatefulOutputPin for OutputPin<'_> {
    fn is_set_high(&self) -> Result<bool> {
        Ok(self.output_level()? == Level::High)
    }

    fn is_set_low(&self) -> Result<bool> {
        Ok(self.output_level()? == Level::Low)
    }
}

impl embedded_hal::digital::v2::toggleable::Default for OutputPin<'_> {}

pub struct InputPin<'a> {
    gpio: &'a Gpio,
    pins: &'a PinMux,
    claim: Option<PinClaim>,
}

impl<'a> InputPin<'a> {
    pub fn new(gpio: &'a Gpio, pins: &'a PinMux) -> InputPin<'a> {
        InputPin {
            gpio,
            pins,
            claim: None,
        }
    }
}

impl Driver for InputPin<'_> {
    type Config = InputConfig;

    fn initialize(&mut self, config: InputConfig) -> Result<()> {
        if self.claim.is_some() {
            return Err(ConfigurationError::AlreadyInitialized.into());
        }
        let claim = claim_gpio(self.pins, config.pin, PinMode::default().pull(config.pull))?;
        self.gpio.set_direction(config.pin, false);
        self.claim = Some(claim);
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<()> {
        let claim = self.claim.take().ok_or_else(not_initialized)?;
        self.pins.release(claim);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.claim.is_some()
    }
}

impl DigitalInput for InputPin<'_> {
    fn read_level(&self) -> Result<Level> {
        let pin = self
            .claim
            .as_ref()
            .map(PinClaim::pin)
            .ok_or_else(not_initialized)?;
        Ok(self.gpio.pad(pin))
    }
}

impl Drop for InputPin<'_> {
    fn drop(&mut self) {
        if self.claim.is_some() {
            let _ = self.deinitialize();
        }
    }
}

impl embedded_hal::digital::v2::InputPin for InputPin<'_> {
    type Error = Error;

    fn is_high(&self) -> Result<bool> {
        Ok(self.read_level()? == Level::High)
    }

    fn is_low(&self) -> Result<bool> {
        Ok(self.read_level()? == Level::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pac::iocon::IOCON;
    use crate::reg::StaticRef;
    use crate::testing::{self, peek, poke};

    fn gpio(syscon: &SystemControl) -> (Gpio, StaticRef<GpioRegisters>) {
        let (p, regs) = testing::peripheral(PeripheralId::Gpio);
        (Gpio::new(p, syscon), regs)
    }

    /// Plays the pad: applies SET/CLR writes to PIN and the output latch.
    fn settle(regs: &StaticRef<GpioRegisters>, port: usize) {
        let set = peek(reg_ptr!(regs, port[port].set));
        let clr = peek(reg_ptr!(regs, port[port].clr));
        let pin = (peek(reg_ptr!(regs, port[port].pin)) | set) & !clr;
        poke(reg_ptr!(regs, port[port].pin), pin);
        poke(reg_ptr!(regs, port[port].set), pin);
        poke(reg_ptr!(regs, port[port].clr), 0);
    }

    #[test]
    fn p1_0_end_to_end() {
        let syscon = testing::system(5);
        let (pins, iocon) = testing::pin_mux();
        let (gpio, regs) = gpio(&syscon);
        assert!(syscon.is_powered(PeripheralId::Gpio));
        let p1_0 = PinId::new(1, 0).unwrap();

        let mut led = OutputPin::new(&gpio, &pins);
        led.initialize(OutputConfig::new(p1_0)).unwrap();
        settle(&regs, 1);
        assert_eq!(led.read_level(), Ok(Level::Low));
        assert_eq!(regs.port[1].dir.get(), 1);
        assert_eq!(iocon.pin[32].read(IOCON::FUNC), 0);

        led.set_level(Level::High).unwrap();
        settle(&regs, 1);
        assert_eq!(led.read_level(), Ok(Level::High));
        assert_eq!(led.output_level(), Ok(Level::High));

        led.set_level(Level::Low).unwrap();
        settle(&regs, 1);
        assert_eq!(led.read_level(), Ok(Level::Low));

        led.toggle_level().unwrap();
        settle(&regs, 1);
        assert_eq!(led.read_level(), Ok(Level::High));

        led.deinitialize().unwrap();
        assert_eq!(regs.port[1].dir.get(), 0);
        assert_eq!(pins.owner(p1_0), None);
        assert_eq!(
            led.set_level(Level::High),
            Err(Error::Configuration(ConfigurationError::NotInitialized))
        );

        let ssp = pins.claim(p1_0, 4, PeripheralId::Ssp2).unwrap();
        pins.release(ssp);
        led.initialize(OutputConfig::new(p1_0)).unwrap();
        assert!(led.is_ready());
    }

    #[test]
    fn reinitialize_reproduces_register_state() {
        let syscon = testing::system(5);
        let (pins, iocon) = testing::pin_mux();
        let (gpio, regs) = gpio(&syscon);
        let config = OutputConfig::new(PinId::new(2, 7).unwrap()).open_drain(true);

        let mut out = OutputPin::new(&gpio, &pins);
        out.initialize(config).unwrap();
        let first = (regs.port[2].dir.get(), iocon.pin[71].get());
        assert_eq!(
            out.initialize(config),
            Err(Error::Configuration(ConfigurationError::AlreadyInitialized))
        );
        out.deinitialize().unwrap();
        out.initialize(config).unwrap();
        assert_eq!((regs.port[2].dir.get(), iocon.pin[71].get()), first);
        assert!(iocon.pin[71].is_set(IOCON::OD));
    }

    #[test]
    fn direction_updates_keep_neighbours() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (gpio, regs) = gpio(&syscon);

        let mut a = OutputPin::new(&gpio, &pins);
        let mut b = OutputPin::new(&gpio, &pins);
        a.initialize(OutputConfig::new(PinId::new(0, 4).unwrap())).unwrap();
        b.initialize(OutputConfig::new(PinId::new(0, 5).unwrap())).unwrap();
        assert_eq!(regs.port[0].dir.get(), 0b11 << 4);
        drop(a);
        assert_eq!(regs.port[0].dir.get(), 1 << 5);
    }

    #[test]
    fn input_reads_pad_with_pull() {
        let syscon = testing::system(5);
        let (pins, iocon) = testing::pin_mux();
        let (gpio, regs) = gpio(&syscon);
        let button = PinId::new(2, 10).unwrap();

        let mut input = InputPin::new(&gpio, &pins);
        input
            .initialize(InputConfig::new(button).pull(Pull::Down))
            .unwrap();
        assert_eq!(iocon.pin[74].read(IOCON::MODE), 1);
        assert_eq!(input.read_level(), Ok(Level::Low));
        poke(reg_ptr!(regs, port[2].pin), 1 << 10);
        assert_eq!(input.read_level(), Ok(Level::High));

        let mut other = OutputPin::new(&gpio, &pins);
        assert_eq!(
            other.initialize(OutputConfig::new(button)),
            Err(Error::AlreadyClaimed(button))
        );
    }
}
