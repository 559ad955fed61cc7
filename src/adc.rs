//! 12-bit ADC, software-started single conversions.

use embedded_hal::adc::{Channel, OneShot};

use crate::clock::SystemControl;
use crate::error::{ConfigurationError, Error, HardwareFault, Result};
use crate::pac::adc::{AdcRegisters, CR, DR};
use crate::peripherals::{Peripheral, PeripheralId};
use crate::pin::{PinClaim, PinId, PinMode, PinMux, Pull};
use crate::reg::{self, Readable, Writeable};
use crate::time::Hertz;
use crate::traits::{AnalogInput, Driver};

/// Fastest conversion clock the ADC supports.
pub const MAX_CLOCK: Hertz = Hertz(12_400_000);

/// Full-scale raw reading.
pub const FULL_SCALE: u16 = 4095;

pub const POLL_LIMIT: u32 = 100_000;

/// Fixed analog pin and IOCON function of each channel.
static CHANNEL_PINS: [(PinId, u8); 8] = [
    (PinId::at(0, 23), 1),
    (PinId::at(0, 24), 1),
    (PinId::at(0, 25), 1),
    (PinId::at(0, 26), 1),
    (PinId::at(1, 30), 3),
    (PinId::at(1, 31), 3),
    (PinId::at(0, 12), 3),
    (PinId::at(0, 13), 3),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcConfig {
    pub clock: Hertz,
    /// VREFP in millivolts.
    pub vref_mv: u32,
}

impl AdcConfig {
    pub fn clock(mut self, clock: Hertz) -> Self {
        self.clock = clock;
        self
    }

    pub fn vref_mv(mut self, vref_mv: u32) -> Self {
        self.vref_mv = vref_mv;
        self
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        AdcConfig {
            clock: MAX_CLOCK,
            vref_mv: 3300,
        }
    }
}

/// CLKDIV giving the fastest ADC clock not above `clock`.
pub fn clock_divider(pclk: Hertz, clock: Hertz) -> Result<u8> {
    if clock.0 == 0 || clock > MAX_CLOCK {
        return Err(ConfigurationError::Frequency.into());
    }
    let div = (pclk.0 + clock.0 - 1) / clock.0;
    u8::try_from(div.saturating_sub(1)).map_err(|_| ConfigurationError::Frequency.into())
}

struct Session {
    clkdiv: u8,
    vref_mv: u32,
    channels: [Option<PinClaim>; 8],
}

pub struct Adc<'a> {
    adc: Peripheral<AdcRegisters>,
    syscon: &'a SystemControl,
    pins: &'a PinMux,
    session: Option<Session>,
}

impl<'a> Adc<'a> {
    pub fn new(adc: Peripheral<AdcRegisters>, syscon: &'a SystemControl, pins: &'a PinMux) -> Self {
        Adc {
            adc,
            syscon,
            pins,
            session: None,
        }
    }

    pub fn release(mut self) -> Peripheral<AdcRegisters> {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
        self.adc.reissue()
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))
    }

    /// Claims the channel's pin and switches it to analog mode.
    pub fn enable_channel(&mut self, channel: u8) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))?;
        let &(pin, function) = CHANNEL_PINS
            .get(channel as usize)
            .ok_or(Error::Configuration(ConfigurationError::Channel))?;
        if session.channels[channel as usize].is_some() {
            return Ok(());
        }
        let claim = self.pins.claim(pin, function, self.adc.id())?;
        let analog = PinMode::default()
            .pull(Pull::None)
            .hysteresis(false)
            .analog(true);
        if let Err(e) = self.pins.configure(&claim, analog) {
            self.pins.release(claim);
            return Err(e);
        }
        debug!("ADC channel {} on {}", channel, pin);
        session.channels[channel as usize] = Some(claim);
        Ok(())
    }

    /// Releases the channel's pin.
    pub fn disable_channel(&mut self, channel: u8) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))?;
        let claim = session
            .channels
            .get_mut(channel as usize)
            .ok_or(Error::Configuration(ConfigurationError::Channel))?
            .take();
        if let Some(claim) = claim {
            self.pins.release(claim);
        }
        Ok(())
    }

    fn convert(&self, channel: u8) -> Result<u16> {
        let session = self.session()?;
        if session.channels.get(channel as usize).map_or(true, Option::is_none) {
            return Err(ConfigurationError::Channel.into());
        }
        let regs = self.adc.regs();
        let idle = CR::CLKDIV.val(session.clkdiv as u32) + CR::PDN::SET;
        regs.cr
            .write(idle + CR::SEL.val(1 << channel) + CR::START::Now);

        // Reading DR clears DONE, so keep the read that saw it.
        let mut result = regs.dr[channel as usize].extract();
        let done = reg::spin_until(POLL_LIMIT, || {
            result = regs.dr[channel as usize].extract();
            result.is_set(DR::DONE)
        });
        regs.cr.write(idle);
        if !done {
            return Err(Error::Busy);
        }
        if result.is_set(DR::OVERRUN) {
            return Err(HardwareFault::Overrun.into());
        }
        Ok(result.read(DR::RESULT) as u16)
    }
}

impl Driver for Adc<'_> {
    type Config = AdcConfig;

    fn initialize(&mut self, config: AdcConfig) -> Result<()> {
        if self.session.is_some() {
            return Err(ConfigurationError::AlreadyInitialized.into());
        }
        let id = self.adc.id();
        let clkdiv = clock_divider(self.syscon.clocks()?.peripheral(), config.clock)?;

        self.syscon.enable_peripheral_power(id);
        let regs = self.adc.regs();
        regs.inten.set(0);
        regs.cr
            .write(CR::CLKDIV.val(clkdiv as u32) + CR::PDN::SET);

        info!("ADC: CLKDIV {}, vref {} mV", clkdiv, config.vref_mv);
        self.session = Some(Session {
            clkdiv,
            vref_mv: config.vref_mv,
            channels: Default::default(),
        });
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<()> {
        let session = self
            .session
            .take()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))?;
        let id = self.adc.id();
        let regs = self.adc.regs();
        regs.cr.set(0);
        regs.inten.set(0x100);
        self.syscon.reset_peripheral(id);
        self.syscon.disable_peripheral_power(id);
        for claim in session.channels.into_iter().flatten() {
            self.pins.release(claim);
        }
        debug!("ADC deinitialized");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.session.is_some()
    }
}

impl Drop for Adc<'_> {
    fn drop(&mut self) {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
    }
}

impl AnalogInput for Adc<'_> {
    fn sample(&mut self, channel: u8) -> Result<u16> {
        self.convert(channel)
    }

    fn to_millivolts(&self, raw: u16) -> u32 {
        let vref = self.session.as_ref().map_or(0, |s| s.vref_mv);
        raw.min(FULL_SCALE) as u32 * vref / FULL_SCALE as u32
    }
}

/// Type-level channel number for `embedded-hal`'s `OneShot`.
pub struct AdcChannel<const N: u8>;

impl<'a, const N: u8> Channel<Adc<'a>> for AdcChannel<N> {
    type ID = u8;

    fn channel() -> u8 {
        N
    }
}

impl<'a, const N: u8> OneShot<Adc<'a>, u16, AdcChannel<N>> for Adc<'a> {
    type Error = Error;

    fn read(&mut self, _pin: &mut AdcChannel<N>) -> nb::Result<u16, Error> {
        Ok(self.convert(N)?)
    }
}
