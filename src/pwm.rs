//! Single-edge PWM on PWM0/PWM1.
//!
//! MR0 sets the period in PCLK ticks and resets the counter; channel `n`
//! goes high at the start of the period and low when the counter reaches
//! MRn. Match writes only take effect at the next period, once latched
//! through LER.

use embedded_hal::PwmPin;

use crate::clock::SystemControl;
use crate::error::{ConfigurationError, Error, Result};
use crate::pac::pwm::{PwmRegisters, MCR, TCR};
use crate::peripherals::{Peripheral, PeripheralId};
use crate::pin::{route, ClaimSet, PinId, PinMux, Route};
use crate::reg::{Readable, Writeable};
use crate::time::Hertz;
use crate::traits::Driver;

/// Channels per PWM block, numbered 1..=6.
pub const CHANNELS: usize = 6;

static ROUTES: [[&[Route]; CHANNELS]; 2] = [
    [
        &[route(1, 2, 3)],
        &[route(1, 3, 3)],
        &[route(1, 5, 3)],
        &[route(1, 6, 3)],
        &[route(1, 7, 3)],
        &[route(1, 11, 3)],
    ],
    [
        &[route(1, 18, 2), route(2, 0, 1)],
        &[route(1, 20, 2), route(2, 1, 1)],
        &[route(1, 21, 2), route(2, 2, 1)],
        &[route(1, 23, 2), route(2, 3, 1)],
        &[route(1, 24, 2), route(2, 4, 1)],
        &[route(1, 26, 2), route(2, 5, 1)],
    ],
];

fn instance(id: PeripheralId) -> Option<usize> {
    match id {
        PeripheralId::Pwm0 => Some(0),
        PeripheralId::Pwm1 => Some(1),
        _ => None,
    }
}

/// PWMENA bit of channel `n` in PCR.
const fn output_enable(channel: u8) -> u32 {
    1 << (8 + channel)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmConfig {
    pub frequency: Hertz,
    /// Output pin of channel `i + 1`.
    pub channels: [Option<PinId>; CHANNELS],
    invalid_channel: bool,
}

impl PwmConfig {
    pub fn new(frequency: Hertz) -> PwmConfig {
        PwmConfig {
            frequency,
            channels: [None; CHANNELS],
            invalid_channel: false,
        }
    }

    /// Routes channel `channel` (1..=6) to `pin`.
    pub fn channel(mut self, channel: u8, pin: PinId) -> Self {
        match (channel as usize).checked_sub(1).and_then(|i| self.channels.get_mut(i)) {
            Some(slot) => *slot = Some(pin),
            None => self.invalid_channel = true,
        }
        self
    }
}

/// Period in PCLK ticks.
pub fn period(pclk: Hertz, frequency: Hertz) -> Result<u32> {
    if frequency.0 == 0 {
        return Err(ConfigurationError::Frequency.into());
    }
    match pclk.0 / frequency.0 {
        ticks @ 2.. => Ok(ticks),
        _ => Err(ConfigurationError::Frequency.into()),
    }
}

struct Session {
    pins: ClaimSet<CHANNELS>,
    period: u32,
    /// Bit n set when channel n has a pin.
    routed: u8,
}

pub struct Pwm<'a> {
    pwm: Peripheral<PwmRegisters>,
    syscon: &'a SystemControl,
    pins: &'a PinMux,
    session: Option<Session>,
}

impl<'a> Pwm<'a> {
    pub fn new(pwm: Peripheral<PwmRegisters>, syscon: &'a SystemControl, pins: &'a PinMux) -> Self {
        Pwm {
            pwm,
            syscon,
            pins,
            session: None,
        }
    }

    pub fn release(mut self) -> Peripheral<PwmRegisters> {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
        self.pwm.reissue()
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))
    }

    /// Period in ticks; the largest meaningful duty.
    pub fn period(&self) -> Result<u32> {
        self.session().map(|s| s.period)
    }

    /// Handle on a routed channel.
    pub fn channel(&self, channel: u8) -> Result<PwmChannel<'_>> {
        let session = self.session()?;
        if !(1..=CHANNELS as u8).contains(&channel) || session.routed & 1 << channel == 0 {
            return Err(ConfigurationError::Channel.into());
        }
        Ok(PwmChannel {
            regs: self.pwm.regs(),
            channel,
            period: session.period,
        })
    }

    /// Sets the duty of `channel` in ticks, clamped to the period.
    pub fn set_duty(&self, channel: u8, ticks: u32) -> Result<()> {
        self.channel(channel)?.set_ticks(ticks);
        Ok(())
    }
}

impl Driver for Pwm<'_> {
    type Config = PwmConfig;

    fn initialize(&mut self, config: PwmConfig) -> Result<()> {
        if self.session.is_some() {
            return Err(ConfigurationError::AlreadyInitialized.into());
        }
        if config.invalid_channel {
            return Err(ConfigurationError::Channel.into());
        }
        let id = self.pwm.id();
        let index = instance(id).ok_or(Error::Configuration(ConfigurationError::PinNotRoutable))?;
        let period = period(self.syscon.clocks()?.peripheral(), config.frequency)?;
        let mut wanted = [None; CHANNELS];
        for (i, pin) in config.channels.iter().enumerate() {
            wanted[i] = pin.map(|pin| (ROUTES[index][i], pin));
        }
        let claims = self.pins.claim_set(wanted, id)?;
        let mut routed = 0u8;
        let mut pcr = 0u32;
        for (i, pin) in config.channels.iter().enumerate() {
            if pin.is_some() {
                let channel = i as u8 + 1;
                routed |= 1 << channel;
                pcr |= output_enable(channel);
            }
        }

        self.syscon.enable_peripheral_power(id);
        let regs = self.pwm.regs();
        regs.tcr.write(TCR::CR::SET);
        regs.ctcr.set(0);
        regs.pr.set(0);
        regs.mcr.write(MCR::PWMMR0R::SET);
        regs.mr0_3[0].set(period);
        for mr in regs.mr0_3[1..].iter().chain(regs.mr4_6.iter()) {
            mr.set(0);
        }
        regs.ler.set(0x7F);
        regs.pcr.set(pcr);
        regs.tcr.write(TCR::CE::SET + TCR::PWMEN::SET);

        info!("{:?}: {} Hz, period {} ticks", id, config.frequency.0, period);
        self.session = Some(Session {
            pins: claims,
            period,
            routed,
        });
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<()> {
        let session = self
            .session
            .take()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))?;
        let id = self.pwm.id();
        let regs = self.pwm.regs();
        regs.tcr.set(0);
        regs.pcr.set(0);
        regs.mcr.set(0);
        for mr in regs.mr0_3.iter().chain(regs.mr4_6.iter()) {
            mr.set(0);
        }
        regs.ler.set(0);
        self.syscon.reset_peripheral(id);
        self.syscon.disable_peripheral_power(id);
        self.pins.release_set(session.pins);
        debug!("{:?} deinitialized", id);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.session.is_some()
    }
}

impl Drop for Pwm<'_> {
    fn drop(&mut self) {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
    }
}

/// One output of an initialized [`Pwm`].
pub struct PwmChannel<'p> {
    regs: &'p PwmRegisters,
    channel: u8,
    period: u32,
}

impl PwmChannel<'_> {
    fn match_register(&self) -> &tock_registers::registers::ReadWrite<u32> {
        match self.channel {
            1..=3 => &self.regs.mr0_3[self.channel as usize],
            _ => &self.regs.mr4_6[self.channel as usize - 4],
        }
    }

    fn set_ticks(&self, ticks: u32) {
        self.match_register().set(ticks.min(self.period));
        self.regs.ler.set(1 << self.channel);
    }

    fn set_output(&self, on: bool) {
        let bit = output_enable(self.channel);
        critical_section::with(|_| {
            let pcr = self.regs.pcr.get();
            self.regs.pcr.set(if on { pcr | bit } else { pcr & !bit });
        });
    }
}

impl PwmPin for PwmChannel<'_> {
    type Duty = u32;

    fn disable(&mut self) {
        self.set_output(false);
    }

    fn enable(&mut self) {
        self.set_output(true);
    }

    fn get_duty(&self) -> u32 {
        self.match_register().get()
    }

    fn get_max_duty(&self) -> u32 {
        self.period
    }

    fn set_duty(&mut self, duty: u32) {
        self.set_ticks(duty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use crate::time::U32Ext;

    fn pin(port: u8, pin: u8) -> PinId {
        PinId::new(port, pin).unwrap()
    }

    fn two_channels() -> PwmConfig {
        PwmConfig::new(10.khz())
            .channel(1, pin(2, 0))
            .channel(4, pin(1, 23))
    }

    #[test]
    fn period_bounds() {
        assert_eq!(period(60.mhz(), 10.khz()), Ok(6_000));
        assert_eq!(period(60.mhz(), 30.mhz()), Ok(2));
        let rejected = Err(Error::Configuration(ConfigurationError::Frequency));
        assert_eq!(period(60.mhz(), 40.mhz()), rejected);
        assert_eq!(period(60.mhz(), 0.hz()), rejected);
    }

    #[test]
    fn initialize_enables_routed_outputs() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (p, regs) = testing::peripheral(PeripheralId::Pwm1);
        let mut pwm = Pwm::new(p, &syscon, &pins);

        pwm.initialize(two_channels()).unwrap();
        assert_eq!(regs.mr0_3[0].get(), 6_000);
        assert_eq!(regs.pcr.get(), 1 << 9 | 1 << 12);
        assert!(regs.mcr.is_set(MCR::PWMMR0R));
        assert!(regs.tcr.is_set(TCR::CE) && regs.tcr.is_set(TCR::PWMEN));
        assert_eq!(pins.owner(pin(2, 0)), Some(PeripheralId::Pwm1));
        assert_eq!(pins.owner(pin(1, 23)), Some(PeripheralId::Pwm1));
        assert_eq!(pwm.period(), Ok(6_000));
    }

    #[test]
    fn duty_is_latched_and_clamped() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (p, regs) = testing::peripheral(PeripheralId::Pwm1);
        let mut pwm = Pwm::new(p, &syscon, &pins);
        pwm.initialize(two_channels()).unwrap();

        let mut ch4 = pwm.channel(4).unwrap();
        assert_eq!(ch4.get_max_duty(), 6_000);
        ch4.set_duty(1_500);
        assert_eq!(regs.mr4_6[0].get(), 1_500);
        assert_eq!(regs.ler.get(), 1 << 4);
        ch4.set_duty(u32::MAX);
        assert_eq!(ch4.get_duty(), 6_000);
        ch4.disable();
        assert_eq!(regs.pcr.get(), 1 << 9);
        ch4.enable();
        assert_eq!(regs.pcr.get(), 1 << 9 | 1 << 12);

        pwm.set_duty(1, 3_000).unwrap();
        assert_eq!(regs.mr0_3[1].get(), 3_000);
        assert_eq!(regs.ler.get(), 1 << 1);
    }

    #[test]
    fn channels_must_exist_and_be_routed() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (p, _) = testing::peripheral(PeripheralId::Pwm0);
        let mut pwm = Pwm::new(p, &syscon, &pins);
        let bad = Err(Error::Configuration(ConfigurationError::Channel));

        assert_eq!(pwm.initialize(PwmConfig::new(1.khz()).channel(7, pin(1, 2))), bad);
        assert_eq!(pwm.initialize(PwmConfig::new(1.khz()).channel(0, pin(1, 2))), bad);
        // PWM1 routing is not valid on PWM0.
        assert_eq!(
            pwm.initialize(PwmConfig::new(1.khz()).channel(1, pin(2, 0))),
            Err(Error::Configuration(ConfigurationError::PinNotRoutable))
        );

        pwm.initialize(PwmConfig::new(1.khz()).channel(2, pin(1, 3))).unwrap();
        assert!(pwm.channel(2).is_ok());
        assert!(matches!(pwm.channel(3), Err(Error::Configuration(ConfigurationError::Channel))));
    }

    #[test]
    fn reinitialize_reproduces_register_state() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (p, regs) = testing::peripheral(PeripheralId::Pwm1);
        let mut pwm = Pwm::new(p, &syscon, &pins);
        let snapshot = || {
            (
                regs.tcr.get(),
                regs.mcr.get(),
                regs.mr0_3[0].get(),
                regs.pcr.get(),
                regs.ler.get(),
            )
        };

        pwm.initialize(two_channels()).unwrap();
        pwm.set_duty(1, 10).unwrap();
        pwm.deinitialize().unwrap();
        assert_eq!(snapshot(), (0, 0, 0, 0, 0));
        assert_eq!(pins.owner(pin(2, 0)), None);

        pwm.initialize(two_channels()).unwrap();
        let first = snapshot();
        assert_eq!(regs.mr0_3[1].get(), 0);
        pwm.deinitialize().unwrap();
        pwm.initialize(two_channels()).unwrap();
        assert_eq!(snapshot(), first);
    }
}
