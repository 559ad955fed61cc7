//! SSP0..SSP2 as SPI master.
//!
//! The bit rate is `PCLK / (CPSDVSR * (SCR + 1))` with CPSDVSR even in
//! 2..=254 and SCR in 0..=255. [`prescaler`] picks the fastest setting not
//! above the requested frequency. Frames are 4 to 16 bits wide.

pub use embedded_hal::spi::{FullDuplex, Mode, Phase, Polarity, MODE_0, MODE_1, MODE_2, MODE_3};

use crate::clock::SystemControl;
use crate::error::{ConfigurationError, Error, Result};
use crate::pac::ssp::{SspRegisters, CPSR, CR0, CR1, SR};
use crate::peripherals::{Peripheral, PeripheralId};
use crate::pin::{route, ClaimSet, PinId, PinMux, Route};
use crate::reg::{self, Readable, Writeable};
use crate::time::Hertz;
use crate::traits::Driver;

/// SR polls per frame before a blocking exchange gives up with `Busy`.
pub const POLL_LIMIT: u32 = 100_000;

const FIFO_DEPTH: usize = 8;

static SCK_ROUTES: [&[Route]; 3] = [
    &[route(0, 15, 2), route(1, 20, 5), route(2, 22, 2)],
    &[route(0, 7, 2), route(1, 19, 5)],
    &[route(1, 0, 4), route(5, 2, 2)],
];

static MISO_ROUTES: [&[Route]; 3] = [
    &[route(0, 17, 2), route(1, 23, 5), route(2, 26, 2)],
    &[route(0, 8, 2), route(0, 12, 2)],
    &[route(1, 4, 4), route(5, 1, 2)],
];

static MOSI_ROUTES: [&[Route]; 3] = [
    &[route(0, 18, 2), route(1, 24, 5), route(2, 27, 2)],
    &[route(0, 9, 2), route(0, 13, 2)],
    &[route(1, 1, 4), route(5, 0, 2)],
];

fn instance(id: PeripheralId) -> Option<usize> {
    match id {
        PeripheralId::Ssp0 => Some(0),
        PeripheralId::Ssp1 => Some(1),
        PeripheralId::Ssp2 => Some(2),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prescaler {
    pub cpsdvsr: u8,
    pub scr: u8,
    pub actual: Hertz,
}

/// Fastest bit rate not above `frequency`.
pub fn prescaler(pclk: Hertz, frequency: Hertz) -> Result<Prescaler> {
    if frequency.0 == 0 {
        return Err(ConfigurationError::Frequency.into());
    }
    let mut best: Option<Prescaler> = None;
    let (pclk, target) = (pclk.0 as u64, frequency.0 as u64);
    for cpsdvsr in (2u64..=254).step_by(2) {
        let scr = (pclk + cpsdvsr * target - 1) / (cpsdvsr * target);
        let scr = scr.max(1) - 1;
        if scr > 255 {
            continue;
        }
        let actual = Hertz((pclk / (cpsdvsr * (scr + 1))) as u32);
        if best.map_or(true, |b| actual > b.actual) {
            best = Some(Prescaler {
                cpsdvsr: cpsdvsr as u8,
                scr: scr as u8,
                actual,
            });
        }
    }
    best.ok_or(Error::Configuration(ConfigurationError::Frequency))
}

#[derive(Clone, Copy)]
pub struct SpiConfig {
    pub sck: PinId,
    pub miso: PinId,
    pub mosi: PinId,
    pub frequency: Hertz,
    /// Bits per frame, 4..=16.
    pub data_width: u8,
    pub mode: Mode,
}

impl SpiConfig {
    /// 1 MHz, 8-bit frames, mode 0.
    pub fn new(sck: PinId, miso: PinId, mosi: PinId) -> SpiConfig {
        SpiConfig {
            sck,
            miso,
            mosi,
            frequency: Hertz(1_000_000),
            data_width: 8,
            mode: MODE_0,
        }
    }

    pub fn frequency(mut self, frequency: Hertz) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn data_width(mut self, bits: u8) -> Self {
        self.data_width = bits;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

struct Session {
    pins: ClaimSet<3>,
    prescaler: Prescaler,
    data_width: u8,
}

pub struct Spi<'a> {
    ssp: Peripheral<SspRegisters>,
    syscon: &'a SystemControl,
    pins: &'a PinMux,
    session: Option<Session>,
}

impl<'a> Spi<'a> {
    pub fn new(ssp: Peripheral<SspRegisters>, syscon: &'a SystemControl, pins: &'a PinMux) -> Self {
        Spi {
            ssp,
            syscon,
            pins,
            session: None,
        }
    }

    pub fn frequency(&self) -> Result<Hertz> {
        self.session().map(|s| s.prescaler.actual)
    }

    pub fn data_width(&self) -> Result<u8> {
        self.session().map(|s| s.data_width)
    }

    pub fn release(mut self) -> Peripheral<SspRegisters> {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
        self.ssp.reissue()
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))
    }

    fn wait_for(&self, flag: tock_registers::fields::Field<u32, SR::Register>) -> Result<()> {
        let sr = &self.ssp.regs().sr;
        if reg::spin_until(POLL_LIMIT, || sr.is_set(flag)) {
            Ok(())
        } else {
            Err(Error::Busy)
        }
    }

    /// Sends one frame and returns the frame clocked in at the same time.
    pub fn exchange(&mut self, word: u16) -> Result<u16> {
        self.session()?;
        let regs = self.ssp.regs();
        self.wait_for(SR::TNF)?;
        regs.dr.set(word as u32);
        self.wait_for(SR::RNE)?;
        Ok(regs.dr.get() as u16)
    }

    /// Full-duplex exchange of a whole buffer, in place.
    pub fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<()> {
        for word in words.iter_mut() {
            *word = self.exchange(*word as u16)? as u8;
        }
        Ok(())
    }

    fn drain_receive_fifo(&self) {
        let regs = self.ssp.regs();
        for _ in 0..FIFO_DEPTH {
            if !regs.sr.is_set(SR::RNE) {
                break;
            }
            let _ = regs.dr.get();
        }
    }
}

impl Driver for Spi<'_> {
    type Config = SpiConfig;

    fn initialize(&mut self, config: SpiConfig) -> Result<()> {
        if self.session.is_some() {
            return Err(ConfigurationError::AlreadyInitialized.into());
        }
        if !(4..=16).contains(&config.data_width) {
            return Err(ConfigurationError::DataWidth.into());
        }
        let id = self.ssp.id();
        let index = instance(id).ok_or(Error::Configuration(ConfigurationError::PinNotRoutable))?;
        let prescaler = prescaler(self.syscon.clocks()?.peripheral(), config.frequency)?;
        let claims = self.pins.claim_set(
            [
                Some((SCK_ROUTES[index], config.sck)),
                Some((MISO_ROUTES[index], config.miso)),
                Some((MOSI_ROUTES[index], config.mosi)),
            ],
            id,
        )?;

        self.syscon.enable_peripheral_power(id);
        let regs = self.ssp.regs();
        regs.cr1.set(0);
        regs.cr0.write(
            CR0::DSS.val(config.data_width as u32 - 1)
                + CR0::FRF::Spi
                + CR0::CPOL.val((config.mode.polarity == Polarity::IdleHigh) as u32)
                + CR0::CPHA.val((config.mode.phase == Phase::CaptureOnSecondTransition) as u32)
                + CR0::SCR.val(prescaler.scr as u32),
        );
        regs.cpsr.write(CPSR::CPSDVSR.val(prescaler.cpsdvsr as u32));
        regs.imsc.set(0);
        self.drain_receive_fifo();
        regs.cr1.write(CR1::SSE::SET);

        info!("{:?}: {} Hz, {}-bit frames", id, prescaler.actual.0, config.data_width);
        self.session = Some(Session {
            pins: claims,
            prescaler,
            data_width: config.data_width,
        });
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<()> {
        let session = self
            .session
            .take()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))?;
        let id = self.ssp.id();
        let regs = self.ssp.regs();
        regs.cr1.set(0);
        regs.cr0.set(0);
        regs.cpsr.set(0);
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

impl Drop for Spi<'_> {
    fn drop(&mut self) {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
    }
}

impl Spi<'_> {
    fn try_read(&mut self) -> nb::Result<u16, Error> {
        self.session()?;
        let regs = self.ssp.regs();
        if regs.sr.is_set(SR::RNE) {
            Ok(regs.dr.get() as u16)
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn try_send(&mut self, word: u16) -> nb::Result<(), Error> {
        self.session()?;
        let regs = self.ssp.regs();
        if regs.sr.is_set(SR::TNF) {
            regs.dr.set(word as u32);
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl FullDuplex<u8> for Spi<'_> {
    type Error = Error;

    fn read(&mut self) -> nb::Result<u8, Error> {
        self.try_read().map(|w| w as u8)
    }

    fn send(&mut self, byte: u8) -> nb::Result<(), Error> {
        self.try_send(byte as u16)
    }
}

impl FullDuplex<u16> for Spi<'_> {
    type Error = Error;

    fn read(&mut self) -> nb::Result<u16, Error> {
        self.try_read()
    }

    fn send(&mut self, word: u16) -> nb::Result<(), Error> {
        self.try_send(word)
    }
}

impl embedded_hal::blocking::spi::transfer::Default<u8> for Spi<'_> {}
impl embedded_hal::blocking::spi::write::Default<u8> for Spi<'_> {}
impl embedded_hal::blocking::spi::transfer::Default<u16> for Spi<'_> {}
impl embedded_hal::blocking::spi::write::Default<u16> for Spi<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reg::StaticRef;
    use crate::testing::{self, poke};
    use crate::time::U32Ext;

    const TNF_RNE: u32 = 1 << 1 | 1 << 2;

    fn ssp1() -> (Peripheral<SspRegisters>, StaticRef<SspRegisters>) {
        testing::peripheral(PeripheralId::Ssp1)
    }

    fn pins1() -> SpiConfig {
        SpiConfig::new(
            PinId::new(0, 7).unwrap(),
            PinId::new(0, 8).unwrap(),
            PinId::new(0, 9).unwrap(),
        )
    }

    #[test]
    fn prescaler_never_overshoots() {
        let p = prescaler(60.mhz(), 1.mhz()).unwrap();
        assert_eq!(p.actual, 1.mhz());
        let p = prescaler(60.mhz(), 7.mhz()).unwrap();
        assert!(p.actual <= 7.mhz());
        assert_eq!(p.actual, Hertz(6_000_000));
        assert_eq!(prescaler(60.mhz(), 100.mhz()).unwrap().actual, 30.mhz());
        for f in [400_000, 2_500_000, 12_345_678] {
            let p = prescaler(120.mhz(), Hertz(f)).unwrap();
            assert!(p.actual.0 <= f);
            assert_eq!(p.cpsdvsr % 2, 0);
        }
    }

    #[test]
    fn too_slow_or_zero_is_rejected() {
        let rejected = Err(Error::Configuration(ConfigurationError::Frequency));
        assert_eq!(prescaler(60.mhz(), Hertz(0)), rejected);
        // Slowest possible is 60 MHz / (254 * 256), about 923 Hz.
        assert_eq!(prescaler(60.mhz(), Hertz(900)), rejected);
    }

    #[test]
    fn initialize_programs_frame_format() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (ssp, regs) = ssp1();
        let mut spi = Spi::new(ssp, &syscon, &pins);

        spi.initialize(pins1().data_width(12).mode(MODE_3).frequency(2.mhz()))
            .unwrap();
        assert_eq!(regs.cr0.read(CR0::DSS), 11);
        assert!(regs.cr0.is_set(CR0::CPOL));
        assert!(regs.cr0.is_set(CR0::CPHA));
        assert!(regs.cr1.is_set(CR1::SSE));
        assert!(!regs.cr1.is_set(CR1::MS));
        let p = prescaler(60.mhz(), 2.mhz()).unwrap();
        assert_eq!(regs.cpsr.get(), p.cpsdvsr as u32);
        assert_eq!(regs.cr0.read(CR0::SCR), p.scr as u32);
        assert_eq!(spi.frequency(), Ok(2.mhz()));
        assert_eq!(pins.owner(PinId::new(0, 9).unwrap()), Some(PeripheralId::Ssp1));
    }

    #[test]
    fn data_width_bounds() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (ssp, _) = ssp1();
        let mut spi = Spi::new(ssp, &syscon, &pins);
        for bits in [3, 17] {
            assert_eq!(
                spi.initialize(pins1().data_width(bits)),
                Err(Error::Configuration(ConfigurationError::DataWidth))
            );
        }
        assert_eq!(pins.owner(PinId::new(0, 7).unwrap()), None);
    }

    #[test]
    fn exchange_through_data_register() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (ssp, regs) = ssp1();
        let mut spi = Spi::new(ssp, &syscon, &pins);
        spi.initialize(pins1()).unwrap();

        poke(reg_ptr!(regs, sr), TNF_RNE);
        let mut buf = [0xA5u8, 0x3C];
        spi.transfer_in_place(&mut buf).unwrap();
        assert_eq!(buf, [0xA5, 0x3C]);
        assert_eq!(FullDuplex::<u8>::send(&mut spi, 0x42), Ok(()));
        assert_eq!(FullDuplex::<u8>::read(&mut spi), Ok(0x42));

        poke(reg_ptr!(regs, sr), 0);
        assert_eq!(spi.exchange(1), Err(Error::Busy));
        assert_eq!(FullDuplex::<u8>::read(&mut spi), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn reinitialize_reproduces_register_state() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (ssp, regs) = ssp1();
        let mut spi = Spi::new(ssp, &syscon, &pins);
        let snapshot = || (regs.cr0.get(), regs.cr1.get(), regs.cpsr.get());

        spi.initialize(pins1()).unwrap();
        let first = snapshot();
        spi.deinitialize().unwrap();
        assert_eq!(snapshot(), (0, 0, 0));
        spi.initialize(pins1()).unwrap();
        assert_eq!(snapshot(), first);
    }
}
