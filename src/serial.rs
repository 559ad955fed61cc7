//! UART0..UART4
//!
//! All five UARTs share the 16550 register set. The baud rate generator
//! divides PCLK by `16 * DL * (1 + DIVADDVAL / MULVAL)`, with DL split over
//! DLL/DLM (visible only while `LCR.DLAB` is set) and the fractional part in
//! FDR. [`divisor`] searches every fractional setting for the one closest to
//! the requested rate.
//!
//! Line status errors (overrun, parity, framing, break) are reported as
//! [`HardwareFault`]s. Reading LSR clears them in hardware, so each is
//! reported exactly once.

use embedded_hal::serial;

use crate::clock::SystemControl;
use crate::error::{ConfigurationError, Error, HardwareFault, Result};
use crate::pac::uart::{UartRegisters, FCR, LCR, LSR, TER};
use crate::peripherals::{Peripheral, PeripheralId};
use crate::pin::{route, ClaimSet, PinMux, Route};
use crate::reg::{self, Readable, Writeable};
use crate::traits::{Driver, SerialPort};

pub mod config;

pub use config::{Config, Mode, Parity, StopBits, WordLength};

/// Largest accepted deviation from the requested baud rate, in parts per
/// million.
pub const BAUD_TOLERANCE_PPM: u32 = 15_000;

/// LSR polls per byte before a blocking transfer gives up with `Busy`.
pub const POLL_LIMIT: u32 = 100_000;

const FIFO_DEPTH: usize = 16;

static TX_ROUTES: [&[Route]; 5] = [
    &[route(0, 2, 1), route(0, 0, 4)],
    &[route(0, 15, 1), route(2, 0, 2), route(3, 16, 3)],
    &[route(0, 10, 1), route(2, 8, 2), route(4, 22, 2)],
    &[route(0, 0, 2), route(0, 25, 3), route(4, 28, 2)],
    &[route(0, 22, 3), route(1, 29, 5), route(5, 4, 4)],
];

static RX_ROUTES: [&[Route]; 5] = [
    &[route(0, 3, 1), route(0, 1, 4)],
    &[route(0, 16, 1), route(2, 1, 2), route(3, 17, 3)],
    &[route(0, 11, 1), route(2, 9, 2), route(4, 23, 2)],
    &[route(0, 1, 2), route(0, 26, 3), route(4, 29, 2)],
    &[route(2, 9, 3), route(5, 3, 4)],
];

fn instance(id: PeripheralId) -> Option<usize> {
    match id {
        PeripheralId::Uart0 => Some(0),
        PeripheralId::Uart1 => Some(1),
        PeripheralId::Uart2 => Some(2),
        PeripheralId::Uart3 => Some(3),
        PeripheralId::Uart4 => Some(4),
        _ => None,
    }
}

/// Baud rate generator setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divisor {
    pub dl: u16,
    pub mulval: u8,
    pub divaddval: u8,
    /// Rate actually produced, in baud.
    pub actual: u32,
    pub error_ppm: u32,
}

/// Finds the divisor closest to `baud` at PCLK `pclk`.
pub fn divisor(pclk: crate::time::Hertz, baud: u32) -> Result<Divisor> {
    if baud == 0 || baud > pclk.0 / 16 {
        return Err(ConfigurationError::BaudRate.into());
    }
    let pclk = pclk.0 as u64;
    let baud = baud as u64;
    let mut best: Option<Divisor> = None;

    for mulval in 1u64..=15 {
        for divaddval in 0..mulval {
            let num = pclk * mulval;
            let den = 16 * baud * (mulval + divaddval);
            let dl = (num + den / 2) / den;
            // The fractional divider needs DL >= 3 to work.
            if dl == 0 || dl > 0xFFFF || (divaddval > 0 && dl < 3) {
                continue;
            }
            let actual_den = 16 * dl * (mulval + divaddval);
            let target = baud as u128 * actual_den as u128;
            let error_ppm = ((num as u128).abs_diff(target) * 1_000_000 / target) as u32;
            if best.map_or(true, |b| error_ppm < b.error_ppm) {
                best = Some(Divisor {
                    dl: dl as u16,
                    mulval: mulval as u8,
                    divaddval: divaddval as u8,
                    actual: (num / actual_den) as u32,
                    error_ppm,
                });
            }
        }
    }

    match best {
        Some(d) if d.error_ppm <= BAUD_TOLERANCE_PPM => Ok(d),
        _ => Err(ConfigurationError::BaudRate.into()),
    }
}

struct Session {
    pins: ClaimSet<2>,
    mode: Mode,
    divisor: Divisor,
    /// Line fault hit after part of a transfer went through. LSR has
    /// already cleared it, so it is held for the next call.
    pending: Option<Error>,
}

pub struct Serial<'a> {
    uart: Peripheral<UartRegisters>,
    syscon: &'a SystemControl,
    pins: &'a PinMux,
    session: Option<Session>,
}

impl<'a> Serial<'a> {
    pub fn new(
        uart: Peripheral<UartRegisters>,
        syscon: &'a SystemControl,
        pins: &'a PinMux,
    ) -> Serial<'a> {
        Serial {
            uart,
            syscon,
            pins,
            session: None,
        }
    }

    /// Programmed baud rate generator setting.
    pub fn divisor(&self) -> Result<Divisor> {
        self.session().map(|s| s.divisor)
    }

    /// Deinitializes and hands back the register block.
    pub fn release(mut self) -> Peripheral<UartRegisters> {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
        self.uart.reissue()
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))
    }

    fn regs(&self) -> &UartRegisters {
        self.uart.regs()
    }

    /// Reads LSR once, turning receive errors into faults.
    fn line_status(&self) -> Result<tock_registers::LocalRegisterCopy<u32, LSR::Register>> {
        let lsr = self.regs().lsr.extract();
        // A break also sets FE, so it is checked first.
        let fault = if lsr.is_set(LSR::OE) {
            HardwareFault::Overrun
        } else if lsr.is_set(LSR::BI) {
            HardwareFault::Break
        } else if lsr.is_set(LSR::PE) {
            HardwareFault::Parity
        } else if lsr.is_set(LSR::FE) {
            HardwareFault::Framing
        } else {
            return Ok(lsr);
        };
        warn!("{:?}: {:?}", self.uart.id(), fault);
        Err(fault.into())
    }

    fn wait_for(&self, flag: tock_registers::fields::Field<u32, LSR::Register>) -> Result<()> {
        let mut status = Ok(());
        let ready = reg::spin_until(POLL_LIMIT, || match self.line_status() {
            Ok(lsr) => lsr.is_set(flag),
            Err(e) => {
                status = Err(e);
                true
            }
        });
        status?;
        if ready {
            Ok(())
        } else {
            Err(Error::Busy)
        }
    }

    fn line_control(config: &Config) -> tock_registers::fields::FieldValue<u32, LCR::Register> {
        let wls = match config.wordlength {
            WordLength::DataBits5 => LCR::WLS::Five,
            WordLength::DataBits6 => LCR::WLS::Six,
            WordLength::DataBits7 => LCR::WLS::Seven,
            WordLength::DataBits8 => LCR::WLS::Eight,
        };
        let sbs = match config.stopbits {
            StopBits::STOP1 => LCR::SBS::One,
            StopBits::STOP2 => LCR::SBS::Two,
        };
        let parity = match config.parity {
            Parity::ParityNone => LCR::PE::CLEAR,
            Parity::ParityOdd => LCR::PE::SET + LCR::PS::Odd,
            Parity::ParityEven => LCR::PE::SET + LCR::PS::Even,
        };
        wls + sbs + parity
    }
}

impl Driver for Serial<'_> {
    type Config = Config;

    fn initialize(&mut self, config: Config) -> Result<()> {
        if self.session.is_some() {
            return Err(ConfigurationError::AlreadyInitialized.into());
        }
        let id = self.uart.id();
        let index = instance(id).ok_or(Error::Configuration(ConfigurationError::PinNotRoutable))?;
        let pclk = self.syscon.clocks()?.peripheral();
        let divisor = divisor(pclk, config.baud)?;
        let claims = self.pins.claim_set(
            [
                Some((TX_ROUTES[index], config.tx)),
                Some((RX_ROUTES[index], config.rx)),
            ],
            id,
        )?;

        self.syscon.enable_peripheral_power(id);
        let regs = self.regs();
        let lcr = Self::line_control(&config);
        regs.iir_fcr
            .write(FCR::FIFOEN::SET + FCR::RXFIFORES::SET + FCR::TXFIFORES::SET);
        regs.lcr.write(lcr + LCR::DLAB::SET);
        regs.rbr_thr.set((divisor.dl & 0xFF) as u32);
        regs.dlm_ier.set((divisor.dl >> 8) as u32);
        reg::barrier();
        regs.lcr.write(lcr);
        regs.dlm_ier.set(0);
        regs.fdr.set((divisor.mulval as u32) << 4 | divisor.divaddval as u32);
        regs.ter.write(TER::TXEN::SET);

        info!(
            "{:?}: {} baud (DL {}, {}/{})",
            id,
            divisor.actual,
            divisor.dl,
            divisor.divaddval,
            divisor.mulval
        );
        self.session = Some(Session {
            pins: claims,
            mode: config.mode,
            divisor,
            pending: None,
        });
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<()> {
        let session = self
            .session
            .take()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))?;
        let id = self.uart.id();
        let regs = self.uart.regs();
        regs.dlm_ier.set(0);
        regs.iir_fcr.set(0);
        regs.lcr.set(0);
        regs.fdr.set(0x10);
        regs.ter.write(TER::TXEN::SET);
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

impl Serial<'_> {
    fn take_pending(&mut self) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))?;
        session.pending.take().map_or(Ok(()), Err)
    }

    /// Reports `done` bytes when some went through before `e`.
    fn partial(&mut self, done: usize, e: Error) -> Result<usize> {
        if done == 0 {
            return Err(e);
        }
        if let (Error::HardwareFault(_), Some(session)) = (e, self.session.as_mut()) {
            session.pending = Some(e);
        }
        Ok(done)
    }
}

impl SerialPort for Serial<'_> {
    /// A `Busy` or fault after the first byte returns the count so far. A
    /// fault is then returned by the next call.
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.take_pending()?;
        let mode = self.session()?.mode;
        match mode {
            Mode::Blocking => {
                for (sent, &byte) in bytes.iter().enumerate() {
                    if let Err(e) = self.wait_for(LSR::THRE) {
                        return self.partial(sent, e);
                    }
                    self.regs().rbr_thr.set(byte as u32);
                }
                Ok(bytes.len())
            }
            Mode::NonBlocking => {
                if !self.line_status()?.is_set(LSR::THRE) {
                    return Ok(0);
                }
                let count = bytes.len().min(FIFO_DEPTH);
                for &byte in &bytes[..count] {
                    self.regs().rbr_thr.set(byte as u32);
                }
                Ok(count)
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.take_pending()?;
        let mode = self.session()?.mode;
        let mut count = 0;
        while count < buf.len() {
            let ready = match mode {
                Mode::Blocking => self.wait_for(LSR::RDR).map(|()| true),
                Mode::NonBlocking => self.line_status().map(|lsr| lsr.is_set(LSR::RDR)),
            };
            match ready {
                Ok(true) => {
                    buf[count] = self.regs().rbr_thr.get() as u8;
                    count += 1;
                }
                Ok(false) => break,
                Err(e) => return self.partial(count, e),
            }
        }
        Ok(count)
    }

    fn flush(&mut self) -> Result<()> {
        self.take_pending()?;
        self.wait_for(LSR::TEMT)
    }
}

impl Drop for Serial<'_> {
    fn drop(&mut self) {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
    }
}

impl serial::Read<u8> for Serial<'_> {
    type Error = Error;

    fn read(&mut self) -> nb::Result<u8, Error> {
        self.session()?;
        if self.line_status()?.is_set(LSR::RDR) {
            Ok(self.regs().rbr_thr.get() as u8)
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl serial::Write<u8> for Serial<'_> {
    type Error = Error;

    fn write(&mut self, word: u8) -> nb::Result<(), Error> {
        self.session()?;
        if self.line_status()?.is_set(LSR::THRE) {
            self.regs().rbr_thr.set(word as u32);
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn flush(&mut self) -> nb::Result<(), Error> {
        self.session()?;
        if self.line_status()?.is_set(LSR::TEMT) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

impl embedded_hal::blocking::serial::write::Default<u8> for Serial<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::PinId;
    use crate::reg::StaticRef;
    use crate::testing::{self, poke};
    use crate::time::{Hertz, U32Ext};
    use proptest::prelude::*;

    const THRE_TEMT: u32 = 1 << 5 | 1 << 6;

    fn uart0() -> (Peripheral<UartRegisters>, StaticRef<UartRegisters>) {
        testing::peripheral(PeripheralId::Uart0)
    }

    fn pins0() -> Config {
        Config::new(PinId::new(0, 2).unwrap(), PinId::new(0, 3).unwrap())
    }

    fn snapshot(regs: &StaticRef<UartRegisters>) -> [u32; 13] {
        unsafe { *(regs.as_ptr() as *const [u32; 13]) }
    }

    #[test]
    fn common_rates_at_60_mhz() {
        for baud in [9_600, 19_200, 57_600, 115_200, 230_400, 460_800] {
            let d = divisor(60.mhz(), baud).unwrap();
            assert!(d.error_ppm <= BAUD_TOLERANCE_PPM, "{} baud: {:?}", baud, d);
            assert!(d.divaddval < d.mulval);
        }
        // 60 MHz / (16 * 115200) = 32.55, which the fractional divider
        // brings within 0.1%.
        assert!(divisor(60.mhz(), 115_200).unwrap().error_ppm < 1_000);
    }

    #[test]
    fn impossible_rates() {
        let rejected = Err(Error::Configuration(ConfigurationError::BaudRate));
        assert_eq!(divisor(60.mhz(), 0), rejected);
        assert_eq!(divisor(60.mhz(), 60_000_000 / 16 + 1), rejected);
        assert_eq!(divisor(60.mhz(), 10), rejected);
    }

    fn pclk_and_baud() -> impl Strategy<Value = (Hertz, u32)> {
        prop_oneof![
            Just(12_000_000u32),
            Just(30_000_000),
            Just(48_000_000),
            Just(60_000_000),
            Just(120_000_000),
        ]
        .prop_flat_map(|pclk| {
            // From the slowest 16-bit divisor up to where DL gets too small
            // for the fractional divider to interpolate.
            let slowest = pclk / (16 * 0xFFFF) + 1;
            (Just(Hertz(pclk)), slowest..=pclk / 96)
        })
    }

    proptest! {
        #[test]
        fn legal_rates_land_within_tolerance((pclk, baud) in pclk_and_baud()) {
            let d = divisor(pclk, baud).unwrap();
            let actual = pclk.0 as f64 * d.mulval as f64
                / (16.0 * d.dl as f64 * (d.mulval as f64 + d.divaddval as f64));
            let error = (actual - baud as f64).abs() / baud as f64;
            prop_assert!(error < (BAUD_TOLERANCE_PPM + 1) as f64 / 1e6);
        }
    }

    #[test]
    fn initialize_programs_divisor_and_format() {
        let syscon = testing::system(5);
        let (pins, iocon) = testing::pin_mux();
        let (uart, regs) = uart0();
        let mut serial = Serial::new(uart, &syscon, &pins);

        serial.initialize(pins0().baud(9_600).parity_even()).unwrap();
        let d = serial.divisor().unwrap();
        assert_eq!(regs.rbr_thr.get(), (d.dl & 0xFF) as u32);
        assert_eq!(regs.lcr.read(LCR::WLS), 3);
        assert_eq!(regs.lcr.read(LCR::PS), 1);
        assert!(regs.lcr.is_set(LCR::PE));
        assert!(!regs.lcr.is_set(LCR::DLAB));
        assert_eq!(
            regs.fdr.get(),
            (d.mulval as u32) << 4 | d.divaddval as u32
        );
        assert!(syscon.is_powered(PeripheralId::Uart0));
        assert_eq!(iocon.pin[2].get() & 0b111, 1);
        assert_eq!(pins.owner(PinId::new(0, 3).unwrap()), Some(PeripheralId::Uart0));
    }

    #[test]
    fn initialized_rate_is_within_tolerance() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let pclk = syscon.clocks().unwrap().peripheral();
        for baud in [19_200, 57_600, 115_200, 460_800, 921_600, 1_875_000, 3_750_000] {
            let (uart, regs) = uart0();
            let mut serial = Serial::new(uart, &syscon, &pins);
            serial.initialize(pins0().baud(baud)).unwrap();

            // DL fits in DLL at these rates.
            let dl = regs.rbr_thr.get() as u64;
            let mulval = (regs.fdr.get() >> 4) as u64;
            let divaddval = (regs.fdr.get() & 0xF) as u64;
            let actual = pclk.0 as u64 * mulval / (16 * dl * (mulval + divaddval));
            let error_ppm = actual.abs_diff(baud as u64) * 1_000_000 / baud as u64;
            assert!(error_ppm <= BAUD_TOLERANCE_PPM as u64, "{} baud -> {}", baud, actual);
        }
        let (uart, _) = uart0();
        let mut serial = Serial::new(uart, &syscon, &pins);
        assert_eq!(
            serial.initialize(pins0().baud(3_000_000)),
            Err(Error::Configuration(ConfigurationError::BaudRate))
        );
    }

    #[test]
    fn reinitialize_reproduces_register_state() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (uart, regs) = uart0();
        let mut serial = Serial::new(uart, &syscon, &pins);

        serial.initialize(pins0()).unwrap();
        let first = snapshot(&regs);
        serial.deinitialize().unwrap();
        assert!(!syscon.is_powered(PeripheralId::Uart0));
        assert_eq!(pins.owner(PinId::new(0, 2).unwrap()), None);
        serial.initialize(pins0()).unwrap();
        assert_eq!(snapshot(&regs), first);
    }

    #[test]
    fn loopback_through_holding_register() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (uart, regs) = uart0();
        let mut serial = Serial::new(uart, &syscon, &pins);
        serial.initialize(pins0()).unwrap();

        poke(reg_ptr!(regs, lsr), THRE_TEMT | 1);
        assert_eq!(SerialPort::write(&mut serial, b"Z"), Ok(1));
        SerialPort::flush(&mut serial).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(SerialPort::read(&mut serial, &mut buf), Ok(1));
        assert_eq!(&buf, b"Z");
        assert_eq!(serial::Read::read(&mut serial), Ok(b'Z'));
    }

    #[test]
    fn line_errors_are_faults() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (uart, regs) = uart0();
        let mut serial = Serial::new(uart, &syscon, &pins);
        serial.initialize(pins0()).unwrap();

        poke(reg_ptr!(regs, lsr), THRE_TEMT | 1 << 1);
        let mut buf = [0u8; 4];
        assert_eq!(
            SerialPort::read(&mut serial, &mut buf),
            Err(Error::HardwareFault(HardwareFault::Overrun))
        );
        poke(reg_ptr!(regs, lsr), THRE_TEMT | 1 << 3);
        assert_eq!(
            serial::Read::read(&mut serial),
            Err(nb::Error::Other(Error::HardwareFault(HardwareFault::Framing)))
        );
        // Break sets FE as well.
        poke(reg_ptr!(regs, lsr), THRE_TEMT | 1 << 4 | 1 << 3);
        assert_eq!(
            serial::Read::read(&mut serial),
            Err(nb::Error::Other(Error::HardwareFault(HardwareFault::Break)))
        );
    }

    #[test]
    fn interrupted_transfers_report_the_partial_count() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (uart, regs) = uart0();
        let mut serial = Serial::new(uart, &syscon, &pins);
        serial.initialize(pins0()).unwrap();
        poke(reg_ptr!(regs, lsr), THRE_TEMT | 1);

        // THR stalled after three bytes: they count, the stall is not kept.
        assert_eq!(serial.partial(3, Error::Busy), Ok(3));
        assert_eq!(SerialPort::write(&mut serial, b"abc"), Ok(3));

        // A fault after two received bytes surfaces on the next call.
        let fault = Error::HardwareFault(HardwareFault::Parity);
        assert_eq!(serial.partial(2, fault), Ok(2));
        let mut buf = [0u8; 2];
        assert_eq!(SerialPort::read(&mut serial, &mut buf), Err(fault));
        assert_eq!(SerialPort::read(&mut serial, &mut buf), Ok(2));

        assert_eq!(serial.partial(0, fault), Err(fault));
    }

    #[test]
    fn blocking_write_times_out_nonblocking_does_not() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (uart, _regs) = uart0();
        let mut serial = Serial::new(uart, &syscon, &pins);

        serial.initialize(pins0()).unwrap();
        assert_eq!(SerialPort::write(&mut serial, b"hi"), Err(Error::Busy));
        assert_eq!(serial::Write::write(&mut serial, b'h'), Err(nb::Error::WouldBlock));

        serial.deinitialize().unwrap();
        serial.initialize(pins0().mode(Mode::NonBlocking)).unwrap();
        assert_eq!(SerialPort::write(&mut serial, b"hi"), Ok(0));
        let mut buf = [0u8; 2];
        assert_eq!(SerialPort::read(&mut serial, &mut buf), Ok(0));
    }

    #[test]
    fn io_needs_initialize() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (uart, _) = uart0();
        let mut serial = Serial::new(uart, &syscon, &pins);
        assert_eq!(
            SerialPort::write(&mut serial, b"x"),
            Err(Error::Configuration(ConfigurationError::NotInitialized))
        );
        assert_eq!(
            serial.initialize(Config::new(PinId::new(1, 0).unwrap(), PinId::new(0, 3).unwrap())),
            Err(Error::Configuration(ConfigurationError::PinNotRoutable))
        );
        assert_eq!(pins.owner(PinId::new(0, 3).unwrap()), None);
    }

    #[test]
    fn clocks_must_be_configured() {
        let (p, _) = testing::peripheral(PeripheralId::Syscon);
        let syscon = SystemControl::new(p);
        let (pins, _) = testing::pin_mux();
        let (uart, _) = uart0();
        let mut serial = Serial::new(uart, &syscon, &pins);
        assert_eq!(
            serial.initialize(pins0()),
            Err(Error::Configuration(ConfigurationError::ClocksNotConfigured))
        );
    }
}
