//! I2C0..I2C2 as bus master.
//!
//! The LPC40xx I2C block is driven one bus event at a time: after every
//! START, address or data byte the hardware sets `SI` and reports what
//! happened as a status code in `STAT`. [`Transfer`] turns those codes into
//! the next action, independent of any register, and [`I2c`] applies the
//! actions until the transfer completes or fails.
//!
//! NACKs, arbitration loss and bus errors end the transfer with a
//! [`HardwareFault`]. The driver never retries on its own.

use embedded_hal::blocking::i2c::{Read, Write, WriteRead};

use crate::clock::SystemControl;
use crate::error::{ConfigurationError, Error, HardwareFault, Result};
use crate::pac::i2c::{I2cRegisters, CONCLR, CONSET};
use crate::peripherals::{Peripheral, PeripheralId};
use crate::pin::{route, ClaimSet, PinId, PinMode, PinMux, Pull, Route};
use crate::reg::{self, Readable, Writeable};
use crate::time::Hertz;
use crate::traits::Driver;

/// SI polls per bus event before giving up with `Busy`.
pub const POLL_LIMIT: u32 = 100_000;

/// Master-mode status codes.
pub mod status {
    pub const BUS_ERROR: u8 = 0x00;
    pub const START: u8 = 0x08;
    pub const REPEATED_START: u8 = 0x10;
    pub const ADDRESS_WRITE_ACK: u8 = 0x18;
    pub const ADDRESS_WRITE_NACK: u8 = 0x20;
    pub const DATA_WRITTEN_ACK: u8 = 0x28;
    pub const DATA_WRITTEN_NACK: u8 = 0x30;
    pub const ARBITRATION_LOST: u8 = 0x38;
    pub const ADDRESS_READ_ACK: u8 = 0x40;
    pub const ADDRESS_READ_NACK: u8 = 0x48;
    pub const DATA_RECEIVED_ACK: u8 = 0x50;
    pub const DATA_RECEIVED_NACK: u8 = 0x58;
    /// No event pending.
    pub const IDLE: u8 = 0xF8;
}

static SDA_ROUTES: [&[Route]; 3] = [
    &[route(0, 27, 1), route(1, 30, 4), route(5, 2, 5)],
    &[route(0, 0, 3), route(0, 19, 3)],
    &[route(0, 10, 2), route(1, 15, 3), route(4, 20, 4)],
];

static SCL_ROUTES: [&[Route]; 3] = [
    &[route(0, 28, 1), route(1, 31, 4), route(5, 3, 5)],
    &[route(0, 1, 3), route(0, 20, 3)],
    &[route(0, 11, 2), route(4, 21, 4)],
];

fn instance(id: PeripheralId) -> Option<usize> {
    match id {
        PeripheralId::I2c0 => Some(0),
        PeripheralId::I2c1 => Some(1),
        PeripheralId::I2c2 => Some(2),
        _ => None,
    }
}

/// What the driver must do after a bus event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Load the byte into DAT and clear STA.
    Send(u8),
    RepeatedStart,
    /// Receive the next byte, acknowledging it or not.
    Receive { ack: bool },
    /// Issue STOP. The transfer is complete.
    Stop,
    /// The transfer failed. Issue STOP if `stop` is set.
    Fail { fault: HardwareFault, stop: bool },
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Write,
    Read,
}

/// One write, read or write-then-read transaction with a 7-bit address.
pub struct Transfer<'w, 'r> {
    address: u8,
    write: &'w [u8],
    read: &'r mut [u8],
    written: usize,
    received: usize,
    direction: Direction,
}

impl<'w, 'r> Transfer<'w, 'r> {
    pub fn new(address: u8, write: &'w [u8], read: &'r mut [u8]) -> Self {
        // An empty transfer still addresses the device, as a write.
        let direction = if write.is_empty() && !read.is_empty() {
            Direction::Read
        } else {
            Direction::Write
        };
        Transfer {
            address,
            write,
            read,
            written: 0,
            received: 0,
            direction,
        }
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Ack every byte but the last.
    fn ack_next(&self) -> bool {
        self.read.len() - self.received > 1
    }

    fn store(&mut self, data: u8) {
        if let Some(slot) = self.read.get_mut(self.received) {
            *slot = data;
            self.received += 1;
        }
    }

    pub fn advance(&mut self, status: u8, data: u8) -> Step {
        match status {
            status::START | status::REPEATED_START => {
                let rw = (self.direction == Direction::Read) as u8;
                Step::Send(self.address << 1 | rw)
            }
            status::ADDRESS_WRITE_ACK | status::DATA_WRITTEN_ACK => {
                if let Some(&byte) = self.write.get(self.written) {
                    self.written += 1;
                    Step::Send(byte)
                } else if !self.read.is_empty() {
                    self.direction = Direction::Read;
                    Step::RepeatedStart
                } else {
                    Step::Stop
                }
            }
            status::ADDRESS_WRITE_NACK | status::ADDRESS_READ_NACK => Step::Fail {
                fault: HardwareFault::AddressNack,
                stop: true,
            },
            status::DATA_WRITTEN_NACK => Step::Fail {
                fault: HardwareFault::DataNack,
                stop: true,
            },
            status::ARBITRATION_LOST => Step::Fail {
                fault: HardwareFault::ArbitrationLost,
                stop: false,
            },
            status::ADDRESS_READ_ACK => Step::Receive {
                ack: self.ack_next(),
            },
            status::DATA_RECEIVED_ACK => {
                self.store(data);
                Step::Receive {
                    ack: self.ack_next(),
                }
            }
            status::DATA_RECEIVED_NACK => {
                self.store(data);
                Step::Stop
            }
            status::IDLE => Step::Ignore,
            _ => Step::Fail {
                fault: HardwareFault::Bus,
                stop: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cConfig {
    pub sda: PinId,
    pub scl: PinId,
    pub frequency: Hertz,
}

impl I2cConfig {
    /// Standard mode, 100 kHz.
    pub fn new(sda: PinId, scl: PinId) -> I2cConfig {
        I2cConfig {
            sda,
            scl,
            frequency: Hertz(100_000),
        }
    }

    pub fn frequency(mut self, frequency: Hertz) -> Self {
        self.frequency = frequency;
        self
    }
}

/// SCL high and low periods in PCLK cycles.
pub fn duty_cycle(pclk: Hertz, frequency: Hertz) -> Result<u16> {
    if frequency.0 == 0 {
        return Err(ConfigurationError::Frequency.into());
    }
    match pclk.0 / (2 * frequency.0) {
        half @ 4..=0xFFFF => Ok(half as u16),
        _ => Err(ConfigurationError::Frequency.into()),
    }
}

struct Session {
    pins: ClaimSet<2>,
}

pub struct I2c<'a> {
    i2c: Peripheral<I2cRegisters>,
    syscon: &'a SystemControl,
    pins: &'a PinMux,
    session: Option<Session>,
}

impl<'a> I2c<'a> {
    pub fn new(i2c: Peripheral<I2cRegisters>, syscon: &'a SystemControl, pins: &'a PinMux) -> Self {
        I2c {
            i2c,
            syscon,
            pins,
            session: None,
        }
    }

    pub fn release(mut self) -> Peripheral<I2cRegisters> {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
        self.i2c.reissue()
    }

    /// Runs `transfer` to completion.
    pub fn execute(&mut self, transfer: &mut Transfer<'_, '_>) -> Result<()> {
        if self.session.is_none() {
            return Err(ConfigurationError::NotInitialized.into());
        }
        let regs = self.i2c.regs();
        regs.conclr
            .write(CONCLR::SIC::SET + CONCLR::STAC::SET + CONCLR::AAC::SET);
        regs.conset.write(CONSET::STA::SET);

        loop {
            if !reg::spin_until(POLL_LIMIT, || regs.conset.is_set(CONSET::SI)) {
                regs.conset.write(CONSET::STO::SET);
                warn!("{:?}: no bus event, giving up", self.i2c.id());
                return Err(Error::Busy);
            }
            let status = regs.stat.get() as u8;
            let data = regs.dat.get() as u8;
            if let Some(done) = self.respond(transfer, status, data) {
                return done;
            }
        }
    }

    /// Acts on one bus event. `Some` once the transfer is over.
    fn respond(&self, transfer: &mut Transfer<'_, '_>, status: u8, data: u8) -> Option<Result<()>> {
        let regs = self.i2c.regs();
        match transfer.advance(status, data) {
            Step::Send(byte) => {
                regs.dat.set(byte as u32);
                regs.conclr.write(CONCLR::STAC::SET + CONCLR::SIC::SET);
            }
            Step::RepeatedStart => {
                regs.conset.write(CONSET::STA::SET);
                regs.conclr.write(CONCLR::SIC::SET);
            }
            Step::Receive { ack: true } => {
                regs.conset.write(CONSET::AA::SET);
                regs.conclr.write(CONCLR::SIC::SET);
            }
            Step::Receive { ack: false } => {
                regs.conclr.write(CONCLR::AAC::SET + CONCLR::SIC::SET);
            }
            Step::Stop => {
                regs.conset.write(CONSET::STO::SET);
                regs.conclr.write(CONCLR::SIC::SET);
                return Some(Ok(()));
            }
            Step::Fail { fault, stop } => {
                if stop {
                    regs.conset.write(CONSET::STO::SET);
                }
                regs.conclr.write(CONCLR::SIC::SET);
                debug!("{:?}: status {:#x}: {:?}", self.i2c.id(), status, fault);
                return Some(Err(fault.into()));
            }
            Step::Ignore => {}
        }
        None
    }
}

impl Driver for I2c<'_> {
    type Config = I2cConfig;

    fn initialize(&mut self, config: I2cConfig) -> Result<()> {
        if self.session.is_some() {
            return Err(ConfigurationError::AlreadyInitialized.into());
        }
        let id = self.i2c.id();
        let index = instance(id).ok_or(Error::Configuration(ConfigurationError::PinNotRoutable))?;
        let half = duty_cycle(self.syscon.clocks()?.peripheral(), config.frequency)?;
        let claims = self.pins.claim_set(
            [
                Some((SDA_ROUTES[index], config.sda)),
                Some((SCL_ROUTES[index], config.scl)),
            ],
            id,
        )?;
        let open_drain = PinMode::default().pull(Pull::None).open_drain(true);
        let configured = (0..2)
            .filter_map(|signal| claims.get(signal))
            .try_for_each(|claim| self.pins.configure(claim, open_drain));
        if let Err(e) = configured {
            self.pins.release_set(claims);
            return Err(e);
        }

        self.syscon.enable_peripheral_power(id);
        let regs = self.i2c.regs();
        regs.conclr.write(
            CONCLR::AAC::SET + CONCLR::SIC::SET + CONCLR::STAC::SET + CONCLR::I2ENC::SET,
        );
        regs.sclh.set(half as u32);
        regs.scll.set(half as u32);
        regs.conset.write(CONSET::I2EN::SET);

        info!("{:?}: SCL high/low {} cycles", id, half);
        self.session = Some(Session { pins: claims });
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<()> {
        let session = self
            .session
            .take()
            .ok_or(Error::Configuration(ConfigurationError::NotInitialized))?;
        let id = self.i2c.id();
        let regs = self.i2c.regs();
        regs.conclr.write(
            CONCLR::AAC::SET + CONCLR::SIC::SET + CONCLR::STAC::SET + CONCLR::I2ENC::SET,
        );
        regs.sclh.set(4);
        regs.scll.set(4);
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

impl Drop for I2c<'_> {
    fn drop(&mut self) {
        if self.session.is_some() {
            let _ = self.deinitialize();
        }
    }
}

impl Write for I2c<'_> {
    type Error = Error;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<()> {
        self.execute(&mut Transfer::new(address, bytes, &mut []))
    }
}

impl Read for I2c<'_> {
    type Error = Error;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<()> {
        self.execute(&mut Transfer::new(address, &[], buffer))
    }
}

impl WriteRead for I2c<'_> {
    type Error = Error;

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<()> {
        self.execute(&mut Transfer::new(address, bytes, buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::status::*;
    use super::*;
    use crate::pac::iocon::IOCON;
    use crate::testing::{self, peek, poke};
    use crate::time::U32Ext;

    #[test]
    fn write_then_read_with_repeated_start() {
        let mut buf = [0u8; 2];
        let mut t = Transfer::new(0x50, &[0x10], &mut buf);
        assert_eq!(t.advance(START, 0), Step::Send(0xA0));
        assert_eq!(t.advance(ADDRESS_WRITE_ACK, 0), Step::Send(0x10));
        assert_eq!(t.advance(DATA_WRITTEN_ACK, 0), Step::RepeatedStart);
        assert_eq!(t.advance(REPEATED_START, 0), Step::Send(0xA1));
        assert_eq!(t.advance(ADDRESS_READ_ACK, 0), Step::Receive { ack: true });
        assert_eq!(t.advance(DATA_RECEIVED_ACK, 0xDE), Step::Receive { ack: false });
        assert_eq!(t.advance(DATA_RECEIVED_NACK, 0xAD), Step::Stop);
        assert_eq!(t.received(), 2);
        drop(t);
        assert_eq!(buf, [0xDE, 0xAD]);
    }

    #[test]
    fn single_byte_read_is_not_acknowledged() {
        let mut buf = [0u8; 1];
        let mut t = Transfer::new(0x1D, &[], &mut buf);
        assert_eq!(t.advance(START, 0), Step::Send(0x3B));
        assert_eq!(t.advance(ADDRESS_READ_ACK, 0), Step::Receive { ack: false });
        assert_eq!(t.advance(DATA_RECEIVED_NACK, 7), Step::Stop);
        drop(t);
        assert_eq!(buf, [7]);
    }

    #[test]
    fn plain_write_ends_with_stop() {
        let mut t = Transfer::new(0x20, &[1, 2], &mut []);
        assert_eq!(t.advance(START, 0), Step::Send(0x40));
        assert_eq!(t.advance(ADDRESS_WRITE_ACK, 0), Step::Send(1));
        assert_eq!(t.advance(DATA_WRITTEN_ACK, 0), Step::Send(2));
        assert_eq!(t.advance(DATA_WRITTEN_ACK, 0), Step::Stop);
    }

    #[test]
    fn bus_failures() {
        let fail = |fault, stop| Step::Fail { fault, stop };
        let mut t = Transfer::new(0x20, &[1], &mut []);
        assert_eq!(t.advance(ADDRESS_WRITE_NACK, 0), fail(HardwareFault::AddressNack, true));
        assert_eq!(t.advance(ADDRESS_READ_NACK, 0), fail(HardwareFault::AddressNack, true));
        assert_eq!(t.advance(DATA_WRITTEN_NACK, 0), fail(HardwareFault::DataNack, true));
        assert_eq!(t.advance(ARBITRATION_LOST, 0), fail(HardwareFault::ArbitrationLost, false));
        assert_eq!(t.advance(BUS_ERROR, 0), fail(HardwareFault::Bus, true));
        assert_eq!(t.advance(IDLE, 0), Step::Ignore);
    }

    #[test]
    fn duty_cycle_limits() {
        assert_eq!(duty_cycle(60.mhz(), 100.khz()), Ok(300));
        assert_eq!(duty_cycle(60.mhz(), 400.khz()), Ok(75));
        let rejected = Err(Error::Configuration(ConfigurationError::Frequency));
        assert_eq!(duty_cycle(60.mhz(), 0.hz()), rejected);
        assert_eq!(duty_cycle(12.mhz(), 2.mhz()), rejected);
        assert_eq!(duty_cycle(120.mhz(), 500.hz()), rejected);
    }

    fn i2c0_config() -> I2cConfig {
        I2cConfig::new(PinId::new(0, 27).unwrap(), PinId::new(0, 28).unwrap())
    }

    #[test]
    fn initialize_sets_rate_and_open_drain() {
        let syscon = testing::system(5);
        let (pins, iocon) = testing::pin_mux();
        let (p, regs) = testing::peripheral(PeripheralId::I2c0);
        let mut i2c = I2c::new(p, &syscon, &pins);

        i2c.initialize(i2c0_config().frequency(400.khz())).unwrap();
        assert_eq!(regs.sclh.get(), 75);
        assert_eq!(regs.scll.get(), 75);
        assert!(regs.conset.is_set(CONSET::I2EN));
        assert!(iocon.pin[27].is_set(IOCON::OD));
        assert!(iocon.pin[28].is_set(IOCON::OD));
        assert_eq!(iocon.pin[28].read(IOCON::FUNC), 1);

        i2c.deinitialize().unwrap();
        assert_eq!(pins.owner(PinId::new(0, 27).unwrap()), None);
        assert!(!syscon.is_powered(PeripheralId::I2c0));
    }

    #[test]
    fn address_nack_issues_stop() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (p, regs) = testing::peripheral(PeripheralId::I2c0);
        let mut i2c = I2c::new(p, &syscon, &pins);
        i2c.initialize(i2c0_config()).unwrap();

        let mut transfer = Transfer::new(0x42, &[1], &mut []);
        assert_eq!(i2c.respond(&mut transfer, START, 0), None);
        assert_eq!(regs.dat.get(), 0x84);
        assert_eq!(
            i2c.respond(&mut transfer, ADDRESS_WRITE_NACK, 0),
            Some(Err(Error::HardwareFault(HardwareFault::AddressNack)))
        );
        assert!(regs.conset.is_set(CONSET::STO));
        assert_eq!(peek(reg_ptr!(regs, conclr)) & 1 << 3, 1 << 3);
    }

    #[test]
    fn silent_bus_is_busy() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (p, regs) = testing::peripheral(PeripheralId::I2c0);
        let mut i2c = I2c::new(p, &syscon, &pins);
        let mut buf = [0u8; 1];
        assert_eq!(
            i2c.read(0x42, &mut buf),
            Err(Error::Configuration(ConfigurationError::NotInitialized))
        );
        i2c.initialize(i2c0_config()).unwrap();
        assert_eq!(i2c.read(0x42, &mut buf), Err(Error::Busy));
        assert!(regs.conset.is_set(CONSET::STO));
    }

    #[test]
    fn stale_status_without_si_is_not_handled() {
        let syscon = testing::system(5);
        let (pins, _) = testing::pin_mux();
        let (p, regs) = testing::peripheral(PeripheralId::I2c0);
        let mut i2c = I2c::new(p, &syscon, &pins);
        i2c.initialize(i2c0_config()).unwrap();

        poke(reg_ptr!(regs, stat), START as u32);
        assert_eq!(i2c.write(0x42, &[1]), Err(Error::Busy));
        assert_eq!(regs.dat.get(), 0);
    }
}
