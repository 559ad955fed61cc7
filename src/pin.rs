//! Pin multiplexing.
//!
//! Every LPC40xx pin has one IOCON register selecting which peripheral
//! drives it. [`PinMux`] owns IOCON and keeps a claim table so that two
//! drivers can never silently fight over a pin: a claim either succeeds and
//! routes the pin, or fails with [`Error::AlreadyClaimed`] leaving IOCON
//! untouched.
//!
//! Claims are reference counted. A driver re-claiming a pin it already holds
//! with the same function gets a second token; the pin returns to its reset
//! configuration once every token has been released.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use tock_registers::fields::FieldValue;

use crate::error::{ConfigurationError, Error, Result};
use crate::pac::iocon::{IoconRegisters, IOCON};
use crate::peripherals::{Peripheral, PeripheralId};
use crate::reg::Writeable;

const PIN_COUNT: usize = 192;

/// A physical pin, `P<port>.<pin>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    port: u8,
    pin: u8,
}

impl PinId {
    /// Ports 0..=4 have pins 0..=31, port 5 has pins 0..=4.
    pub const fn new(port: u8, pin: u8) -> Result<PinId> {
        let valid = match port {
            0..=4 => pin < 32,
            5 => pin < 5,
            _ => false,
        };
        if valid {
            Ok(PinId { port, pin })
        } else {
            Err(Error::Configuration(ConfigurationError::InvalidPin))
        }
    }

    /// Unchecked constructor for the fixed routing tables below.
    pub(crate) const fn at(port: u8, pin: u8) -> PinId {
        PinId { port, pin }
    }

    pub const fn port(self) -> u8 {
        self.port
    }

    pub const fn pin(self) -> u8 {
        self.pin
    }

    pub(crate) const fn index(self) -> usize {
        self.port as usize * 32 + self.pin as usize
    }

    pub(crate) const fn mask(self) -> u32 {
        1 << self.pin
    }

    /// Type A pins carry ADMODE and the glitch filter.
    pub const fn is_analog_capable(self) -> bool {
        matches!(
            (self.port, self.pin),
            (0, 12) | (0, 13) | (0, 23) | (0, 24) | (0, 25) | (0, 26) | (1, 30) | (1, 31)
        )
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}.{}", self.port, self.pin)
    }
}

/// Pin signal table entry: a pin and the IOCON function carrying the signal.
pub(crate) type Route = (PinId, u8);

pub(crate) const fn route(port: u8, pin: u8, function: u8) -> Route {
    (PinId::at(port, pin), function)
}

/// Looks up the IOCON function that connects `pin` to a signal.
pub(crate) fn function_for(routes: &[Route], pin: PinId) -> Result<u8> {
    routes
        .iter()
        .find(|(p, _)| *p == pin)
        .map(|&(_, function)| function)
        .ok_or(Error::Configuration(ConfigurationError::PinNotRoutable))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    None,
    Up,
    Down,
    /// Keeps the last driven level.
    Repeater,
}

/// Electrical configuration of a claimed pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinMode {
    pub pull: Pull,
    pub hysteresis: bool,
    pub invert: bool,
    pub open_drain: bool,
    pub analog: bool,
}

impl Default for PinMode {
    /// Matches the IOCON reset state.
    fn default() -> Self {
        PinMode {
            pull: Pull::Up,
            hysteresis: true,
            invert: false,
            open_drain: false,
            analog: false,
        }
    }
}

impl PinMode {
    pub fn pull(mut self, pull: Pull) -> Self {
        self.pull = pull;
        self
    }

    pub fn hysteresis(mut self, on: bool) -> Self {
        self.hysteresis = on;
        self
    }

    pub fn invert(mut self, on: bool) -> Self {
        self.invert = on;
        self
    }

    pub fn open_drain(mut self, on: bool) -> Self {
        self.open_drain = on;
        self
    }

    pub fn analog(mut self, on: bool) -> Self {
        self.analog = on;
        self
    }

    fn field_value(self, pin: PinId, function: u8) -> Result<FieldValue<u32, IOCON::Register>> {
        if self.analog && !pin.is_analog_capable() {
            return Err(ConfigurationError::PinNotRoutable.into());
        }
        let mode = match self.pull {
            Pull::None => IOCON::MODE::Inactive,
            Pull::Up => IOCON::MODE::PullUp,
            Pull::Down => IOCON::MODE::PullDown,
            Pull::Repeater => IOCON::MODE::Repeater,
        };
        let mut value = IOCON::FUNC.val(function as u32)
            + mode
            + IOCON::HYS.val(self.hysteresis as u32)
            + IOCON::INV.val(self.invert as u32)
            + IOCON::OD.val(self.open_drain as u32);
        if pin.is_analog_capable() {
            value += if self.analog {
                IOCON::ADMODE::Analog
            } else {
                IOCON::ADMODE::Digital
            };
        }
        Ok(value)
    }
}

/// Proof that a pin is routed to a peripheral. Hand it back to
/// [`PinMux::release`] when done.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a dropped claim keeps the pin reserved"]
pub struct PinClaim {
    pin: PinId,
    function: u8,
    owner: PeripheralId,
}

impl PinClaim {
    pub fn pin(&self) -> PinId {
        self.pin
    }

    pub fn function(&self) -> u8 {
        self.function
    }

    pub fn owner(&self) -> PeripheralId {
        self.owner
    }
}

/// Pins a driver holds together, indexed by signal.
#[derive(Debug)]
#[must_use = "a dropped claim set keeps its pins reserved"]
pub(crate) struct ClaimSet<const N: usize>([Option<PinClaim>; N]);

impl<const N: usize> ClaimSet<N> {
    pub(crate) fn get(&self, signal: usize) -> Option<&PinClaim> {
        self.0.get(signal).and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    owner: PeripheralId,
    function: u8,
}

pub struct PinMux {
    iocon: Peripheral<IoconRegisters>,
    table: Mutex<RefCell<[Option<Entry>; PIN_COUNT]>>,
}

impl PinMux {
    pub fn new(iocon: Peripheral<IoconRegisters>) -> PinMux {
        PinMux {
            iocon,
            table: Mutex::new(RefCell::new([None; PIN_COUNT])),
        }
    }

    /// Routes `pin` to `function` on behalf of `owner`.
    ///
    /// Claiming a pin again for the same owner and function succeeds
    /// without touching IOCON. Either token releases the pin.
    pub fn claim(&self, pin: PinId, function: u8, owner: PeripheralId) -> Result<PinClaim> {
        self.claim_with(pin, function, owner, false)
    }

    /// Like [`claim`](Self::claim), but a pin already in the table is refused
    /// even for the same owner. GPIO drivers share one owner id.
    pub(crate) fn claim_exclusive(
        &self,
        pin: PinId,
        function: u8,
        owner: PeripheralId,
    ) -> Result<PinClaim> {
        self.claim_with(pin, function, owner, true)
    }

    fn claim_with(
        &self,
        pin: PinId,
        function: u8,
        owner: PeripheralId,
        exclusive: bool,
    ) -> Result<PinClaim> {
        if function > 7 {
            return Err(ConfigurationError::InvalidFunction.into());
        }
        critical_section::with(|cs| {
            let mut table = self.table.borrow_ref_mut(cs);
            let slot = &mut table[pin.index()];
            match slot {
                Some(entry) if !exclusive && entry.owner == owner && entry.function == function => {
                    trace!("{} already routed to {:?}", pin, owner);
                }
                Some(entry) => {
                    warn!(
                        "{} held by {:?} (func {}), refused to {:?}",
                        pin,
                        entry.owner,
                        entry.function,
                        owner
                    );
                    return Err(Error::AlreadyClaimed(pin));
                }
                None => {
                    let value = PinMode::default().field_value(pin, function)?;
                    self.iocon.regs().pin[pin.index()].write(value);
                    *slot = Some(Entry { owner, function });
                    trace!("{} -> {:?} func {}", pin, owner, function);
                }
            }
            Ok(PinClaim {
                pin,
                function,
                owner,
            })
        })
    }

    /// Claims `pin` for the signal described by `routes`.
    pub(crate) fn claim_routed(
        &self,
        routes: &[Route],
        pin: PinId,
        owner: PeripheralId,
    ) -> Result<PinClaim> {
        let function = function_for(routes, pin)?;
        self.claim(pin, function, owner)
    }

    /// Claims every requested pin or none of them.
    pub(crate) fn claim_set<const N: usize>(
        &self,
        wanted: [Option<(&[Route], PinId)>; N],
        owner: PeripheralId,
    ) -> Result<ClaimSet<N>> {
        let mut set = ClaimSet(core::array::from_fn(|_| None));
        for (slot, request) in wanted.into_iter().enumerate() {
            let Some((routes, pin)) = request else {
                continue;
            };
            match self.claim_routed(routes, pin, owner) {
                Ok(claim) => set.0[slot] = Some(claim),
                Err(e) => {
                    self.release_set(set);
                    return Err(e);
                }
            }
        }
        Ok(set)
    }

    pub(crate) fn release_set<const N: usize>(&self, set: ClaimSet<N>) {
        for claim in set.0.into_iter().flatten() {
            self.release(claim);
        }
    }

    /// Sets pull, hysteresis, inversion, open drain and analog mode.
    pub fn configure(&self, claim: &PinClaim, mode: PinMode) -> Result<()> {
        let value = mode.field_value(claim.pin, claim.function)?;
        self.iocon.regs().pin[claim.pin.index()].write(value);
        Ok(())
    }

    pub fn release(&self, claim: PinClaim) {
        critical_section::with(|cs| {
            let mut table = self.table.borrow_ref_mut(cs);
            let slot = &mut table[claim.pin.index()];
            match slot {
                Some(entry) if entry.owner == claim.owner && entry.function == claim.function => {}
                // A duplicate token whose twin was already released.
                _ => return,
            }
            *slot = None;
            if let Ok(reset) = PinMode::default().field_value(claim.pin, 0) {
                self.iocon.regs().pin[claim.pin.index()].write(reset);
            }
            trace!("{} released by {:?}", claim.pin, claim.owner);
        });
    }

    pub fn owner(&self, pin: PinId) -> Option<PeripheralId> {
        critical_section::with(|cs| self.table.borrow_ref(cs)[pin.index()].map(|e| e.owner))
    }
}
