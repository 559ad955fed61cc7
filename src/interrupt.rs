//! Interrupt lines, handler registration and NVIC control.
//!
//! Handlers are plain `fn()` stored in a fixed table with one slot per
//! line. [`Dispatcher::dispatch`] runs the installed handler; an empty slot
//! counts the event and raises [`Fault::UnhandledInterrupt`]. With the `rt`
//! feature every vector points at a trampoline into [`DISPATCHER`].
//!
//! Handlers run with lower and equal priority lines held off by the NVIC and
//! nothing else. State shared with the main context needs a
//! `critical_section::Mutex` or an [`InterruptMask`] around the main
//! context's access.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;

use crate::fault::{self, Fault};
use crate::pac::nvic::NvicRegisters;
use crate::peripherals::Peripheral;
use crate::reg::{Readable, Writeable};

/// Number of vector table entries after the 16 system exceptions.
pub const LINES: usize = 41;

/// Implemented priority bits, in the top of each IPR byte.
pub const PRIORITY_BITS: u8 = 5;

macro_rules! interrupts {
    ($($name:ident = $n:literal,)+) => {
        /// LPC40xx interrupt lines. Line 13 is reserved.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u16)]
        pub enum Interrupt {
            $($name = $n,)+
        }

        impl TryFrom<u16> for Interrupt {
            type Error = u16;

            fn try_from(n: u16) -> Result<Self, u16> {
                match n {
                    $($n => Ok(Interrupt::$name),)+
                    _ => Err(n),
                }
            }
        }
    };
}

interrupts! {
    Wdt = 0,
    Timer0 = 1,
    Timer1 = 2,
    Timer2 = 3,
    Timer3 = 4,
    Uart0 = 5,
    Uart1 = 6,
    Uart2 = 7,
    Uart3 = 8,
    Pwm1 = 9,
    I2c0 = 10,
    I2c1 = 11,
    I2c2 = 12,
    Ssp0 = 14,
    Ssp1 = 15,
    Pll0 = 16,
    Rtc = 17,
    Eint0 = 18,
    Eint1 = 19,
    Eint2 = 20,
    Eint3 = 21,
    Adc = 22,
    Bod = 23,
    Usb = 24,
    Can = 25,
    Dma = 26,
    I2s = 27,
    Ethernet = 28,
    SdCard = 29,
    MotorPwm = 30,
    Qei = 31,
    Pll1 = 32,
    UsbActivity = 33,
    CanActivity = 34,
    Uart4 = 35,
    Ssp2 = 36,
    Lcd = 37,
    Gpio = 38,
    Pwm0 = 39,
    Eeprom = 40,
}

unsafe impl cortex_m::interrupt::InterruptNumber for Interrupt {
    #[inline]
    fn number(self) -> u16 {
        self as u16
    }
}

pub type Handler = fn();

type Slot = Mutex<Cell<Option<Handler>>>;

/// Handler table for every line.
pub struct Dispatcher {
    slots: [Slot; LINES],
    unhandled: AtomicU32,
}

impl Dispatcher {
    pub const fn new() -> Self {
        const EMPTY: Slot = Mutex::new(Cell::new(None));
        Dispatcher {
            slots: [EMPTY; LINES],
            unhandled: AtomicU32::new(0),
        }
    }

    /// Installs `handler`, returning the one it replaces.
    pub fn register(&self, irq: Interrupt, handler: Handler) -> Option<Handler> {
        let previous =
            critical_section::with(|cs| self.slots[irq as usize].borrow(cs).replace(Some(handler)));
        trace!("handler installed for {:?}", irq);
        previous
    }

    /// Empties the slot; the line falls back to the unhandled path.
    pub fn unregister(&self, irq: Interrupt) -> Option<Handler> {
        critical_section::with(|cs| self.slots[irq as usize].borrow(cs).take())
    }

    pub fn is_registered(&self, irq: Interrupt) -> bool {
        critical_section::with(|cs| self.slots[irq as usize].borrow(cs).get().is_some())
    }

    /// Unhandled dispatches since creation.
    pub fn unhandled(&self) -> u32 {
        self.unhandled.load(Ordering::Relaxed)
    }

    pub fn dispatch(&self, irq: Interrupt) {
        let handler = critical_section::with(|cs| self.slots[irq as usize].borrow(cs).get());
        match handler {
            Some(handler) => handler(),
            None => self.trap(irq as u16),
        }
    }

    /// Dispatch by raw vector number, as the vector table sees it.
    pub fn dispatch_number(&self, n: u16) {
        match Interrupt::try_from(n) {
            Ok(irq) => self.dispatch(irq),
            Err(n) => self.trap(n),
        }
    }

    fn trap(&self, n: u16) {
        self.unhandled.fetch_add(1, Ordering::Relaxed);
        warn!("interrupt {} has no handler", n);
        fault::signal(Fault::UnhandledInterrupt(n));
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new()
    }
}

/// The table the vector table dispatches into.
pub static DISPATCHER: Dispatcher = Dispatcher::new();

pub fn register(irq: Interrupt, handler: Handler) -> Option<Handler> {
    DISPATCHER.register(irq, handler)
}

pub fn unregister(irq: Interrupt) -> Option<Handler> {
    DISPATCHER.unregister(irq)
}

#[cfg(feature = "rt")]
mod vectors {
    use super::{DISPATCHER, LINES};

    #[doc(hidden)]
    pub union Vector {
        _handler: unsafe extern "C" fn(),
        _reserved: usize,
    }

    macro_rules! vector_table {
        ($($n:literal)+) => {
            #[doc(hidden)]
            #[link_section = ".vector_table.interrupts"]
            #[no_mangle]
            pub static __INTERRUPTS: [Vector; LINES] = [
                $(Vector {
                    _handler: {
                        extern "C" fn trampoline() {
                            DISPATCHER.dispatch_number($n);
                        }
                        trampoline
                    },
                },)+
            ];
        };
    }

    vector_table!(
        0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20
        21 22 23 24 25 26 27 28 29 30 31 32 33 34 35 36 37 38 39 40
    );
}

/// Enable, pend and priority control of the NVIC.
pub struct Nvic {
    nvic: Peripheral<NvicRegisters>,
}

fn word_bit(irq: Interrupt) -> (usize, u32) {
    let n = irq as usize;
    (n / 32, 1 << (n % 32))
}

impl Nvic {
    pub fn new(nvic: Peripheral<NvicRegisters>) -> Self {
        Nvic { nvic }
    }

    pub fn release(self) -> Peripheral<NvicRegisters> {
        self.nvic
    }

    /// # Safety
    ///
    /// Unmasking can break critical sections built on masking this line.
    pub unsafe fn enable(&self, irq: Interrupt) {
        let (word, bit) = word_bit(irq);
        self.nvic.regs().iser[word].set(bit);
    }

    pub fn disable(&self, irq: Interrupt) {
        let (word, bit) = word_bit(irq);
        self.nvic.regs().icer[word].set(bit);
        crate::reg::barrier();
    }

    pub fn is_enabled(&self, irq: Interrupt) -> bool {
        let (word, bit) = word_bit(irq);
        self.nvic.regs().iser[word].get() & bit != 0
    }

    pub fn pend(&self, irq: Interrupt) {
        let (word, bit) = word_bit(irq);
        self.nvic.regs().ispr[word].set(bit);
    }

    pub fn unpend(&self, irq: Interrupt) {
        let (word, bit) = word_bit(irq);
        self.nvic.regs().icpr[word].set(bit);
    }

    pub fn is_pending(&self, irq: Interrupt) -> bool {
        let (word, bit) = word_bit(irq);
        self.nvic.regs().ispr[word].get() & bit != 0
    }

    /// 0 is the most urgent. Only the low five bits of `priority` are used.
    pub fn set_priority(&self, irq: Interrupt, priority: u8) {
        let mask = (1 << PRIORITY_BITS) - 1;
        self.nvic.regs().ipr[irq as usize].set((priority & mask) << (8 - PRIORITY_BITS));
    }

    pub fn priority(&self, irq: Interrupt) -> u8 {
        self.nvic.regs().ipr[irq as usize].get() >> (8 - PRIORITY_BITS)
    }

    /// Disables `irq` until the guard drops, then re-enables it if it was
    /// enabled before.
    pub fn mask(&self, irq: Interrupt) -> InterruptMask<'_> {
        let was_enabled = self.is_enabled(irq);
        self.disable(irq);
        InterruptMask {
            nvic: self,
            irq,
            was_enabled,
        }
    }
}

/// Scoped mask of one interrupt line.
#[must_use = "the line is unmasked again when the guard drops"]
pub struct InterruptMask<'n> {
    nvic: &'n Nvic,
    irq: Interrupt,
    was_enabled: bool,
}

impl InterruptMask<'_> {
    pub fn irq(&self) -> Interrupt {
        self.irq
    }
}

impl Drop for InterruptMask<'_> {
    fn drop(&mut self) {
        if self.was_enabled {
            // Safety: restores the state found when the mask was taken.
            unsafe { self.nvic.enable(self.irq) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultKind;
    use crate::peripherals::PeripheralId;
    use crate::testing::{self, peek, poke};
    use cortex_m::interrupt::InterruptNumber;

    #[test]
    fn numbers_round_trip() {
        for n in 0..LINES as u16 {
            match Interrupt::try_from(n) {
                Ok(irq) => assert_eq!(irq.number(), n),
                Err(_) => assert_eq!(n, 13),
            }
        }
        assert_eq!(Interrupt::try_from(41), Err(41));
        assert_eq!(Interrupt::Eeprom as usize, LINES - 1);
    }

    static HITS: AtomicU32 = AtomicU32::new(0);

    fn count_hit() {
        HITS.fetch_add(1, Ordering::SeqCst);
    }

    fn other() {}

    #[test]
    fn registered_handler_runs_once_per_dispatch() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.register(Interrupt::Timer2, count_hit).is_none());
        assert!(dispatcher.is_registered(Interrupt::Timer2));

        dispatcher.dispatch(Interrupt::Timer2);
        dispatcher.dispatch_number(3);
        assert_eq!(HITS.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.unhandled(), 0);

        assert!(dispatcher.register(Interrupt::Timer2, other).is_some());
        dispatcher.dispatch(Interrupt::Timer2);
        assert_eq!(HITS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_slot_signals_fault() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(Interrupt::Uart3, other);
        assert!(dispatcher.unregister(Interrupt::Uart3).is_some());
        assert!(dispatcher.unregister(Interrupt::Uart3).is_none());

        let before = fault::count(FaultKind::UnhandledInterrupt);
        dispatcher.dispatch(Interrupt::Uart3);
        dispatcher.dispatch_number(13);
        assert_eq!(dispatcher.unhandled(), 2);
        assert!(fault::count(FaultKind::UnhandledInterrupt) >= before + 2);
    }

    #[test]
    fn nvic_bits_and_priorities() {
        let (p, regs) = testing::peripheral(PeripheralId::Nvic);
        let nvic = Nvic::new(p);

        unsafe { nvic.enable(Interrupt::Gpio) };
        assert_eq!(regs.iser[1].get(), 1 << 6);
        assert!(nvic.is_enabled(Interrupt::Gpio));
        nvic.disable(Interrupt::Uart0);
        assert_eq!(regs.icer[0].get(), 1 << 5);

        nvic.pend(Interrupt::Wdt);
        assert!(nvic.is_pending(Interrupt::Wdt));
        nvic.unpend(Interrupt::Wdt);
        assert_eq!(regs.icpr[0].get(), 1);

        nvic.set_priority(Interrupt::Adc, 3);
        assert_eq!(regs.ipr[22].get(), 3 << 3);
        assert_eq!(nvic.priority(Interrupt::Adc), 3);
    }

    #[test]
    fn mask_restores_previous_state() {
        let (p, regs) = testing::peripheral(PeripheralId::Nvic);
        let nvic = Nvic::new(p);
        let iser0 = reg_ptr!(regs, iser[0]);

        unsafe { nvic.enable(Interrupt::Timer0) };
        {
            let guard = nvic.mask(Interrupt::Timer0);
            assert_eq!(guard.irq(), Interrupt::Timer0);
            assert_eq!(regs.icer[0].get(), 1 << 1);
            // What ICER would do to the enable state.
            poke(iser0, 0);
        }
        assert_eq!(peek(iser0), 1 << 1);

        poke(iser0, 0);
        {
            let _guard = nvic.mask(Interrupt::Timer1);
        }
        assert_eq!(peek(iser0), 0);
    }
}
