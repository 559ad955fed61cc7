//! Host stand-ins for register blocks.
//!
//! Every block is a leaked, zero-initialised allocation of the real layout,
//! so drivers run unchanged against plain memory. Status bits the hardware
//! would set (PLL lock, UART THRE, ADC DONE) are preset by the test through
//! [`poke`].

use core::mem::MaybeUninit;

use crate::clock::{ClockSource, SystemControl};
use crate::peripherals::{Peripheral, PeripheralId};
use crate::pac::syscon::SysconRegisters;
use crate::pin::PinMux;
use crate::reg::StaticRef;

/// Raw `*mut u32` to a register inside a fake block, bypassing the
/// read-only/write-only split of the typed accessors.
macro_rules! reg_ptr {
    ($block:expr, $($path:tt)+) => {
        unsafe { ::core::ptr::addr_of!((*$block.as_ptr()).$($path)+) as *mut u32 }
    };
}

pub(crate) fn fake<T: 'static>() -> StaticRef<T> {
    let block: &'static mut MaybeUninit<T> = Box::leak(Box::new(MaybeUninit::zeroed()));
    unsafe { StaticRef::new(block.as_ptr()) }
}

pub(crate) fn peripheral<T: 'static>(id: PeripheralId) -> (Peripheral<T>, StaticRef<T>) {
    let regs = fake();
    (unsafe { Peripheral::new(id, regs) }, regs)
}

pub(crate) fn poke(reg: *mut u32, value: u32) {
    unsafe { reg.write_volatile(value) }
}

pub(crate) fn peek(reg: *mut u32) -> u32 {
    unsafe { reg.read_volatile() }
}

/// System control running the 12 MHz IRC through PLL0 with `multiplier`,
/// CPU and peripheral dividers 1.
pub(crate) fn system(multiplier: u8) -> SystemControl {
    let (p, regs) = peripheral::<SysconRegisters>(PeripheralId::Syscon);
    poke(reg_ptr!(regs, pll0stat), 1 << 10);
    let mut syscon = SystemControl::new(p);
    syscon
        .configure_clock(ClockSource::Irc, multiplier, 1)
        .expect("test clock plan");
    syscon
}

pub(crate) fn pin_mux() -> (PinMux, StaticRef<crate::pac::iocon::IoconRegisters>) {
    let (p, regs) = peripheral(PeripheralId::Iocon);
    (PinMux::new(p), regs)
}
