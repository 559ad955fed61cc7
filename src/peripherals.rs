//! Peripheral identities and the one-time handout of register handles.
//!
//! Bring-up order is clocks, then pin multiplexing, then drivers:
//!
//! ```no_run
//! use lpc40xx_hal::prelude::*;
//! use lpc40xx_hal::{clock::ClockSource, pin::{PinId, PinMux}, gpio::OutputPin};
//!
//! let p = lpc40xx_hal::Peripherals::take().unwrap();
//! let mut syscon = SystemControl::new(p.syscon);
//! syscon.configure_clock(ClockSource::Irc, 10, 1).unwrap(); // 120 MHz
//! let pins = PinMux::new(p.iocon);
//! let gpio = Gpio::new(p.gpio, &syscon);
//!
//! let mut led = OutputPin::new(&gpio, &pins);
//! led.initialize(OutputConfig::new(PinId::new(1, 18).unwrap())).unwrap();
//! led.set_level(Level::High).unwrap();
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

use crate::clock::SystemControl;
use crate::interrupt::Interrupt;
use crate::pac::{self, adc, gpio, i2c, iocon, nvic, pwm, ssp, syscon, timer, uart, wdt};
use crate::reg::StaticRef;

/// Every peripheral the HAL drives, also used as the owner tag of pin claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralId {
    Syscon,
    Iocon,
    Nvic,
    Gpio,
    Watchdog,
    Timer0,
    Timer1,
    Timer2,
    Timer3,
    Uart0,
    Uart1,
    Uart2,
    Uart3,
    Uart4,
    Pwm0,
    Pwm1,
    I2c0,
    I2c1,
    I2c2,
    Ssp0,
    Ssp1,
    Ssp2,
    Adc,
}

impl PeripheralId {
    /// Bit in PCONP (and RSTCON0) gating this peripheral, if any.
    pub const fn pconp_bit(self) -> Option<u8> {
        let bit = match self {
            PeripheralId::Timer0 => 1,
            PeripheralId::Timer1 => 2,
            PeripheralId::Uart0 => 3,
            PeripheralId::Uart1 => 4,
            PeripheralId::Pwm0 => 5,
            PeripheralId::Pwm1 => 6,
            PeripheralId::I2c0 => 7,
            PeripheralId::Uart4 => 8,
            PeripheralId::Ssp1 => 10,
            PeripheralId::Adc => 12,
            PeripheralId::Gpio => 15,
            PeripheralId::I2c1 => 19,
            PeripheralId::Ssp2 => 20,
            PeripheralId::Ssp0 => 21,
            PeripheralId::Timer2 => 22,
            PeripheralId::Timer3 => 23,
            PeripheralId::Uart2 => 24,
            PeripheralId::Uart3 => 25,
            PeripheralId::I2c2 => 26,
            PeripheralId::Syscon
            | PeripheralId::Iocon
            | PeripheralId::Nvic
            | PeripheralId::Watchdog => return None,
        };
        Some(bit)
    }

    pub const fn interrupt(self) -> Option<Interrupt> {
        let irq = match self {
            PeripheralId::Watchdog => Interrupt::Wdt,
            PeripheralId::Timer0 => Interrupt::Timer0,
            PeripheralId::Timer1 => Interrupt::Timer1,
            PeripheralId::Timer2 => Interrupt::Timer2,
            PeripheralId::Timer3 => Interrupt::Timer3,
            PeripheralId::Uart0 => Interrupt::Uart0,
            PeripheralId::Uart1 => Interrupt::Uart1,
            PeripheralId::Uart2 => Interrupt::Uart2,
            PeripheralId::Uart3 => Interrupt::Uart3,
            PeripheralId::Uart4 => Interrupt::Uart4,
            PeripheralId::Pwm0 => Interrupt::Pwm0,
            PeripheralId::Pwm1 => Interrupt::Pwm1,
            PeripheralId::I2c0 => Interrupt::I2c0,
            PeripheralId::I2c1 => Interrupt::I2c1,
            PeripheralId::I2c2 => Interrupt::I2c2,
            PeripheralId::Ssp0 => Interrupt::Ssp0,
            PeripheralId::Ssp1 => Interrupt::Ssp1,
            PeripheralId::Ssp2 => Interrupt::Ssp2,
            PeripheralId::Adc => Interrupt::Adc,
            PeripheralId::Gpio => Interrupt::Gpio,
            PeripheralId::Syscon | PeripheralId::Iocon | PeripheralId::Nvic => return None,
        };
        Some(irq)
    }
}

/// Exclusive handle on one peripheral's register block.
///
/// Handles are not `Clone`: holding one is proof of sole write access.
#[derive(Debug)]
pub struct Peripheral<R: 'static> {
    id: PeripheralId,
    regs: StaticRef<R>,
}

impl<R> Peripheral<R> {
    /// # Safety
    ///
    /// `regs` must point at the register block of `id`, and no other
    /// `Peripheral` for the same block may be alive.
    pub const unsafe fn new(id: PeripheralId, regs: StaticRef<R>) -> Self {
        Peripheral { id, regs }
    }

    pub fn id(&self) -> PeripheralId {
        self.id
    }

    pub(crate) fn regs(&self) -> &R {
        &self.regs
    }

    /// Re-issues the handle; used by drivers handing it back on release.
    pub(crate) fn reissue(&self) -> Self {
        Peripheral {
            id: self.id,
            regs: self.regs,
        }
    }
}

macro_rules! peripherals {
    ($($field:ident: $regs:ty = ($id:ident, $base:ident),)+) => {
        /// All LPC40xx peripherals the HAL drives.
        #[allow(missing_docs)]
        pub struct Peripherals {
            $(pub $field: Peripheral<$regs>,)+
        }

        impl Peripherals {
            /// Hands out the peripherals once; later calls return `None`.
            pub fn take() -> Option<Self> {
                if TAKEN.swap(true, Ordering::AcqRel) {
                    None
                } else {
                    Some(unsafe { Self::steal() })
                }
            }

            /// # Safety
            ///
            /// Creates handles regardless of whether they were already
            /// taken, breaking exclusive ownership.
            pub unsafe fn steal() -> Self {
                Peripherals {
                    $($field: Peripheral::new(PeripheralId::$id, pac::$base),)+
                }
            }
        }
    };
}

static TAKEN: AtomicBool = AtomicBool::new(false);

peripherals! {
    syscon: syscon::SysconRegisters = (Syscon, SYSCON),
    iocon: iocon::IoconRegisters = (Iocon, IOCON),
    nvic: nvic::NvicRegisters = (Nvic, NVIC),
    gpio: gpio::GpioRegisters = (Gpio, GPIO),
    wdt: wdt::WdtRegisters = (Watchdog, WDT),
    timer0: timer::TimerRegisters = (Timer0, TIMER0),
    timer1: timer::TimerRegisters = (Timer1, TIMER1),
    timer2: timer::TimerRegisters = (Timer2, TIMER2),
    timer3: timer::TimerRegisters = (Timer3, TIMER3),
    uart0: uart::UartRegisters = (Uart0, UART0),
    uart1: uart::UartRegisters = (Uart1, UART1),
    uart2: uart::UartRegisters = (Uart2, UART2),
    uart3: uart::UartRegisters = (Uart3, UART3),
    uart4: uart::UartRegisters = (Uart4, UART4),
    pwm0: pwm::PwmRegisters = (Pwm0, PWM0),
    pwm1: pwm::PwmRegisters = (Pwm1, PWM1),
    i2c0: i2c::I2cRegisters = (I2c0, I2C0),
    i2c1: i2c::I2cRegisters = (I2c1, I2C1),
    i2c2: i2c::I2cRegisters = (I2c2, I2C2),
    ssp0: ssp::SspRegisters = (Ssp0, SSP0),
    ssp1: ssp::SspRegisters = (Ssp1, SSP1),
    ssp2: ssp::SspRegisters = (Ssp2, SSP2),
    adc: adc::AdcRegisters = (Adc, ADC),
}

/// Convenience alias for the handle type `SystemControl::new` consumes.
pub type SysconPeripheral = Peripheral<syscon::SysconRegisters>;

impl From<SysconPeripheral> for SystemControl {
    fn from(p: SysconPeripheral) -> Self {
        SystemControl::new(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_hands_out_once() {
        let first = Peripherals::take();
        assert!(first.is_some());
        assert!(Peripherals::take().is_none());
    }

    #[test]
    fn power_bits_are_unique() {
        let ids = [
            PeripheralId::Timer0,
            PeripheralId::Timer1,
            PeripheralId::Timer2,
            PeripheralId::Timer3,
            PeripheralId::Uart0,
            PeripheralId::Uart1,
            PeripheralId::Uart2,
            PeripheralId::Uart3,
            PeripheralId::Uart4,
            PeripheralId::Pwm0,
            PeripheralId::Pwm1,
            PeripheralId::I2c0,
            PeripheralId::I2c1,
            PeripheralId::I2c2,
            PeripheralId::Ssp0,
            PeripheralId::Ssp1,
            PeripheralId::Ssp2,
            PeripheralId::Adc,
            PeripheralId::Gpio,
        ];
        let mut seen = 0u32;
        for id in ids {
            let bit = id.pconp_bit().unwrap();
            assert_eq!(seen & (1 << bit), 0, "{:?} shares a PCONP bit", id);
            seen |= 1 << bit;
        }
        assert_eq!(PeripheralId::Watchdog.pconp_bit(), None);
    }
}
