//! Register map of the LPC40xx.
//!
//! One module per peripheral type, each a flat `register_structs!` layout with
//! its bitfields, plus the fixed base address of every instance. Layouts and
//! addresses follow UM10562 (LPC408x/407x User Manual). Nothing here validates
//! values; drivers do.
//!
//! Several registers have side effects on access: reading UART `LSR` clears
//! its error bits, reading an ADC `DR` clears `DONE`, and writing the
//! `FEED` registers advances a hardware sequence.

use crate::reg::StaticRef;

pub mod adc;
pub mod gpio;
pub mod i2c;
pub mod iocon;
pub mod nvic;
pub mod pwm;
pub mod ssp;
pub mod syscon;
pub mod timer;
pub mod uart;
pub mod wdt;

macro_rules! base {
    ($($name:ident: $regs:ty = $addr:expr;)+) => {
        $(
            pub const $name: StaticRef<$regs> = unsafe { StaticRef::new($addr as *const $regs) };
        )+
    };
}

base! {
    WDT: wdt::WdtRegisters = 0x4000_0000;
    TIMER0: timer::TimerRegisters = 0x4000_4000;
    TIMER1: timer::TimerRegisters = 0x4000_8000;
    UART0: uart::UartRegisters = 0x4000_C000;
    UART1: uart::UartRegisters = 0x4001_0000;
    PWM0: pwm::PwmRegisters = 0x4001_4000;
    PWM1: pwm::PwmRegisters = 0x4001_8000;
    I2C0: i2c::I2cRegisters = 0x4001_C000;
    IOCON: iocon::IoconRegisters = 0x4002_C000;
    SSP1: ssp::SspRegisters = 0x4003_0000;
    ADC: adc::AdcRegisters = 0x4003_4000;
    I2C1: i2c::I2cRegisters = 0x4005_C000;
    SSP0: ssp::SspRegisters = 0x4008_8000;
    TIMER2: timer::TimerRegisters = 0x4009_0000;
    TIMER3: timer::TimerRegisters = 0x4009_4000;
    UART2: uart::UartRegisters = 0x4009_8000;
    UART3: uart::UartRegisters = 0x4009_C000;
    I2C2: i2c::I2cRegisters = 0x400A_0000;
    UART4: uart::UartRegisters = 0x400A_4000;
    SSP2: ssp::SspRegisters = 0x400A_C000;
    SYSCON: syscon::SysconRegisters = 0x400F_C000;
    GPIO: gpio::GpioRegisters = 0x2009_8000;
    NVIC: nvic::NvicRegisters = 0xE000_E000;
}
