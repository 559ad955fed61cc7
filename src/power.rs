//! Peripheral power gating (PCONP) and reset (RSTCON0).
//!
//! Every APB peripheral except the watchdog and IOCON sits behind a PCONP
//! bit and is unclocked while that bit is clear. The bit numbers are shared
//! with RSTCON0.

use crate::clock::SystemControl;
use crate::peripherals::PeripheralId;
use crate::reg::{self, Readable, Writeable};

impl SystemControl {
    pub fn enable_peripheral_power(&self, id: PeripheralId) {
        if let Some(bit) = id.pconp_bit() {
            let pconp = &self.regs().pconp;
            critical_section::with(|_| pconp.set(pconp.get() | 1 << bit));
            debug!("{:?} powered", id);
        }
    }

    pub fn disable_peripheral_power(&self, id: PeripheralId) {
        if let Some(bit) = id.pconp_bit() {
            let pconp = &self.regs().pconp;
            critical_section::with(|_| pconp.set(pconp.get() & !(1 << bit)));
            debug!("{:?} powered down", id);
        }
    }

    /// Ungated peripherals always report `true`.
    pub fn is_powered(&self, id: PeripheralId) -> bool {
        id.pconp_bit()
            .map_or(true, |bit| self.regs().pconp.get() & (1 << bit) != 0)
    }

    /// Pulses the peripheral's reset line, returning its registers to their
    /// reset values.
    pub fn reset_peripheral(&self, id: PeripheralId) {
        if let Some(bit) = id.pconp_bit() {
            let rstcon = &self.regs().rstcon0;
            critical_section::with(|_| {
                rstcon.set(rstcon.get() | 1 << bit);
                reg::barrier();
                rstcon.set(rstcon.get() & !(1 << bit));
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::peripherals::PeripheralId;
    use crate::reg::{Readable, Writeable};
    use crate::testing;

    #[test]
    fn gating_touches_only_its_bit() {
        let syscon = testing::system(5);
        syscon.enable_peripheral_power(PeripheralId::Uart0);
        syscon.enable_peripheral_power(PeripheralId::Ssp0);
        assert_eq!(syscon.regs().pconp.get(), 1 << 3 | 1 << 21);
        assert!(syscon.is_powered(PeripheralId::Ssp0));

        syscon.disable_peripheral_power(PeripheralId::Uart0);
        assert!(!syscon.is_powered(PeripheralId::Uart0));
        assert!(syscon.is_powered(PeripheralId::Ssp0));
        assert!(syscon.is_powered(PeripheralId::Watchdog));
    }

    #[test]
    fn reset_pulse_releases_the_line() {
        let syscon = testing::system(5);
        syscon.regs().rstcon0.set(1 << 1);
        syscon.reset_peripheral(PeripheralId::Adc);
        assert_eq!(syscon.regs().rstcon0.get(), 1 << 1);
    }
}
