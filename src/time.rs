//! Frequencies and durations.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hertz(pub u32);

impl core::ops::Mul<u32> for Hertz {
    type Output = Hertz;
    fn mul(self, rhs: u32) -> Hertz {
        Hertz(self.0 * rhs)
    }
}

impl core::ops::Div<u32> for Hertz {
    type Output = Hertz;
    fn div(self, rhs: u32) -> Hertz {
        Hertz(self.0 / rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MicroSeconds(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MilliSeconds(pub u32);

impl From<MilliSeconds> for MicroSeconds {
    fn from(ms: MilliSeconds) -> MicroSeconds {
        MicroSeconds(ms.0.saturating_mul(1_000))
    }
}

/// `12.mhz()`, `115_200.hz()`, `500.us()`.
pub trait U32Ext {
    fn hz(self) -> Hertz;
    fn khz(self) -> Hertz;
    fn mhz(self) -> Hertz;
    fn us(self) -> MicroSeconds;
    fn ms(self) -> MilliSeconds;
}

impl U32Ext for u32 {
    fn hz(self) -> Hertz {
        Hertz(self)
    }

    fn khz(self) -> Hertz {
        Hertz(self * 1_000)
    }

    fn mhz(self) -> Hertz {
        Hertz(self * 1_000_000)
    }

    fn us(self) -> MicroSeconds {
        MicroSeconds(self)
    }

    fn ms(self) -> MilliSeconds {
        MilliSeconds(self)
    }
}
