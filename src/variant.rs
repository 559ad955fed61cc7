//! LPC40xx silicon variants.
//!
//! The family shares one register layout. Parts differ in memory size and in
//! whether the Cortex-M4 carries the FPv4-SP floating point unit: the
//! LPC4072 and LPC4074 do not, so firmware for them must be built for the
//! soft-float `thumbv7em-none-eabi` target. `build.rs` enforces that.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    Lpc4072,
    Lpc4074,
    Lpc4076,
    Lpc4078,
    Lpc4088,
}

impl Variant {
    #[cfg(feature = "lpc4072")]
    pub const TARGET: Variant = Variant::Lpc4072;
    #[cfg(feature = "lpc4074")]
    pub const TARGET: Variant = Variant::Lpc4074;
    #[cfg(feature = "lpc4076")]
    pub const TARGET: Variant = Variant::Lpc4076;
    #[cfg(feature = "lpc4078")]
    pub const TARGET: Variant = Variant::Lpc4078;
    // The largest part doubles as the default for host builds and docs.
    #[cfg(not(any(
        feature = "lpc4072",
        feature = "lpc4074",
        feature = "lpc4076",
        feature = "lpc4078",
    )))]
    pub const TARGET: Variant = Variant::Lpc4088;

    pub const ALL: [Variant; 5] = [
        Variant::Lpc4072,
        Variant::Lpc4074,
        Variant::Lpc4076,
        Variant::Lpc4078,
        Variant::Lpc4088,
    ];

    pub const fn has_fpu(self) -> bool {
        matches!(self, Variant::Lpc4076 | Variant::Lpc4078 | Variant::Lpc4088)
    }

    /// On-chip flash in bytes.
    pub const fn flash_size(self) -> u32 {
        match self {
            Variant::Lpc4072 => 64 * 1024,
            Variant::Lpc4074 => 128 * 1024,
            Variant::Lpc4076 => 256 * 1024,
            Variant::Lpc4078 | Variant::Lpc4088 => 512 * 1024,
        }
    }

    /// Local SRAM at 0x1000_0000 in bytes. Peripheral SRAM is not counted.
    pub const fn sram_size(self) -> u32 {
        match self {
            Variant::Lpc4072 => 16 * 1024,
            Variant::Lpc4074 => 32 * 1024,
            Variant::Lpc4076 | Variant::Lpc4078 | Variant::Lpc4088 => 64 * 1024,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Variant::Lpc4072 => "lpc4072",
            Variant::Lpc4074 => "lpc4074",
            Variant::Lpc4076 => "lpc4076",
            Variant::Lpc4078 => "lpc4078",
            Variant::Lpc4088 => "lpc4088",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fpu_profiles_split_the_family() {
        let soft: Vec<_> = Variant::ALL.iter().filter(|v| !v.has_fpu()).collect();
        assert_eq!(soft, [&Variant::Lpc4072, &Variant::Lpc4074]);
    }

    #[test]
    fn memory_grows_with_part_number() {
        for pair in Variant::ALL.windows(2) {
            assert!(pair[0].flash_size() <= pair[1].flash_size());
            assert!(pair[0].sram_size() <= pair[1].sram_size());
        }
    }
}
