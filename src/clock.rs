//! LPC40xx Clock Configuration
//!
//! The LPC40xx derives every clock in the chip from one of two sources,
//! optionally multiplied by the main PLL. Refer to chapter 3 of UM10562 for
//! the full clock tree; the parts this module drives are:
//!
//! - Internal RC oscillator (IRC), 12 MHz, 1% accuracy. Runs out of reset.
//! - Main oscillator, a 1 to 25 MHz crystal on XTAL1/XTAL2.
//! - PLL0 (main PLL), multiplying the selected source by M in 1..=32. Its
//!   current controlled oscillator must run between 156 and 320 MHz, which
//!   the post divider P ∈ {1, 2, 4, 8} takes care of.
//! - CPU clock: PLL0 output (or the source itself) divided by 1..=31. At most
//!   120 MHz.
//! - Peripheral clock (PCLK), shared by every APB peripheral: same input
//!   divided by 1..=31.
//! - EMC clock, the CPU clock or half of it.
//! - USB clock, must be exactly 48 MHz.
//!
//! # HAL
//!
//! Clocks are configured once, at the start of the program, through
//! [`SystemControl`]. Drivers borrow the `SystemControl` to learn the
//! frequencies they run at, so while any driver is alive the borrow checker
//! refuses to reconfigure the clocks under its feet.
//!
//! A configuration is described with a [`ClockConfig`] builder, validated into
//! a [`ClockPlan`] (every frequency computed and checked, nothing written
//! yet), then applied:
//!
//! ```no_run
//! # use lpc40xx_hal::{clock::{ClockConfig, ClockSource, SystemControl}, time::U32Ext};
//! # let p = lpc40xx_hal::Peripherals::take().unwrap();
//! let mut syscon = SystemControl::new(p.syscon);
//! let plan = ClockConfig::new(ClockSource::MainOscillator(12.mhz()))
//!     .pll(10)
//!     .peripheral_divider(2)
//!     .validate()
//!     .unwrap();
//! let clocks = syscon.apply(&plan).unwrap();
//! assert_eq!(clocks.cpu(), 120.mhz());
//! assert_eq!(clocks.peripheral(), 60.mhz());
//! ```

use crate::error::{ConfigurationError, Error, Result};
use crate::fault::{self, Fault};
use crate::pac::syscon::{
    SysconRegisters, CCLKSEL, CLKSRCSEL, EMCCLKSEL, FLASHCFG, PBOOST, PCLKSEL, PLLCFG, PLLCON,
    PLLSTAT, SCS, USBCLKSEL,
};
use crate::peripherals::Peripheral;
use crate::reg::{self, ReadWriteable, Readable, Writeable};
use crate::time::Hertz;

pub const IRC_FREQUENCY: Hertz = Hertz(12_000_000);
pub const MAX_CPU_FREQUENCY: Hertz = Hertz(120_000_000);
pub const USB_FREQUENCY: Hertz = Hertz(48_000_000);

/// PLLSTAT polls before giving up on lock.
pub const PLL_LOCK_TIMEOUT_POLLS: u32 = 100_000;
/// SCS polls before giving up on the main oscillator.
pub const OSCILLATOR_TIMEOUT_POLLS: u32 = 100_000;

const OSCILLATOR_RANGE: (u32, u32) = (1_000_000, 25_000_000);
const OSCILLATOR_HIGH_RANGE: u32 = 20_000_000;
const CCO_RANGE: (u32, u32) = (156_000_000, 320_000_000);
const MAX_DIVIDER: u8 = 31;
const BOOST_THRESHOLD: u32 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Internal 12 MHz RC oscillator.
    Irc,
    /// Main oscillator with the given crystal frequency.
    MainOscillator(Hertz),
}

impl ClockSource {
    pub fn frequency(self) -> Hertz {
        match self {
            ClockSource::Irc => IRC_FREQUENCY,
            ClockSource::MainOscillator(f) => f,
        }
    }
}

/// Clock tree request. See the module documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    source: ClockSource,
    pll_multiplier: Option<u8>,
    cpu_divider: u8,
    peripheral_divider: u8,
    emc_half_rate: bool,
    usb: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig::internal()
    }
}

impl ClockConfig {
    /// `source` straight to the CPU and peripherals, no PLL.
    pub const fn new(source: ClockSource) -> ClockConfig {
        ClockConfig {
            source,
            pll_multiplier: None,
            cpu_divider: 1,
            peripheral_divider: 1,
            emc_half_rate: false,
            usb: false,
        }
    }

    /// The reset configuration: 12 MHz IRC everywhere.
    pub const fn internal() -> ClockConfig {
        ClockConfig::new(ClockSource::Irc)
    }

    /// Runs the source through PLL0 with multiplier `m`.
    pub const fn pll(mut self, m: u8) -> Self {
        self.pll_multiplier = Some(m);
        self
    }

    pub const fn cpu_divider(mut self, divider: u8) -> Self {
        self.cpu_divider = divider;
        self
    }

    pub const fn peripheral_divider(mut self, divider: u8) -> Self {
        self.peripheral_divider = divider;
        self
    }

    /// Runs the external memory controller at half the CPU clock.
    pub const fn emc_half_rate(mut self, half: bool) -> Self {
        self.emc_half_rate = half;
        self
    }

    /// Requests the 48 MHz USB clock from PLL0.
    pub const fn usb_clock(mut self, enable: bool) -> Self {
        self.usb = enable;
        self
    }

    /// Computes every register value and frequency, or explains why the
    /// request is impossible. Touches no hardware.
    pub fn validate(&self) -> Result<ClockPlan> {
        let input = self.source.frequency();
        if let ClockSource::MainOscillator(f) = self.source {
            if f.0 < OSCILLATOR_RANGE.0 || f.0 > OSCILLATOR_RANGE.1 {
                return Err(ConfigurationError::OscillatorOutOfRange.into());
            }
        }

        let pll = match self.pll_multiplier {
            Some(m) => Some(PllSetting::new(input, m)?),
            None => None,
        };
        let base = pll.map_or(input, |p| p.output);

        let cpu_divider = check_divider(self.cpu_divider)?;
        let peripheral_divider = check_divider(self.peripheral_divider)?;
        let cpu = base / cpu_divider as u32;
        if cpu > MAX_CPU_FREQUENCY {
            return Err(ConfigurationError::CpuFrequencyTooHigh.into());
        }

        let usb_divider = if self.usb {
            let output = pll
                .map(|p| p.output)
                .ok_or(Error::Configuration(ConfigurationError::UsbClockUnachievable))?;
            Some(usb_divider(output)?)
        } else {
            None
        };

        let clocks = Clocks {
            source: self.source,
            pll_output: pll.map(|p| p.output),
            cpu,
            peripheral: base / peripheral_divider as u32,
            emc: if self.emc_half_rate { cpu / 2 } else { cpu },
            usb: usb_divider.map(|_| USB_FREQUENCY),
        };

        Ok(ClockPlan {
            source: self.source,
            pll,
            cpu_divider,
            peripheral_divider,
            emc_half_rate: self.emc_half_rate,
            usb_divider,
            flash_cycles: flash_cycles(cpu),
            boost: cpu.0 > BOOST_THRESHOLD,
            clocks,
        })
    }
}

fn check_divider(divider: u8) -> Result<u8> {
    if (1..=MAX_DIVIDER).contains(&divider) {
        Ok(divider)
    } else {
        Err(ConfigurationError::DividerOutOfRange.into())
    }
}

fn usb_divider(pll_output: Hertz) -> Result<u8> {
    if pll_output.0 % USB_FREQUENCY.0 != 0 {
        return Err(ConfigurationError::UsbClockUnachievable.into());
    }
    match pll_output.0 / USB_FREQUENCY.0 {
        d @ 1..=31 => Ok(d as u8),
        _ => Err(ConfigurationError::UsbClockUnachievable.into()),
    }
}

/// CPU clocks per flash access for a given CPU frequency.
pub fn flash_cycles(cpu: Hertz) -> u8 {
    match cpu.0 {
        0..=20_000_000 => 1,
        20_000_001..=40_000_000 => 2,
        40_000_001..=60_000_000 => 3,
        60_000_001..=80_000_000 => 4,
        80_000_001..=100_000_000 => 5,
        _ => 6,
    }
}

/// PLL0 multiplier and post divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllSetting {
    multiplier: u8,
    post_divider: u8,
    output: Hertz,
}

impl PllSetting {
    fn new(input: Hertz, multiplier: u8) -> Result<PllSetting> {
        if !(1..=32).contains(&multiplier) {
            return Err(ConfigurationError::MultiplierOutOfRange.into());
        }
        let output = input * multiplier as u32;
        [1u8, 2, 4, 8]
            .into_iter()
            .find(|&p| {
                let cco = 2 * p as u64 * output.0 as u64;
                (CCO_RANGE.0 as u64..=CCO_RANGE.1 as u64).contains(&cco)
            })
            .map(|post_divider| PllSetting {
                multiplier,
                post_divider,
                output,
            })
            .ok_or(Error::Configuration(ConfigurationError::PllOutputOutOfRange))
    }

    pub fn multiplier(&self) -> u8 {
        self.multiplier
    }

    pub fn post_divider(&self) -> u8 {
        self.post_divider
    }

    pub fn output(&self) -> Hertz {
        self.output
    }

    fn psel(&self) -> u32 {
        self.post_divider.trailing_zeros()
    }
}

/// A validated clock configuration, ready for [`SystemControl::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockPlan {
    source: ClockSource,
    pll: Option<PllSetting>,
    cpu_divider: u8,
    peripheral_divider: u8,
    emc_half_rate: bool,
    usb_divider: Option<u8>,
    flash_cycles: u8,
    boost: bool,
    clocks: Clocks,
}

impl ClockPlan {
    pub fn pll(&self) -> Option<PllSetting> {
        self.pll
    }

    pub fn flash_cycles(&self) -> u8 {
        self.flash_cycles
    }

    /// Frequencies the plan will produce.
    pub fn clocks(&self) -> Clocks {
        self.clocks
    }
}

/// Frozen clock frequencies, valid until the next reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Clocks {
    source: ClockSource,
    pll_output: Option<Hertz>,
    cpu: Hertz,
    peripheral: Hertz,
    emc: Hertz,
    usb: Option<Hertz>,
}

impl Clocks {
    fn unmultiplied(source: ClockSource) -> Clocks {
        let f = source.frequency();
        Clocks {
            source,
            pll_output: None,
            cpu: f,
            peripheral: f,
            emc: f,
            usb: None,
        }
    }

    pub fn source(&self) -> ClockSource {
        self.source
    }

    pub fn pll_output(&self) -> Option<Hertz> {
        self.pll_output
    }

    pub fn cpu(&self) -> Hertz {
        self.cpu
    }

    /// PCLK, shared by every APB peripheral.
    pub fn peripheral(&self) -> Hertz {
        self.peripheral
    }

    pub fn emc(&self) -> Hertz {
        self.emc
    }

    pub fn usb(&self) -> Option<Hertz> {
        self.usb
    }
}

/// Owner of the system control block: clocks, power gating and resets.
pub struct SystemControl {
    syscon: Peripheral<SysconRegisters>,
    clocks: Option<Clocks>,
}

impl SystemControl {
    pub fn new(syscon: Peripheral<SysconRegisters>) -> SystemControl {
        SystemControl {
            syscon,
            clocks: None,
        }
    }

    pub(crate) fn regs(&self) -> &SysconRegisters {
        self.syscon.regs()
    }

    /// Frequencies of the last successful (or fallen back) configuration.
    pub fn clocks(&self) -> Result<Clocks> {
        self.clocks
            .ok_or(Error::Configuration(ConfigurationError::ClocksNotConfigured))
    }

    pub fn configure(&mut self, config: ClockConfig) -> Result<Clocks> {
        let plan = config.validate()?;
        self.apply(&plan)
    }

    /// PLL0 at `multiplier`, CPU divided by `divider`, PCLK undivided.
    pub fn configure_clock(
        &mut self,
        source: ClockSource,
        multiplier: u8,
        divider: u8,
    ) -> Result<Clocks> {
        self.configure(
            ClockConfig::new(source)
                .pll(multiplier)
                .cpu_divider(divider)
                .peripheral_divider(1),
        )
    }

    /// Programs the clock tree.
    ///
    /// On a lock or oscillator timeout the CPU is left running from the
    /// unmultiplied source (the IRC if the oscillator failed), the fault is
    /// signalled and [`Error::ClockLockTimeout`] returned.
    pub fn apply(&mut self, plan: &ClockPlan) -> Result<Clocks> {
        let regs = self.syscon.regs();

        if let ClockSource::MainOscillator(f) = plan.source {
            let range = if f.0 > OSCILLATOR_HIGH_RANGE {
                SCS::OSCRANGE::High
            } else {
                SCS::OSCRANGE::Low
            };
            regs.scs.modify(range + SCS::OSCEN::SET);
            if !reg::spin_until(OSCILLATOR_TIMEOUT_POLLS, || regs.scs.is_set(SCS::OSCSTAT)) {
                regs.clksrcsel.write(CLKSRCSEL::CLKSRC::Irc);
                return Err(self.fall_back(ClockSource::Irc));
            }
        }

        // Worst-case flash timing until the final clock is running.
        regs.flashcfg.modify(FLASHCFG::FLASHTIM.val(5));
        regs.cclksel
            .write(CCLKSEL::CCLKSEL::SysClk + CCLKSEL::CCLKDIV.val(1));
        regs.clksrcsel.write(match plan.source {
            ClockSource::Irc => CLKSRCSEL::CLKSRC::Irc,
            ClockSource::MainOscillator(_) => CLKSRCSEL::CLKSRC::MainOscillator,
        });

        regs.pll0con.write(PLLCON::PLLE::CLEAR);
        self.feed();
        if let Some(pll) = plan.pll {
            regs.pll0cfg.write(
                PLLCFG::MSEL.val(pll.multiplier as u32 - 1) + PLLCFG::PSEL.val(pll.psel()),
            );
            self.feed();
            regs.pll0con.write(PLLCON::PLLE::SET);
            self.feed();
            if !reg::spin_until(PLL_LOCK_TIMEOUT_POLLS, || {
                regs.pll0stat.is_set(PLLSTAT::PLOCK)
            }) {
                return Err(self.fall_back(plan.source));
            }
        }

        regs.flashcfg
            .modify(FLASHCFG::FLASHTIM.val(plan.flash_cycles as u32 - 1));
        regs.pboost.write(if plan.boost {
            PBOOST::BOOST::On
        } else {
            PBOOST::BOOST::Off
        });
        regs.pclksel
            .write(PCLKSEL::PCLKDIV.val(plan.peripheral_divider as u32));
        regs.emcclksel.write(if plan.emc_half_rate {
            EMCCLKSEL::EMCDIV::HalfCpu
        } else {
            EMCCLKSEL::EMCDIV::SameAsCpu
        });
        match plan.usb_divider {
            Some(d) => regs
                .usbclksel
                .write(USBCLKSEL::USBSEL::MainPll + USBCLKSEL::USBDIV.val(d as u32)),
            None => regs.usbclksel.set(0),
        }

        let cpu_source = if plan.pll.is_some() {
            CCLKSEL::CCLKSEL::MainPll
        } else {
            CCLKSEL::CCLKSEL::SysClk
        };
        regs.cclksel
            .write(cpu_source + CCLKSEL::CCLKDIV.val(plan.cpu_divider as u32));
        reg::barrier();

        self.clocks = Some(plan.clocks);
        info!(
            "clocks: cpu {} Hz, pclk {} Hz, flash {} cycles",
            plan.clocks.cpu.0,
            plan.clocks.peripheral.0,
            plan.flash_cycles
        );
        Ok(plan.clocks)
    }

    /// Leaves the CPU and peripherals on `source` directly.
    fn fall_back(&mut self, source: ClockSource) -> Error {
        let regs = self.syscon.regs();
        regs.cclksel
            .write(CCLKSEL::CCLKSEL::SysClk + CCLKSEL::CCLKDIV.val(1));
        regs.pll0con.write(PLLCON::PLLE::CLEAR);
        self.feed();
        regs.pclksel.write(PCLKSEL::PCLKDIV.val(1));
        regs.emcclksel.write(EMCCLKSEL::EMCDIV::SameAsCpu);
        regs.usbclksel.set(0);
        self.clocks = Some(Clocks::unmultiplied(source));
        fault::signal(Fault::ClockLockTimeout);
        Error::ClockLockTimeout
    }

    /// PLL0CON and PLL0CFG take effect only after this exact write pair.
    fn feed(&self) {
        let regs = self.syscon.regs();
        critical_section::with(|_| {
            reg::barrier();
            regs.pll0feed.set(0xAA);
            regs.pll0feed.set(0x55);
            reg::barrier();
        });
    }
}
