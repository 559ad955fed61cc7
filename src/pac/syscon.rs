//! System control: clocks, PLLs, power and reset.

use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub SysconRegisters {
        (0x000 => pub flashcfg: ReadWrite<u32, FLASHCFG::Register>),
        (0x004 => _reserved0),
        (0x080 => pub pll0con: ReadWrite<u32, PLLCON::Register>),
        (0x084 => pub pll0cfg: ReadWrite<u32, PLLCFG::Register>),
        (0x088 => pub pll0stat: ReadOnly<u32, PLLSTAT::Register>),
        /// Write 0xAA then 0x55 to latch PLL0CON/PLL0CFG.
        (0x08C => pub pll0feed: WriteOnly<u32>),
        (0x090 => _reserved1),
        (0x0A0 => pub pll1con: ReadWrite<u32, PLLCON::Register>),
        (0x0A4 => pub pll1cfg: ReadWrite<u32, PLLCFG::Register>),
        (0x0A8 => pub pll1stat: ReadOnly<u32, PLLSTAT::Register>),
        (0x0AC => pub pll1feed: WriteOnly<u32>),
        (0x0B0 => _reserved2),
        (0x0C0 => pub pcon: ReadWrite<u32>),
        /// One power bit per peripheral, see `PeripheralId::pconp_bit`.
        (0x0C4 => pub pconp: ReadWrite<u32>),
        (0x0C8 => pub pconp1: ReadWrite<u32>),
        (0x0CC => _reserved3),
        (0x100 => pub emcclksel: ReadWrite<u32, EMCCLKSEL::Register>),
        (0x104 => pub cclksel: ReadWrite<u32, CCLKSEL::Register>),
        (0x108 => pub usbclksel: ReadWrite<u32, USBCLKSEL::Register>),
        (0x10C => pub clksrcsel: ReadWrite<u32, CLKSRCSEL::Register>),
        (0x110 => _reserved4),
        (0x180 => pub rsid: ReadWrite<u32>),
        (0x184 => _reserved5),
        (0x1A0 => pub scs: ReadWrite<u32, SCS::Register>),
        (0x1A4 => pub irctrim: ReadWrite<u32>),
        (0x1A8 => pub pclksel: ReadWrite<u32, PCLKSEL::Register>),
        (0x1AC => _reserved6),
        (0x1B0 => pub pboost: ReadWrite<u32, PBOOST::Register>),
        (0x1B4 => _reserved7),
        /// Same bit layout as PCONP; a set bit holds the peripheral in reset.
        (0x1CC => pub rstcon0: ReadWrite<u32>),
        (0x1D0 => pub rstcon1: ReadWrite<u32>),
        (0x1D4 => @END),
    }
}

register_bitfields![u32,
    pub FLASHCFG [
        /// Flash access time in CPU clocks, minus one.
        FLASHTIM OFFSET(12) NUMBITS(4) []
    ],
    pub PLLCON [
        PLLE OFFSET(0) NUMBITS(1) []
    ],
    pub PLLCFG [
        /// Multiplier minus one.
        MSEL OFFSET(0) NUMBITS(5) [],
        PSEL OFFSET(5) NUMBITS(2) [
            Div1 = 0,
            Div2 = 1,
            Div4 = 2,
            Div8 = 3
        ]
    ],
    pub PLLSTAT [
        MSEL OFFSET(0) NUMBITS(5) [],
        PSEL OFFSET(5) NUMBITS(2) [],
        PLLE_STAT OFFSET(8) NUMBITS(1) [],
        PLOCK OFFSET(10) NUMBITS(1) []
    ],
    pub EMCCLKSEL [
        EMCDIV OFFSET(0) NUMBITS(1) [
            SameAsCpu = 0,
            HalfCpu = 1
        ]
    ],
    pub CCLKSEL [
        CCLKDIV OFFSET(0) NUMBITS(5) [],
        CCLKSEL OFFSET(8) NUMBITS(1) [
            SysClk = 0,
            MainPll = 1
        ]
    ],
    pub USBCLKSEL [
        USBDIV OFFSET(0) NUMBITS(5) [],
        USBSEL OFFSET(8) NUMBITS(2) [
            SysClk = 0,
            MainPll = 1,
            AltPll = 2
        ]
    ],
    pub CLKSRCSEL [
        CLKSRC OFFSET(0) NUMBITS(1) [
            Irc = 0,
            MainOscillator = 1
        ]
    ],
    pub SCS [
        /// 0: 1..20 MHz crystal, 1: 15..25 MHz crystal.
        OSCRANGE OFFSET(4) NUMBITS(1) [
            Low = 0,
            High = 1
        ],
        OSCEN OFFSET(5) NUMBITS(1) [],
        OSCSTAT OFFSET(6) NUMBITS(1) []
    ],
    pub PCLKSEL [
        /// Zero gates the peripheral clock off entirely.
        PCLKDIV OFFSET(0) NUMBITS(5) []
    ],
    pub PBOOST [
        BOOST OFFSET(0) NUMBITS(2) [
            Off = 0,
            On = 3
        ]
    ]
];
