//! 12-bit, eight channel ADC.

use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub AdcRegisters {
        (0x000 => pub cr: ReadWrite<u32, CR::Register>),
        (0x004 => pub gdr: ReadOnly<u32, DR::Register>),
        (0x008 => _reserved0),
        (0x00C => pub inten: ReadWrite<u32>),
        /// Reading clears DONE and OVERRUN.
        (0x010 => pub dr: [ReadOnly<u32, DR::Register>; 8]),
        (0x030 => pub stat: ReadOnly<u32>),
        (0x034 => pub adtrm: ReadWrite<u32>),
        (0x038 => @END),
    }
}

register_bitfields![u32,
    pub CR [
        SEL OFFSET(0) NUMBITS(8) [],
        /// ADC clock is PCLK / (CLKDIV + 1).
        CLKDIV OFFSET(8) NUMBITS(8) [],
        BURST OFFSET(16) NUMBITS(1) [],
        /// 1 = operational, 0 = power-down.
        PDN OFFSET(21) NUMBITS(1) [],
        START OFFSET(24) NUMBITS(3) [
            NoStart = 0,
            Now = 1
        ]
    ],
    pub DR [
        RESULT OFFSET(4) NUMBITS(12) [],
        CHN OFFSET(24) NUMBITS(3) [],
        OVERRUN OFFSET(30) NUMBITS(1) [],
        DONE OFFSET(31) NUMBITS(1) []
    ]
];
