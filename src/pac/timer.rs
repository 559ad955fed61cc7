//! 32-bit timer/counter (TIMER0..TIMER3).

use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub TimerRegisters {
        /// Write 1 to clear a flag.
        (0x000 => pub ir: ReadWrite<u32, IR::Register>),
        (0x004 => pub tcr: ReadWrite<u32, TCR::Register>),
        (0x008 => pub tc: ReadWrite<u32>),
        (0x00C => pub pr: ReadWrite<u32>),
        (0x010 => pub pc: ReadWrite<u32>),
        (0x014 => pub mcr: ReadWrite<u32, MCR::Register>),
        (0x018 => pub mr: [ReadWrite<u32>; 4]),
        (0x028 => pub ccr: ReadWrite<u32>),
        (0x02C => pub cr: [ReadOnly<u32>; 2]),
        (0x034 => _reserved0),
        (0x03C => pub emr: ReadWrite<u32>),
        (0x040 => _reserved1),
        (0x070 => pub ctcr: ReadWrite<u32>),
        (0x074 => @END),
    }
}

register_bitfields![u32,
    pub IR [
        MR0INT OFFSET(0) NUMBITS(1) [],
        MR1INT OFFSET(1) NUMBITS(1) [],
        MR2INT OFFSET(2) NUMBITS(1) [],
        MR3INT OFFSET(3) NUMBITS(1) [],
        CR0INT OFFSET(4) NUMBITS(1) [],
        CR1INT OFFSET(5) NUMBITS(1) []
    ],
    pub TCR [
        CEN OFFSET(0) NUMBITS(1) [],
        CRST OFFSET(1) NUMBITS(1) []
    ],
    pub MCR [
        MR0I OFFSET(0) NUMBITS(1) [],
        MR0R OFFSET(1) NUMBITS(1) [],
        MR0S OFFSET(2) NUMBITS(1) []
    ]
];
