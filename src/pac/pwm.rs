//! PWM0/PWM1. Same counter core as the timers plus seven match registers
//! and shadow latching.

use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub PwmRegisters {
        (0x000 => pub ir: ReadWrite<u32>),
        (0x004 => pub tcr: ReadWrite<u32, TCR::Register>),
        (0x008 => pub tc: ReadWrite<u32>),
        (0x00C => pub pr: ReadWrite<u32>),
        (0x010 => pub pc: ReadWrite<u32>),
        (0x014 => pub mcr: ReadWrite<u32, MCR::Register>),
        /// MR0 sets the period, MR1..MR3 the duty of channels 1..3.
        (0x018 => pub mr0_3: [ReadWrite<u32>; 4]),
        (0x028 => pub ccr: ReadWrite<u32>),
        (0x02C => pub cr: [ReadOnly<u32>; 2]),
        (0x034 => _reserved0),
        /// Duty of channels 4..6.
        (0x040 => pub mr4_6: [ReadWrite<u32>; 3]),
        /// Bits 9..=14 enable outputs 1..=6.
        (0x04C => pub pcr: ReadWrite<u32>),
        /// Bit n latches MRn into the counter at the next period.
        (0x050 => pub ler: ReadWrite<u32>),
        (0x054 => _reserved1),
        (0x070 => pub ctcr: ReadWrite<u32>),
        (0x074 => @END),
    }
}

register_bitfields![u32,
    pub TCR [
        CE OFFSET(0) NUMBITS(1) [],
        CR OFFSET(1) NUMBITS(1) [],
        PWMEN OFFSET(3) NUMBITS(1) []
    ],
    pub MCR [
        PWMMR0I OFFSET(0) NUMBITS(1) [],
        PWMMR0R OFFSET(1) NUMBITS(1) [],
        PWMMR0S OFFSET(2) NUMBITS(1) []
    ]
];
