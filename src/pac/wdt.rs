//! Windowed watchdog timer.

use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub WdtRegisters {
        /// WDEN and WDRESET cannot be cleared by software once set.
        (0x000 => pub mode: ReadWrite<u32, MOD::Register>),
        /// 24-bit reload value, minimum 0xFF.
        (0x004 => pub tc: ReadWrite<u32>),
        /// Write 0xAA then 0x55 to reload.
        (0x008 => pub feed: WriteOnly<u32>),
        (0x00C => pub tv: ReadOnly<u32>),
        (0x010 => _reserved0),
        (0x014 => pub warnint: ReadWrite<u32>),
        (0x018 => pub window: ReadWrite<u32>),
        (0x01C => @END),
    }
}

register_bitfields![u32,
    pub MOD [
        WDEN OFFSET(0) NUMBITS(1) [],
        WDRESET OFFSET(1) NUMBITS(1) [],
        WDTOF OFFSET(2) NUMBITS(1) [],
        WDINT OFFSET(3) NUMBITS(1) [],
        WDPROTECT OFFSET(4) NUMBITS(1) []
    ]
];
