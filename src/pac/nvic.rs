//! Cortex-M4 NVIC, sized for the 41 LPC40xx interrupt lines.

use tock_registers::registers::ReadWrite;
use tock_registers::register_structs;

register_structs! {
    pub NvicRegisters {
        (0x000 => _reserved0),
        /// Write 1 to enable; reads return the enable state.
        (0x100 => pub iser: [ReadWrite<u32>; 8]),
        (0x120 => _reserved1),
        /// Write 1 to disable; reads return the enable state.
        (0x180 => pub icer: [ReadWrite<u32>; 8]),
        (0x1A0 => _reserved2),
        (0x200 => pub ispr: [ReadWrite<u32>; 8]),
        (0x220 => _reserved3),
        (0x280 => pub icpr: [ReadWrite<u32>; 8]),
        (0x2A0 => _reserved4),
        (0x300 => pub iabr: [ReadWrite<u32>; 8]),
        (0x320 => _reserved5),
        /// One byte per interrupt; the LPC40xx implements the top 5 bits.
        (0x400 => pub ipr: [ReadWrite<u8>; 64]),
        (0x440 => @END),
    }
}
