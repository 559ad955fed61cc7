//! Fast GPIO ports.

use tock_registers::registers::{ReadWrite, WriteOnly};
use tock_registers::register_structs;

register_structs! {
    pub GpioRegisters {
        (0x000 => pub port: [PortRegisters; 6]),
        (0x0C0 => @END),
    }
}

register_structs! {
    pub PortRegisters {
        /// 1 = output.
        (0x000 => pub dir: ReadWrite<u32>),
        (0x004 => _reserved0),
        /// Masked bits ignore PIN/SET/CLR writes and read as 0.
        (0x010 => pub mask: ReadWrite<u32>),
        /// Reads the pad levels.
        (0x014 => pub pin: ReadWrite<u32>),
        /// Write 1 to drive high. Reads back the output latch.
        (0x018 => pub set: ReadWrite<u32>),
        /// Write 1 to drive low.
        (0x01C => pub clr: WriteOnly<u32>),
        (0x020 => @END),
    }
}
