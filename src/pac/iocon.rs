//! I/O configuration: one function-select register per pin.

use tock_registers::registers::ReadWrite;
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub IoconRegisters {
        /// Indexed by `port * 32 + pin`. Port 5 only has pins 0..=4.
        (0x000 => pub pin: [ReadWrite<u32, IOCON::Register>; 192]),
        (0x300 => @END),
    }
}

register_bitfields![u32,
    pub IOCON [
        FUNC OFFSET(0) NUMBITS(3) [],
        MODE OFFSET(3) NUMBITS(2) [
            Inactive = 0,
            PullDown = 1,
            PullUp = 2,
            Repeater = 3
        ],
        HYS OFFSET(5) NUMBITS(1) [],
        INV OFFSET(6) NUMBITS(1) [],
        /// Only on analog-capable pins.
        ADMODE OFFSET(7) NUMBITS(1) [
            Analog = 0,
            Digital = 1
        ],
        /// Glitch filter on analog-capable pins, slew control elsewhere.
        FILTER OFFSET(8) NUMBITS(1) [],
        OD OFFSET(10) NUMBITS(1) []
    ]
];
