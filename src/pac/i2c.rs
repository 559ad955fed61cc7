//! I2C bus interface (I2C0..I2C2).

use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub I2cRegisters {
        /// Writing 1 sets a bit, writing 0 has no effect.
        (0x000 => pub conset: ReadWrite<u32, CONSET::Register>),
        /// State machine status code, see `crate::i2c::status`.
        (0x004 => pub stat: ReadOnly<u32>),
        (0x008 => pub dat: ReadWrite<u32>),
        (0x00C => pub adr0: ReadWrite<u32>),
        (0x010 => pub sclh: ReadWrite<u32>),
        (0x014 => pub scll: ReadWrite<u32>),
        /// Writing 1 clears the matching CONSET bit.
        (0x018 => pub conclr: WriteOnly<u32, CONCLR::Register>),
        (0x01C => pub mmctrl: ReadWrite<u32>),
        (0x020 => pub adr: [ReadWrite<u32>; 3]),
        (0x02C => pub data_buffer: ReadOnly<u32>),
        (0x030 => pub mask: [ReadWrite<u32>; 4]),
        (0x040 => @END),
    }
}

register_bitfields![u32,
    pub CONSET [
        AA OFFSET(2) NUMBITS(1) [],
        SI OFFSET(3) NUMBITS(1) [],
        STO OFFSET(4) NUMBITS(1) [],
        STA OFFSET(5) NUMBITS(1) [],
        I2EN OFFSET(6) NUMBITS(1) []
    ],
    pub CONCLR [
        AAC OFFSET(2) NUMBITS(1) [],
        SIC OFFSET(3) NUMBITS(1) [],
        STAC OFFSET(5) NUMBITS(1) [],
        I2ENC OFFSET(6) NUMBITS(1) []
    ]
];
