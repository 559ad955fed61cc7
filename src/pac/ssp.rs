//! Synchronous serial port (SSP0..SSP2), used as SPI.

use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub SspRegisters {
        (0x000 => pub cr0: ReadWrite<u32, CR0::Register>),
        (0x004 => pub cr1: ReadWrite<u32, CR1::Register>),
        (0x008 => pub dr: ReadWrite<u32>),
        (0x00C => pub sr: ReadOnly<u32, SR::Register>),
        (0x010 => pub cpsr: ReadWrite<u32, CPSR::Register>),
        (0x014 => pub imsc: ReadWrite<u32>),
        (0x018 => pub ris: ReadOnly<u32>),
        (0x01C => pub mis: ReadOnly<u32>),
        (0x020 => pub icr: WriteOnly<u32>),
        (0x024 => pub dmacr: ReadWrite<u32>),
        (0x028 => @END),
    }
}

register_bitfields![u32,
    pub CR0 [
        /// Data size minus one, 3..=15.
        DSS OFFSET(0) NUMBITS(4) [],
        FRF OFFSET(4) NUMBITS(2) [
            Spi = 0,
            Ti = 1,
            Microwire = 2
        ],
        CPOL OFFSET(6) NUMBITS(1) [],
        CPHA OFFSET(7) NUMBITS(1) [],
        SCR OFFSET(8) NUMBITS(8) []
    ],
    pub CR1 [
        LBM OFFSET(0) NUMBITS(1) [],
        SSE OFFSET(1) NUMBITS(1) [],
        /// 0 = master.
        MS OFFSET(2) NUMBITS(1) [],
        SOD OFFSET(3) NUMBITS(1) []
    ],
    pub SR [
        TFE OFFSET(0) NUMBITS(1) [],
        TNF OFFSET(1) NUMBITS(1) [],
        RNE OFFSET(2) NUMBITS(1) [],
        RFF OFFSET(3) NUMBITS(1) [],
        BSY OFFSET(4) NUMBITS(1) []
    ],
    pub CPSR [
        /// Even, 2..=254.
        CPSDVSR OFFSET(0) NUMBITS(8) []
    ]
];
