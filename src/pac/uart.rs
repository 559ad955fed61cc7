//! 16550-style UART (UART0..UART4).

use tock_registers::registers::{Aliased, ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub UartRegisters {
        /// RBR on read, THR on write; DLL while `LCR.DLAB` is set.
        (0x000 => pub rbr_thr: Aliased<u32>),
        /// IER; DLM while `LCR.DLAB` is set.
        (0x004 => pub dlm_ier: ReadWrite<u32>),
        (0x008 => pub iir_fcr: Aliased<u32, IIR::Register, FCR::Register>),
        (0x00C => pub lcr: ReadWrite<u32, LCR::Register>),
        /// UART1 only.
        (0x010 => pub mcr: ReadWrite<u32>),
        /// Reading clears OE, PE, FE and BI.
        (0x014 => pub lsr: ReadOnly<u32, LSR::Register>),
        (0x018 => pub msr: ReadOnly<u32>),
        (0x01C => pub scr: ReadWrite<u32>),
        (0x020 => pub acr: ReadWrite<u32>),
        (0x024 => pub icr: ReadWrite<u32>),
        (0x028 => pub fdr: ReadWrite<u32, FDR::Register>),
        (0x02C => pub osr: ReadWrite<u32>),
        (0x030 => pub ter: ReadWrite<u32, TER::Register>),
        (0x034 => @END),
    }
}

register_bitfields![u32,
    pub IER [
        RBRIE OFFSET(0) NUMBITS(1) [],
        THREIE OFFSET(1) NUMBITS(1) [],
        RLSIE OFFSET(2) NUMBITS(1) []
    ],
    pub IIR [
        /// 0 when an interrupt is pending.
        INTSTATUS OFFSET(0) NUMBITS(1) [],
        INTID OFFSET(1) NUMBITS(3) []
    ],
    pub FCR [
        FIFOEN OFFSET(0) NUMBITS(1) [],
        RXFIFORES OFFSET(1) NUMBITS(1) [],
        TXFIFORES OFFSET(2) NUMBITS(1) [],
        DMAMODE OFFSET(3) NUMBITS(1) [],
        RXTRIGLVL OFFSET(6) NUMBITS(2) [
            OneChar = 0,
            FourChars = 1,
            EightChars = 2,
            FourteenChars = 3
        ]
    ],
    pub LCR [
        WLS OFFSET(0) NUMBITS(2) [
            Five = 0,
            Six = 1,
            Seven = 2,
            Eight = 3
        ],
        SBS OFFSET(2) NUMBITS(1) [
            One = 0,
            Two = 1
        ],
        PE OFFSET(3) NUMBITS(1) [],
        PS OFFSET(4) NUMBITS(2) [
            Odd = 0,
            Even = 1,
            Forced1 = 2,
            Forced0 = 3
        ],
        BC OFFSET(6) NUMBITS(1) [],
        DLAB OFFSET(7) NUMBITS(1) []
    ],
    pub LSR [
        RDR OFFSET(0) NUMBITS(1) [],
        OE OFFSET(1) NUMBITS(1) [],
        PE OFFSET(2) NUMBITS(1) [],
        FE OFFSET(3) NUMBITS(1) [],
        BI OFFSET(4) NUMBITS(1) [],
        THRE OFFSET(5) NUMBITS(1) [],
        TEMT OFFSET(6) NUMBITS(1) [],
        RXFE OFFSET(7) NUMBITS(1) []
    ],
    pub FDR [
        DIVADDVAL OFFSET(0) NUMBITS(4) [],
        MULVAL OFFSET(4) NUMBITS(4) []
    ],
    pub TER [
        TXEN OFFSET(7) NUMBITS(1) []
    ]
];
