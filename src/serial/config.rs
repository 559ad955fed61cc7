use crate::pin::PinId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WordLength {
    DataBits5,
    DataBits6,
    DataBits7,
    DataBits8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity {
    ParityNone,
    ParityEven,
    ParityOdd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopBits {
    #[doc = "1 stop bit"]
    STOP1,
    #[doc = "2 stop bits (1.5 with 5 data bits)"]
    STOP2,
}

/// Whether [`SerialPort`](crate::traits::SerialPort) transfers wait for the
/// hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Every byte is transferred, each bounded by `POLL_LIMIT`.
    Blocking,
    /// Moves what the FIFO allows right now, possibly nothing.
    NonBlocking,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub tx: PinId,
    pub rx: PinId,
    pub baud: u32,
    pub wordlength: WordLength,
    pub parity: Parity,
    pub stopbits: StopBits,
    pub mode: Mode,
}

impl Config {
    /// 115200 baud, 8N1, blocking.
    pub fn new(tx: PinId, rx: PinId) -> Config {
        Config {
            tx,
            rx,
            baud: 115_200,
            wordlength: WordLength::DataBits8,
            parity: Parity::ParityNone,
            stopbits: StopBits::STOP1,
            mode: Mode::Blocking,
        }
    }

    pub fn baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn parity_none(mut self) -> Self {
        self.parity = Parity::ParityNone;
        self
    }

    pub fn parity_even(mut self) -> Self {
        self.parity = Parity::ParityEven;
        self
    }

    pub fn parity_odd(mut self) -> Self {
        self.parity = Parity::ParityOdd;
        self
    }

    pub fn wordlength(mut self, wordlength: WordLength) -> Self {
        self.wordlength = wordlength;
        self
    }

    pub fn stopbits(mut self, stopbits: StopBits) -> Self {
        self.stopbits = stopbits;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}
