//! Bus transactions and their completions.

use std::fmt;

use crate::bus::BusFault;
use crate::error::{Result, TransactorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W8,
    W16,
    W32,
}

impl Width {
    pub fn bits(self) -> u32 {
        match self {
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            Width::W8 => 1,
            Width::W16 => 2,
            Width::W32 => 4,
        }
    }

    pub fn mask(self) -> u32 {
        match self {
            Width::W8 => 0xff,
            Width::W16 => 0xffff,
            Width::W32 => 0xffff_ffff,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Width::W8),
            16 => Some(Width::W16),
            32 => Some(Width::W32),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Blocking,
    Async,
}

/// Node-unique transaction number, assigned in enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(pub u64);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    /// Single beat, masked to the transaction width.
    Word(u32),
    /// Burst payload, one byte per beat.
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    id: TxnId,
    node: u32,
    address: u32,
    width: Width,
    direction: Direction,
    data: Data,
    mode: Mode,
}

impl Transaction {
    pub fn write(address: u32, width: Width, value: u32, mode: Mode) -> Self {
        Self::new(address, width, Direction::Write, Data::Word(value & width.mask()), mode)
    }

    pub fn read(address: u32, width: Width, mode: Mode) -> Self {
        Self::new(address, width, Direction::Read, Data::Word(0), mode)
    }

    pub fn burst_write(address: u32, bytes: Vec<u8>, mode: Mode) -> Self {
        Self::new(address, Width::W8, Direction::Write, Data::Bytes(bytes), mode)
    }

    pub fn burst_read(address: u32, len: usize, mode: Mode) -> Self {
        Self::new(address, Width::W8, Direction::Read, Data::Bytes(vec![0; len]), mode)
    }

    fn new(address: u32, width: Width, direction: Direction, data: Data, mode: Mode) -> Self {
        Self {
            id: TxnId(0),
            node: 0,
            address,
            width,
            direction,
            data,
            mode,
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn node(&self) -> u32 {
        self.node
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_burst(&self) -> bool {
        matches!(self.data, Data::Bytes(_))
    }

    /// Number of data beats on the bus.
    pub fn beats(&self) -> usize {
        match &self.data {
            Data::Word(_) => 1,
            Data::Bytes(bytes) => bytes.len(),
        }
    }

    pub(crate) fn stamp(&mut self, node: u32, id: TxnId) {
        self.node = node;
        self.id = id;
    }

    /// Fills in read data. Called once, by the simulation driver, before completion.
    pub(crate) fn complete_read(&mut self, data: Data) {
        debug_assert_eq!(self.direction, Direction::Read);
        self.data = match data {
            Data::Word(value) => Data::Word(value & self.width.mask()),
            bytes => bytes,
        };
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Read => "RD",
            Direction::Write => "WR",
        };
        match &self.data {
            Data::Word(value) => write!(
                f,
                "{} {}{} @{:#010x} = {:#x}",
                self.id,
                dir,
                self.width.bits(),
                self.address,
                value
            ),
            Data::Bytes(bytes) => write!(
                f,
                "{} {} burst @{:#010x} x{}",
                self.id,
                dir,
                self.address,
                bytes.len()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    Completed,
    Failed(BusFault),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub txn: Transaction,
    pub status: TxnStatus,
    /// Bus-wide completion order, shared by every node on the simulation.
    pub seq: u64,
    pub cycle: u64,
}

impl Completion {
    pub fn is_ok(&self) -> bool {
        self.status == TxnStatus::Completed
    }

    /// Read word, or the placeholder if the transaction was a burst or failed.
    pub fn word(&self) -> u32 {
        match self.txn.data() {
            Data::Word(value) => *value,
            Data::Bytes(_) => 0,
        }
    }

    pub fn into_data(self) -> Result<Data> {
        match self.status {
            TxnStatus::Completed => Ok(self.txn.data),
            TxnStatus::Failed(fault) => Err(TransactorError::BusProtocolError {
                address: self.txn.address,
                fault,
            }),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self.txn.data {
            Data::Bytes(bytes) => bytes,
            Data::Word(value) => value.to_le_bytes()[..self.txn.width.bytes()].to_vec(),
        }
    }
}

/// Native integer types that map onto a bus width.
pub trait BusWord: Copy + PartialEq + fmt::Debug + fmt::LowerHex {
    const WIDTH: Width;

    fn to_bus(self) -> u32;

    fn from_bus(value: u32) -> Self;
}

macro_rules! bus_word {
    ($ty:ty, $width:expr) => {
        impl BusWord for $ty {
            const WIDTH: Width = $width;

            fn to_bus(self) -> u32 {
                u32::from(self)
            }

            fn from_bus(value: u32) -> Self {
                (value & $width.mask()) as $ty
            }
        }
    };
}

bus_word!(u8, Width::W8);
bus_word!(u16, Width::W16);
bus_word!(u32, Width::W32);
