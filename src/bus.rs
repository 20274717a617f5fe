//! Boundary with the simulated bus, plus a sparse memory model that stands
//! in for real hardware in tests and the demo binary.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use crate::transaction::{Data, Direction, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusFault {
    /// No target decodes the address.
    DecodeError,
    /// The target accepted the address but rejected the access.
    SlaveError,
}

impl fmt::Display for BusFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusFault::DecodeError => write!(f, "decode error"),
            BusFault::SlaveError => write!(f, "slave error"),
        }
    }
}

/// A simulated bus as seen from the transactor.
///
/// Requests arrive one at a time in the order the simulation driver received
/// them. `transact` returns read data for reads and `None` for writes.
pub trait SimBus: Send + 'static {
    fn transact(&mut self, txn: &Transaction) -> Result<Option<Data>, BusFault>;

    /// Cycles the access occupies the bus.
    fn latency(&self, _txn: &Transaction) -> u64 {
        1
    }

    /// Idle clock cycles with no transaction in flight.
    fn advance(&mut self, _cycles: u64) {}
}

#[derive(Debug, Clone)]
pub struct MemoryBus {
    memory: HashMap<u32, u8>,
    fill: u8,
    access_latency: u64,
    beat_latency: u64,
    mapped: Option<Range<u64>>,
    faults: Vec<Range<u64>>,
    idle_cycles: u64,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            memory: HashMap::new(),
            fill: 0,
            access_latency: 1,
            beat_latency: 0,
            mapped: None,
            faults: Vec::new(),
            idle_cycles: 0,
        }
    }

    /// Value returned for bytes that were never written.
    pub fn fill(mut self, byte: u8) -> Self {
        self.fill = byte;
        self
    }

    pub fn with_latency(mut self, access: u64, per_beat: u64) -> Self {
        self.access_latency = access;
        self.beat_latency = per_beat;
        self
    }

    /// Accesses touching bytes outside `range` answer with a decode error.
    pub fn mapped(mut self, range: Range<u64>) -> Self {
        self.mapped = Some(range);
        self
    }

    /// Accesses touching bytes inside `range` answer with a slave error.
    pub fn fault_region(mut self, range: Range<u64>) -> Self {
        self.faults.push(range);
        self
    }

    pub fn peek(&self, address: u32) -> u8 {
        self.memory.get(&address).copied().unwrap_or(self.fill)
    }

    pub fn peek_word(&self, address: u32) -> u32 {
        u32::from_le_bytes(std::array::from_fn(|i| {
            self.peek(address.wrapping_add(i as u32))
        }))
    }

    pub fn poke(&mut self, address: u32, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            self.memory.insert(address.wrapping_add(i as u32), byte);
        }
    }

    pub fn idle_cycles(&self) -> u64 {
        self.idle_cycles
    }

    fn check(&self, txn: &Transaction) -> Result<(), BusFault> {
        let span = txn.beats() * txn.width().bytes();
        let start = u64::from(txn.address());
        let access = start..start + span as u64;
        if let Some(mapped) = &self.mapped {
            if access.start < mapped.start || access.end > mapped.end {
                return Err(BusFault::DecodeError);
            }
        }
        if self
            .faults
            .iter()
            .any(|fault| access.start < fault.end && fault.start < access.end)
        {
            return Err(BusFault::SlaveError);
        }
        Ok(())
    }

    fn read_bytes(&self, address: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.peek(address.wrapping_add(i as u32)))
            .collect()
    }
}

impl SimBus for MemoryBus {
    fn transact(&mut self, txn: &Transaction) -> Result<Option<Data>, BusFault> {
        self.check(txn)?;
        let address = txn.address();
        match (txn.direction(), txn.data()) {
            (Direction::Write, Data::Word(value)) => {
                let bytes = value.to_le_bytes();
                self.poke(address, &bytes[..txn.width().bytes()]);
                Ok(None)
            }
            (Direction::Write, Data::Bytes(bytes)) => {
                self.poke(address, bytes);
                Ok(None)
            }
            (Direction::Read, Data::Word(_)) => {
                let bytes = self.read_bytes(address, txn.width().bytes());
                let value = bytes
                    .iter()
                    .rev()
                    .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte));
                Ok(Some(Data::Word(value)))
            }
            (Direction::Read, Data::Bytes(placeholder)) => {
                Ok(Some(Data::Bytes(self.read_bytes(address, placeholder.len()))))
            }
        }
    }

    fn latency(&self, txn: &Transaction) -> u64 {
        self.access_latency + self.beat_latency * txn.beats() as u64
    }

    fn advance(&mut self, cycles: u64) {
        self.idle_cycles += cycles;
    }
}
