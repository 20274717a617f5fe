//! Independent address and data phases.
//!
//! Address tokens and data tokens are queued separately and paired in
//! arrival order. A write address selects byte lanes of a 32-bit slot; data
//! tokens are folded into an in-flight word until those lanes are covered.
//! Lanes written by a token but not selected by the address stay valid in
//! the in-flight word and can satisfy a later address.

use std::collections::VecDeque;

use crate::error::{Result, TransactorError};
use crate::transaction::{Direction, Mode, Transaction, Width};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressToken {
    pub address: u32,
    pub width: Width,
    pub direction: Direction,
}

impl AddressToken {
    pub fn write(address: u32, width: Width) -> Self {
        Self {
            address,
            width,
            direction: Direction::Write,
        }
    }

    pub fn read(address: u32, width: Width) -> Self {
        Self {
            address,
            width,
            direction: Direction::Read,
        }
    }

    /// First lane and lane mask this address selects within its 32-bit slot.
    fn lanes(&self) -> (u8, u8) {
        let bytes = self.width.bytes() as u8;
        let first = (self.address as u8 & 3) & !(bytes - 1);
        (first, lane_mask(first, bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataToken {
    data: u32,
    width: Width,
    lane: Option<u8>,
}

impl DataToken {
    /// `lane` places the value at a fixed byte position; `None` lets it land on
    /// whatever lanes the paired address selects.
    pub fn new(data: u32, width: Width, lane: Option<u8>) -> Result<Self> {
        if let Some(lane) = lane {
            if usize::from(lane) + width.bytes() > 4 {
                return Err(TransactorError::InvalidAccess(format!(
                    "{}-bit data does not fit at byte lane {lane}",
                    width.bits()
                )));
            }
        }
        Ok(Self {
            data: data & width.mask(),
            width,
            lane,
        })
    }

    pub fn data(&self) -> u32 {
        self.data
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn lane(&self) -> Option<u8> {
        self.lane
    }

    fn first_lane(&self, default: u8) -> u8 {
        match self.lane {
            Some(lane) => lane,
            // Clamp so a lane-less token never runs past lane 3.
            None => default.min(4 - self.width.bytes() as u8),
        }
    }
}

fn lane_mask(first: u8, bytes: u8) -> u8 {
    (((1u16 << bytes) - 1) << first) as u8 & 0xf
}

#[derive(Debug, Default)]
pub struct Decoupler {
    addresses: VecDeque<AddressToken>,
    data: VecDeque<DataToken>,
    slot: [u8; 4],
    valid: u8,
}

impl Decoupler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_address(&mut self, token: AddressToken) {
        self.addresses.push_back(token);
    }

    pub fn push_data(&mut self, token: DataToken) {
        self.data.push_back(token);
    }

    /// Pairs the oldest address token, or returns `None` without consuming
    /// anything if the queued data cannot cover it yet.
    pub fn try_pair(&mut self) -> Option<Transaction> {
        let head = *self.addresses.front()?;
        if head.direction == Direction::Read {
            self.addresses.pop_front();
            return Some(Transaction::read(head.address, head.width, Mode::Async));
        }

        let (first, required) = head.lanes();
        let mut covered = self.valid;
        let mut needed = 0;
        while covered & required != required {
            let token = self.data.get(needed)?;
            let start = token.first_lane(first);
            covered |= lane_mask(start, token.width.bytes() as u8);
            needed += 1;
        }

        self.addresses.pop_front();
        for token in self.data.drain(..needed) {
            let start = token.first_lane(first);
            let bytes = token.data.to_le_bytes();
            for i in 0..token.width.bytes() {
                self.slot[usize::from(start) + i] = bytes[i];
            }
        }
        self.valid = covered & !required;

        let value = self.slot[usize::from(first)..usize::from(first) + head.width.bytes()]
            .iter()
            .rev()
            .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte));
        Some(Transaction::write(head.address, head.width, value, Mode::Async))
    }

    pub fn has_unpaired(&self) -> bool {
        !self.addresses.is_empty() || !self.data.is_empty()
    }

    pub fn pending_addresses(&self) -> usize {
        self.addresses.len()
    }

    pub fn pending_data(&self) -> usize {
        self.data.len()
    }
}
