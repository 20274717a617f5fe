//! Burst payload patterns.
//!
//! Both generators are pure functions of `(seed, index)`, so a verify pass
//! can recompute the expected byte for any offset without keeping the
//! written buffer around.

use crate::error::{Result, TransactorError};

pub fn increment(seed: u8, index: usize) -> u8 {
    seed.wrapping_add(index as u8)
}

/// Counter-based pseudo-random byte: a splitmix64 finalizer over seed and index.
pub fn random(seed: u8, index: usize) -> u8 {
    let mut z = (u64::from(seed) << 56) ^ (index as u64);
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z >> 56) as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BurstPattern {
    Explicit(Vec<u8>),
    Increment(u8),
    Random(u8),
}

impl BurstPattern {
    /// Expected byte at `index`; explicit buffers yield `None` past their end.
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        match self {
            BurstPattern::Explicit(bytes) => bytes.get(index).copied(),
            BurstPattern::Increment(seed) => Some(increment(*seed, index)),
            BurstPattern::Random(seed) => Some(random(*seed, index)),
        }
    }

    pub fn materialize(&self, len: usize) -> Vec<u8> {
        match self {
            BurstPattern::Explicit(bytes) => bytes.iter().copied().take(len).collect(),
            BurstPattern::Increment(seed) => (0..len).map(|i| increment(*seed, i)).collect(),
            BurstPattern::Random(seed) => (0..len).map(|i| random(*seed, i)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstDescriptor {
    start_address: u32,
    length: usize,
    pattern: BurstPattern,
}

impl BurstDescriptor {
    pub fn new(start_address: u32, length: usize, pattern: BurstPattern) -> Result<Self> {
        if length == 0 {
            return Err(TransactorError::InvalidBurst {
                address: start_address,
                reason: "burst length must be non-zero",
            });
        }
        if let BurstPattern::Explicit(bytes) = &pattern {
            if bytes.len() != length {
                return Err(TransactorError::InvalidBurst {
                    address: start_address,
                    reason: "explicit buffer length does not match burst length",
                });
            }
        }
        Ok(Self {
            start_address,
            length,
            pattern,
        })
    }

    pub fn explicit(start_address: u32, bytes: Vec<u8>) -> Result<Self> {
        let length = bytes.len();
        Self::new(start_address, length, BurstPattern::Explicit(bytes))
    }

    pub fn increment(start_address: u32, seed: u8, length: usize) -> Result<Self> {
        Self::new(start_address, length, BurstPattern::Increment(seed))
    }

    pub fn random(start_address: u32, seed: u8, length: usize) -> Result<Self> {
        Self::new(start_address, length, BurstPattern::Random(seed))
    }

    pub fn start_address(&self) -> u32 {
        self.start_address
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn pattern(&self) -> &BurstPattern {
        &self.pattern
    }

    pub fn payload(&self) -> Vec<u8> {
        self.pattern.materialize(self.length)
    }

    pub(crate) fn into_payload(self) -> Vec<u8> {
        match self.pattern {
            BurstPattern::Explicit(bytes) => bytes,
            pattern => pattern.materialize(self.length),
        }
    }
}
