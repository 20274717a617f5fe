use log::error;

use crate::error::TransactorError;
use crate::transaction::Width;

/// Verification results for one node. Mismatches are reported when they
/// happen and counted towards the end-of-test outcome; they never stop the
/// transaction stream.
#[derive(Debug, Default)]
pub struct Scoreboard {
    node: u32,
    checks: u64,
    mismatches: Vec<TransactorError>,
}

impl Scoreboard {
    pub fn new(node: u32) -> Self {
        Self {
            node,
            ..Self::default()
        }
    }

    /// Compares one value, returning `true` on a match.
    pub fn check(&mut self, context: &str, address: u32, width: Width, actual: u32, expected: u32) -> bool {
        self.checks += 1;
        if actual == expected {
            return true;
        }
        let digits = width.bytes() * 2;
        error!(
            "node {} ***ERROR: mismatch for {context} at {address:#010x}. Got 0x{actual:0digits$x}, exp 0x{expected:0digits$x}",
            self.node
        );
        self.mismatches.push(TransactorError::VerificationMismatch {
            address,
            expected,
            actual,
        });
        false
    }

    pub fn checks(&self) -> u64 {
        self.checks
    }

    pub fn mismatch_count(&self) -> usize {
        self.mismatches.len()
    }

    pub fn mismatches(&self) -> &[TransactorError] {
        &self.mismatches
    }
}
