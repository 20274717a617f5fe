use thiserror::Error;

use crate::bus::BusFault;
use crate::transaction::{TxnId, Width};

pub type Result<T> = std::result::Result<T, TransactorError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactorError {
    /// A read check or burst verify saw a value other than the expected one.
    #[error("verification mismatch at {address:#010x}: got {actual:#x}, expected {expected:#x}")]
    VerificationMismatch {
        address: u32,
        expected: u32,
        actual: u32,
    },

    /// A handle was awaited that has no live or unclaimed entry in this node's queue.
    #[error("queue corruption on node {node}: no live entry for transaction {id}")]
    QueueCorruption { node: u32, id: TxnId },

    #[error("bus protocol error at {address:#010x}: {fault}")]
    BusProtocolError { address: u32, fault: BusFault },

    #[error("pairing starvation on node {node}: {pending_addresses} address and {pending_data} data tokens unpaired")]
    PairingStarvation {
        node: u32,
        pending_addresses: usize,
        pending_data: usize,
    },

    #[error("invalid access: {0}")]
    InvalidAccess(String),

    #[error("invalid burst at {address:#010x}: {reason}")]
    InvalidBurst { address: u32, reason: &'static str },

    #[error("node {node} has finished; no further transactions are accepted")]
    Halted { node: u32 },

    #[error("simulation driver is no longer running")]
    SimulationClosed,
}

impl TransactorError {
    /// Fatal errors indicate a broken stimulus or queue and should stop the test.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TransactorError::VerificationMismatch { .. } | TransactorError::BusProtocolError { .. }
        )
    }

    pub(crate) fn width_mismatch(expected: Width, found: Width) -> Self {
        TransactorError::InvalidAccess(format!(
            "read data requested as {}-bit but the pending read address is {}-bit",
            found.bits(),
            expected.bits()
        ))
    }
}
