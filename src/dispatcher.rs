//! Per-node transaction queue.
//!
//! Transactions go to the bus in enqueue order and complete in that order.
//! Awaiting any entry retires every older entry first, so a blocking issue
//! returns only once everything queued before it has finished.

use std::collections::{HashMap, VecDeque};

use log::{debug, warn};
use tokio::sync::oneshot;

use crate::error::{Result, TransactorError};
use crate::sim::BusPort;
use crate::transaction::{Completion, Transaction, TxnId, TxnStatus};

/// Claim ticket for an enqueued transaction. Valid for a single await.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnHandle {
    node: u32,
    id: TxnId,
}

impl TxnHandle {
    pub fn id(&self) -> TxnId {
        self.id
    }
}

struct InFlight {
    id: TxnId,
    retain: bool,
    completion: oneshot::Receiver<Completion>,
}

pub struct Dispatcher {
    node: u32,
    port: BusPort,
    next_id: u64,
    in_flight: VecDeque<InFlight>,
    completed: HashMap<TxnId, Completion>,
    retired: u64,
    failures: Vec<Completion>,
}

impl Dispatcher {
    pub fn new(node: u32, port: BusPort) -> Self {
        Self {
            node,
            port,
            next_id: 0,
            in_flight: VecDeque::new(),
            completed: HashMap::new(),
            retired: 0,
            failures: Vec::new(),
        }
    }

    pub fn enqueue(&mut self, txn: Transaction) -> Result<TxnHandle> {
        self.push(txn, true)
    }

    /// Enqueues a transaction whose completion nobody will claim.
    pub fn enqueue_detached(&mut self, txn: Transaction) -> Result<()> {
        self.push(txn, false).map(|_| ())
    }

    pub async fn issue_blocking(&mut self, txn: Transaction) -> Result<Completion> {
        let handle = self.enqueue(txn)?;
        self.await_handle(handle).await
    }

    pub async fn await_handle(&mut self, handle: TxnHandle) -> Result<Completion> {
        let corrupt = TransactorError::QueueCorruption {
            node: self.node,
            id: handle.id,
        };
        if handle.node != self.node {
            return Err(corrupt);
        }
        if let Some(completion) = self.completed.remove(&handle.id) {
            return Ok(completion);
        }
        if !self
            .in_flight
            .iter()
            .any(|entry| entry.id == handle.id && entry.retain)
        {
            return Err(corrupt);
        }
        loop {
            let (id, completion) = self.retire_next().await?;
            if id == handle.id {
                self.completed.remove(&id);
                return Ok(completion);
            }
        }
    }

    pub async fn drain(&mut self) -> Result<()> {
        while !self.in_flight.is_empty() {
            self.retire_next().await?;
        }
        Ok(())
    }

    pub fn outstanding(&self) -> usize {
        self.in_flight.len()
    }

    /// Completions retired so far, claimed or not.
    pub fn retired(&self) -> u64 {
        self.retired
    }

    /// Frees retained completions whose handles were never awaited and
    /// returns how many there were.
    pub fn discard_unclaimed(&mut self) -> usize {
        let unclaimed = self.completed.len();
        self.completed.clear();
        unclaimed
    }

    pub fn failures(&self) -> &[Completion] {
        &self.failures
    }

    pub fn port(&self) -> &BusPort {
        &self.port
    }

    fn push(&mut self, mut txn: Transaction, retain: bool) -> Result<TxnHandle> {
        let id = TxnId(self.next_id);
        self.next_id += 1;
        txn.stamp(self.node, id);
        debug!("node {} enqueue {txn} ({:?})", self.node, txn.mode());
        let completion = self.port.submit(txn)?;
        self.in_flight.push_back(InFlight {
            id,
            retain,
            completion,
        });
        Ok(TxnHandle {
            node: self.node,
            id,
        })
    }

    /// Waits for the oldest in-flight entry. Retained entries other than the
    /// returned one stay claimable in `completed`.
    async fn retire_next(&mut self) -> Result<(TxnId, Completion)> {
        let entry = self
            .in_flight
            .pop_front()
            .ok_or(TransactorError::SimulationClosed)?;
        let completion = entry
            .completion
            .await
            .map_err(|_| TransactorError::SimulationClosed)?;
        debug_assert_eq!(completion.txn.id(), entry.id);
        self.retired += 1;

        if let TxnStatus::Failed(fault) = completion.status {
            warn!(
                "node {} {} failed with {fault} at cycle {}",
                self.node, completion.txn, completion.cycle
            );
            self.failures.push(completion.clone());
        }
        if entry.retain {
            self.completed.insert(entry.id, completion.clone());
        }
        Ok((entry.id, completion))
    }
}
