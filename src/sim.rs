//! Simulation driver: a tokio task that owns the bus model and the clock.
//!
//! Every node talks to the driver through a [`BusPort`]. Commands from all
//! nodes share one channel, so the bus sees them one at a time in arrival
//! order and each node's own requests stay in program order.

use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::bus::SimBus;
use crate::error::{Result, TransactorError};
use crate::transaction::{Completion, Direction, Transaction, TxnStatus};

pub(crate) enum BusCommand {
    Transact {
        txn: Transaction,
        reply: oneshot::Sender<Completion>,
    },
    Advance {
        cycles: u64,
        reply: oneshot::Sender<u64>,
    },
    Finish {
        node: u32,
        passed: bool,
        reply: oneshot::Sender<u64>,
    },
}

/// A node's connection to the simulation.
#[derive(Debug, Clone)]
pub struct BusPort {
    commands: mpsc::UnboundedSender<BusCommand>,
    clock: watch::Receiver<u64>,
}

impl BusPort {
    /// Hands a transaction to the bus without waiting.
    pub(crate) fn submit(&self, txn: Transaction) -> Result<oneshot::Receiver<Completion>> {
        let (reply, completion) = oneshot::channel();
        self.commands
            .send(BusCommand::Transact { txn, reply })
            .map_err(|_| TransactorError::SimulationClosed)?;
        Ok(completion)
    }

    /// Advances the clock once every request sent before it has completed.
    pub(crate) async fn advance(&self, cycles: u64) -> Result<u64> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(BusCommand::Advance { cycles, reply })
            .map_err(|_| TransactorError::SimulationClosed)?;
        done.await.map_err(|_| TransactorError::SimulationClosed)
    }

    pub(crate) async fn finish(&self, node: u32, passed: bool) -> Result<u64> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(BusCommand::Finish { node, passed, reply })
            .map_err(|_| TransactorError::SimulationClosed)?;
        done.await.map_err(|_| TransactorError::SimulationClosed)
    }

    /// Current simulated cycle as last published by the driver.
    pub fn now(&self) -> u64 {
        *self.clock.borrow()
    }
    /// A port whose driver has already gone away.
    #[cfg(test)]
    pub(crate) fn closed() -> Self {
        let (commands, _) = mpsc::unbounded_channel();
        let (_, clock) = watch::channel(0);
        Self { commands, clock }
    }
}

impl std::fmt::Debug for BusCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusCommand::Transact { txn, .. } => write!(f, "Transact({txn})"),
            BusCommand::Advance { cycles, .. } => write!(f, "Advance({cycles})"),
            BusCommand::Finish { node, passed, .. } => write!(f, "Finish({node}, {passed})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeReport {
    pub node: u32,
    pub passed: bool,
    pub cycle: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimSummary {
    pub cycles: u64,
    pub transactions: u64,
    pub reads: u64,
    pub writes: u64,
    pub faults: u64,
    pub finished: Vec<NodeReport>,
}

impl SimSummary {
    pub fn all_passed(&self) -> bool {
        self.finished.iter().all(|report| report.passed)
    }
}

struct Driver<B> {
    bus: B,
    cycle: u64,
    summary: SimSummary,
    clock: watch::Sender<u64>,
}

impl<B: SimBus> Driver<B> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<BusCommand>) -> (B, SimSummary) {
        while let Some(command) = commands.recv().await {
            match command {
                BusCommand::Transact { txn, reply } => {
                    let completion = self.transact(txn);
                    // The issuing node may have been dropped; the access still happened.
                    let _ = reply.send(completion);
                }
                BusCommand::Advance { cycles, reply } => {
                    self.bus.advance(cycles);
                    self.tick(cycles);
                    let _ = reply.send(self.cycle);
                }
                BusCommand::Finish {
                    node,
                    passed,
                    reply,
                } => {
                    info!(
                        "node {node} finished at cycle {}: {}",
                        self.cycle,
                        if passed { "PASS" } else { "FAIL" }
                    );
                    self.summary.finished.push(NodeReport {
                        node,
                        passed,
                        cycle: self.cycle,
                    });
                    let _ = reply.send(self.cycle);
                }
            }
        }
        self.summary.cycles = self.cycle;
        (self.bus, self.summary)
    }

    fn transact(&mut self, mut txn: Transaction) -> Completion {
        self.tick(self.bus.latency(&txn));
        let status = match self.bus.transact(&txn) {
            Ok(Some(data)) if txn.direction() == Direction::Read => {
                txn.complete_read(data);
                TxnStatus::Completed
            }
            Ok(_) => TxnStatus::Completed,
            Err(fault) => {
                warn!("node {} {txn}: bus {fault}", txn.node());
                self.summary.faults += 1;
                TxnStatus::Failed(fault)
            }
        };
        match txn.direction() {
            Direction::Read => self.summary.reads += 1,
            Direction::Write => self.summary.writes += 1,
        }
        self.summary.transactions += 1;
        debug!("node {} {txn} done at cycle {}", txn.node(), self.cycle);
        Completion {
            txn,
            status,
            seq: self.summary.transactions,
            cycle: self.cycle,
        }
    }

    fn tick(&mut self, cycles: u64) {
        self.cycle += cycles;
        self.clock.send_replace(self.cycle);
    }
}

/// A running simulation. Must be spawned from within a tokio runtime.
pub struct Simulation<B> {
    port: BusPort,
    task: JoinHandle<(B, SimSummary)>,
}

impl<B: SimBus> Simulation<B> {
    pub fn spawn(bus: B) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (clock, clock_rx) = watch::channel(0);
        let driver = Driver {
            bus,
            cycle: 0,
            summary: SimSummary::default(),
            clock,
        };
        let task = tokio::spawn(driver.run(receiver));
        Self {
            port: BusPort {
                commands,
                clock: clock_rx,
            },
            task,
        }
    }

    pub fn port(&self) -> BusPort {
        self.port.clone()
    }

    /// Stops the driver and hands back the bus model.
    ///
    /// Waits until every port, including those held by transactors, is dropped.
    pub async fn shutdown(self) -> Result<(B, SimSummary)> {
        drop(self.port);
        self.task
            .await
            .map_err(|_| TransactorError::SimulationClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::transaction::{Mode, Width};

    #[tokio::test]
    async fn test_driver_completes_in_arrival_order() {
        let sim = Simulation::spawn(MemoryBus::new().with_latency(2, 0));
        let port = sim.port();

        let first = port
            .submit(Transaction::write(0x100, Width::W32, 1, Mode::Async))
            .unwrap();
        let second = port
            .submit(Transaction::read(0x100, Width::W32, Mode::Async))
            .unwrap();

        let second = second.await.unwrap();
        let first = first.await.unwrap();
        assert_eq!((first.seq, first.cycle), (1, 2));
        assert_eq!((second.seq, second.cycle), (2, 4));
        assert_eq!(second.word(), 1);
        assert_eq!(port.now(), 4);

        drop(port);
        let (bus, summary) = sim.shutdown().await.unwrap();
        assert_eq!(bus.peek_word(0x100), 1);
        assert_eq!(summary.transactions, 2);
        assert_eq!((summary.reads, summary.writes), (1, 1));
    }

    #[tokio::test]
    async fn test_advance_and_finish() {
        let sim = Simulation::spawn(MemoryBus::new());
        let port = sim.port();
        assert_eq!(port.advance(10).await.unwrap(), 10);
        assert_eq!(port.finish(3, false).await.unwrap(), 10);
        drop(port);

        let (bus, summary) = sim.shutdown().await.unwrap();
        assert_eq!(bus.idle_cycles(), 10);
        assert_eq!(
            summary.finished,
            vec![NodeReport {
                node: 3,
                passed: false,
                cycle: 10
            }]
        );
        assert!(!summary.all_passed());
    }
}
