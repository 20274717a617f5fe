//! Stimulus-facing transactor for one virtual-processor node.

use std::collections::VecDeque;
use std::convert::Infallible;

use log::{debug, info, warn};

use crate::config::TransactorConfig;
use crate::decoupler::{AddressToken, DataToken, Decoupler};
use crate::dispatcher::{Dispatcher, TxnHandle};
use crate::error::{Result, TransactorError};
use crate::pattern::BurstDescriptor;
use crate::scoreboard::Scoreboard;
use crate::sim::BusPort;
use crate::tick::{RunState, TestOutcome, TickController};
use crate::transaction::{BusWord, Completion, Direction, Mode, Transaction, Width};

/// A read issued through the decoupled address path, waiting for its data call.
#[derive(Debug, Clone, Copy)]
struct PendingRead {
    handle: TxnHandle,
    address: u32,
    width: Width,
}

pub struct Transactor {
    config: TransactorConfig,
    dispatcher: Dispatcher,
    decoupler: Decoupler,
    reads: VecDeque<PendingRead>,
    scoreboard: Scoreboard,
    controller: TickController,
}

impl Transactor {
    pub fn new(config: TransactorConfig, port: BusPort) -> Self {
        info!("node {} starting test {}", config.node, config.test_name);
        Self {
            dispatcher: Dispatcher::new(config.node, port),
            decoupler: Decoupler::new(),
            reads: VecDeque::new(),
            scoreboard: Scoreboard::new(config.node),
            controller: TickController::new(config.node, config.test_name.clone()),
            config,
        }
    }

    pub fn node(&self) -> u32 {
        self.config.node
    }

    pub fn config(&self) -> &TransactorConfig {
        &self.config
    }

    pub fn now(&self) -> u64 {
        self.dispatcher.port().now()
    }

    pub fn state(&self) -> RunState {
        self.controller.state()
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn mismatches(&self) -> usize {
        self.scoreboard.mismatch_count()
    }

    pub fn outstanding(&self) -> usize {
        self.dispatcher.outstanding()
    }

    // Single-beat accesses

    pub async fn write<W: BusWord>(&mut self, address: u32, data: W) -> Result<()> {
        let txn = Transaction::write(address, W::WIDTH, data.to_bus(), Mode::Blocking);
        self.blocking(txn).await.map(|_| ())
    }

    pub fn write_async<W: BusWord>(&mut self, address: u32, data: W) -> Result<()> {
        let txn = Transaction::write(address, W::WIDTH, data.to_bus(), Mode::Async);
        self.detached(txn)
    }

    pub async fn read<W: BusWord>(&mut self, address: u32) -> Result<W> {
        let txn = Transaction::read(address, W::WIDTH, Mode::Blocking);
        let completion = self.blocking(txn).await?;
        Ok(W::from_bus(completion.word()))
    }

    /// Issues a read without waiting; claim the data with [`Transactor::wait`].
    pub fn read_async<W: BusWord>(&mut self, address: u32) -> Result<TxnHandle> {
        self.controller.ensure_running()?;
        self.dispatcher
            .enqueue(Transaction::read(address, W::WIDTH, Mode::Async))
    }

    pub async fn wait(&mut self, handle: TxnHandle) -> Result<Completion> {
        self.dispatcher.await_handle(handle).await
    }

    /// Blocking read compared against `expected`. A mismatch is reported and
    /// recorded, and `Ok(false)` is returned.
    pub async fn read_check<W: BusWord>(&mut self, address: u32, expected: W) -> Result<bool> {
        let actual: W = self.read(address).await?;
        Ok(self
            .scoreboard
            .check("read check", address, W::WIDTH, actual.to_bus(), expected.to_bus()))
    }

    // Bursts

    pub async fn burst_write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let desc = BurstDescriptor::explicit(address, data.to_vec())?;
        self.burst_write_pattern(desc, Mode::Blocking).await
    }

    pub fn burst_write_async(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.queue_burst(BurstDescriptor::explicit(address, data.to_vec())?)
    }

    pub async fn burst_read(&mut self, address: u32, len: usize) -> Result<Vec<u8>> {
        check_burst_len(address, len)?;
        let completion = self
            .blocking(Transaction::burst_read(address, len, Mode::Blocking))
            .await?;
        Ok(completion.into_bytes())
    }

    pub fn burst_read_async(&mut self, address: u32, len: usize) -> Result<TxnHandle> {
        check_burst_len(address, len)?;
        self.controller.ensure_running()?;
        self.dispatcher
            .enqueue(Transaction::burst_read(address, len, Mode::Async))
    }

    pub async fn burst_write_increment(&mut self, address: u32, seed: u8, len: usize) -> Result<()> {
        let desc = BurstDescriptor::increment(address, seed, len)?;
        self.burst_write_pattern(desc, Mode::Blocking).await
    }

    pub fn burst_write_increment_async(&mut self, address: u32, seed: u8, len: usize) -> Result<()> {
        self.queue_burst(BurstDescriptor::increment(address, seed, len)?)
    }

    pub async fn burst_write_random(&mut self, address: u32, seed: u8, len: usize) -> Result<()> {
        let desc = BurstDescriptor::random(address, seed, len)?;
        self.burst_write_pattern(desc, Mode::Blocking).await
    }

    pub fn burst_write_random_async(&mut self, address: u32, seed: u8, len: usize) -> Result<()> {
        self.queue_burst(BurstDescriptor::random(address, seed, len)?)
    }

    /// Writes a burst described by `desc`. In `Mode::Async` this returns as
    /// soon as the burst is queued.
    pub async fn burst_write_pattern(&mut self, desc: BurstDescriptor, mode: Mode) -> Result<()> {
        let address = desc.start_address();
        let txn = Transaction::burst_write(address, desc.into_payload(), mode);
        match mode {
            Mode::Async => self.detached(txn),
            Mode::Blocking => self.blocking(txn).await.map(|_| ()),
        }
    }

    fn queue_burst(&mut self, desc: BurstDescriptor) -> Result<()> {
        let address = desc.start_address();
        self.detached(Transaction::burst_write(address, desc.into_payload(), Mode::Async))
    }

    pub async fn burst_read_check_increment(&mut self, address: u32, seed: u8, len: usize) -> Result<usize> {
        self.burst_read_check(&BurstDescriptor::increment(address, seed, len)?)
            .await
    }

    pub async fn burst_read_check_random(&mut self, address: u32, seed: u8, len: usize) -> Result<usize> {
        self.burst_read_check(&BurstDescriptor::random(address, seed, len)?)
            .await
    }

    /// Reads the region described by `desc` and compares every byte against
    /// the pattern. Returns the number of mismatching bytes.
    pub async fn burst_read_check(&mut self, desc: &BurstDescriptor) -> Result<usize> {
        let address = desc.start_address();
        let actual = self.burst_read(address, desc.length()).await?;
        let mut mismatches = 0;
        for (i, &byte) in actual.iter().enumerate() {
            let expected = desc.pattern().byte_at(i).unwrap_or_default();
            let at = address.wrapping_add(i as u32);
            if !self
                .scoreboard
                .check("burst check", at, Width::W8, u32::from(byte), u32::from(expected))
            {
                mismatches += 1;
            }
        }
        Ok(mismatches)
    }

    // Decoupled address and data phases

    pub fn write_address_async(&mut self, address: u32, width: Width) -> Result<()> {
        self.controller.ensure_running()?;
        self.decoupler.push_address(AddressToken::write(address, width));
        self.pair()
    }

    /// Queues write data. `lane` pins the value to a byte lane of the 32-bit
    /// slot; `None` places it where the paired address selects.
    pub fn write_data_async<W: BusWord>(&mut self, data: W, lane: Option<u8>) -> Result<()> {
        self.controller.ensure_running()?;
        self.decoupler
            .push_data(DataToken::new(data.to_bus(), W::WIDTH, lane)?);
        self.pair()
    }

    pub fn read_address_async(&mut self, address: u32, width: Width) -> Result<()> {
        self.controller.ensure_running()?;
        self.decoupler.push_address(AddressToken::read(address, width));
        self.pair()
    }

    /// Data for the oldest decoupled read address.
    pub async fn read_data<W: BusWord>(&mut self) -> Result<W> {
        let pending = self.next_read(W::WIDTH)?;
        let completion = self.dispatcher.await_handle(pending.handle).await?;
        Ok(W::from_bus(completion.word()))
    }

    pub async fn read_data_check<W: BusWord>(&mut self, expected: W) -> Result<bool> {
        let address = self.reads.front().map(|read| read.address);
        let actual: W = self.read_data().await?;
        Ok(self.scoreboard.check(
            "read data check",
            address.unwrap_or_default(),
            W::WIDTH,
            actual.to_bus(),
            expected.to_bus(),
        ))
    }

    // Time and end of test

    pub async fn tick(&mut self, extra_cycles: u64, finish: bool, had_error: bool) -> Result<Option<TestOutcome>> {
        self.controller
            .tick(
                &mut self.dispatcher,
                &self.decoupler,
                &self.scoreboard,
                self.reads.len(),
                extra_cycles,
                finish,
                had_error,
            )
            .await
    }

    /// Ends the test after the configured number of settling cycles.
    pub async fn finish(&mut self, had_error: bool) -> Result<TestOutcome> {
        let outcome = self
            .tick(self.config.finish_cycles, true, had_error)
            .await?;
        outcome.ok_or(TransactorError::Halted { node: self.node() })
    }

    /// Parks this node for good once its test is over.
    pub async fn halt(self) -> Infallible {
        debug!("node {} halted in state {:?}", self.node(), self.state());
        std::future::pending().await
    }

    async fn blocking(&mut self, txn: Transaction) -> Result<Completion> {
        self.controller.ensure_running()?;
        if self.decoupler.has_unpaired() {
            return Err(TransactorError::PairingStarvation {
                node: self.node(),
                pending_addresses: self.decoupler.pending_addresses(),
                pending_data: self.decoupler.pending_data(),
            });
        }
        self.dispatcher.issue_blocking(txn).await
    }

    fn detached(&mut self, txn: Transaction) -> Result<()> {
        self.controller.ensure_running()?;
        self.dispatcher.enqueue_detached(txn)
    }

    fn pair(&mut self) -> Result<()> {
        while let Some(txn) = self.decoupler.try_pair() {
            let address = txn.address();
            let width = txn.width();
            let direction = txn.direction();
            let queued = if direction == Direction::Read {
                self.dispatcher.enqueue(txn).map(|handle| {
                    self.reads.push_back(PendingRead {
                        handle,
                        address,
                        width,
                    });
                })
            } else {
                self.dispatcher.enqueue_detached(txn)
            };
            if let Err(err) = queued {
                warn!(
                    "node {} lost paired {direction:?} at 0x{address:08x}: {err}",
                    self.node()
                );
                return Err(err);
            }
        }
        Ok(())
    }

    fn next_read(&mut self, width: Width) -> Result<PendingRead> {
        let Some(pending) = self.reads.front().copied() else {
            return Err(TransactorError::PairingStarvation {
                node: self.node(),
                pending_addresses: self.decoupler.pending_addresses(),
                pending_data: 0,
            });
        };
        if pending.width != width {
            return Err(TransactorError::width_mismatch(pending.width, width));
        }
        self.reads.pop_front();
        Ok(pending)
    }
}

fn check_burst_len(address: u32, len: usize) -> Result<()> {
    if len == 0 {
        return Err(TransactorError::InvalidBurst {
            address,
            reason: "burst length must be non-zero",
        });
    }
    Ok(())
}
