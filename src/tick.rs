//! End-of-test sequencing: `Running -> Draining -> Finished`.

use log::{info, warn};

use crate::decoupler::Decoupler;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, TransactorError};
use crate::scoreboard::Scoreboard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Draining,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub node: u32,
    pub test_name: String,
    pub passed: bool,
    pub flagged_by_stimulus: bool,
    pub mismatches: usize,
    pub bus_faults: usize,
    pub transactions: u64,
    pub cycle: u64,
}

#[derive(Debug)]
pub struct TickController {
    node: u32,
    test_name: String,
    state: RunState,
}

impl TickController {
    pub fn new(node: u32, test_name: impl Into<String>) -> Self {
        Self {
            node,
            test_name: test_name.into(),
            state: RunState::Running,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn ensure_running(&self) -> Result<()> {
        match self.state {
            RunState::Running => Ok(()),
            RunState::Draining | RunState::Finished => Err(TransactorError::Halted { node: self.node }),
        }
    }

    /// Advances the clock by `extra_cycles`, behind any outstanding requests.
    /// With `finish` set, drains the node first and returns its outcome.
    /// `pending_reads` counts decoupled reads whose data was never claimed.
    #[allow(clippy::too_many_arguments)]
    pub async fn tick(
        &mut self,
        dispatcher: &mut Dispatcher,
        decoupler: &Decoupler,
        scoreboard: &Scoreboard,
        pending_reads: usize,
        extra_cycles: u64,
        finish: bool,
        had_error: bool,
    ) -> Result<Option<TestOutcome>> {
        self.ensure_running()?;
        if !finish {
            dispatcher.port().advance(extra_cycles).await?;
            return Ok(None);
        }

        self.state = RunState::Draining;
        if decoupler.has_unpaired() || pending_reads > 0 {
            return Err(TransactorError::PairingStarvation {
                node: self.node,
                pending_addresses: decoupler.pending_addresses() + pending_reads,
                pending_data: decoupler.pending_data(),
            });
        }
        dispatcher.drain().await?;
        let unclaimed = dispatcher.discard_unclaimed();
        if unclaimed > 0 {
            warn!("node {} dropped {unclaimed} unclaimed completions", self.node);
        }
        dispatcher.port().advance(extra_cycles).await?;

        let mismatches = scoreboard.mismatch_count();
        let bus_faults = dispatcher.failures().len();
        let passed = !had_error && mismatches == 0 && bus_faults == 0;
        let cycle = dispatcher.port().finish(self.node, passed).await?;

        info!(
            "node {} {}: {} ({} checks, {mismatches} mismatches, {bus_faults} bus faults) at cycle {cycle}",
            self.node,
            self.test_name,
            if passed { "PASS" } else { "FAIL" },
            scoreboard.checks(),
        );
        self.state = RunState::Finished;
        Ok(Some(TestOutcome {
            node: self.node,
            test_name: self.test_name.clone(),
            passed,
            flagged_by_stimulus: had_error,
            mismatches,
            bus_faults,
            transactions: dispatcher.retired(),
            cycle,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::decoupler::{AddressToken, DataToken};
    use crate::sim::Simulation;
    use crate::transaction::{Mode, Transaction, Width};

    #[tokio::test]
    async fn test_plain_tick_keeps_running() {
        let sim = Simulation::spawn(MemoryBus::new());
        let mut dispatcher = Dispatcher::new(0, sim.port());
        let mut controller = TickController::new(0, "tick");

        let outcome = controller
            .tick(&mut dispatcher, &Decoupler::new(), &Scoreboard::new(0), 0, 7, false, false)
            .await
            .unwrap();
        assert_eq!(outcome, None);
        assert_eq!(controller.state(), RunState::Running);
        assert!(controller.ensure_running().is_ok());
        assert_eq!(dispatcher.port().now(), 7);
    }

    #[tokio::test]
    async fn test_finish_moves_to_finished() {
        let sim = Simulation::spawn(MemoryBus::new());
        let mut dispatcher = Dispatcher::new(3, sim.port());
        let mut controller = TickController::new(3, "tick");
        dispatcher
            .enqueue_detached(Transaction::write(0x0, Width::W32, 1, Mode::Async))
            .unwrap();

        let outcome = controller
            .tick(&mut dispatcher, &Decoupler::new(), &Scoreboard::new(3), 0, 2, true, false)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.transactions, 1);
        assert_eq!(outcome.cycle, 3);
        assert_eq!(controller.state(), RunState::Finished);
        assert_eq!(controller.ensure_running(), Err(TransactorError::Halted { node: 3 }));
    }

    #[tokio::test]
    async fn test_finish_with_unpaired_tokens_stays_draining() {
        let sim = Simulation::spawn(MemoryBus::new());
        let mut dispatcher = Dispatcher::new(0, sim.port());
        let mut controller = TickController::new(0, "tick");
        let mut decoupler = Decoupler::new();
        decoupler.push_data(DataToken::new(0x5a, Width::W8, Some(1)).unwrap());

        let err = controller
            .tick(&mut dispatcher, &decoupler, &Scoreboard::new(0), 0, 0, true, false)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransactorError::PairingStarvation {
                node: 0,
                pending_addresses: 0,
                pending_data: 1,
            }
        );
        assert_eq!(controller.state(), RunState::Draining);

        decoupler.push_address(AddressToken::write(0x0, Width::W32));
        assert!(matches!(
            controller
                .tick(&mut dispatcher, &decoupler, &Scoreboard::new(0), 0, 0, true, false)
                .await,
            Err(TransactorError::Halted { node: 0 })
        ));
    }

    #[tokio::test]
    async fn test_unclaimed_reads_are_starvation() {
        let sim = Simulation::spawn(MemoryBus::new());
        let mut dispatcher = Dispatcher::new(1, sim.port());
        let mut controller = TickController::new(1, "tick");

        let err = controller
            .tick(&mut dispatcher, &Decoupler::new(), &Scoreboard::new(1), 2, 0, true, false)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransactorError::PairingStarvation {
                node: 1,
                pending_addresses: 2,
                pending_data: 0,
            }
        );
    }
}
