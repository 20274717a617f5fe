use eyre::Result;
use vproc_transactor::{stimulus, MemoryBus, Simulation, Transactor, TransactorConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    println!("🚀 Virtual processor transactor starting...");

    let sim = Simulation::spawn(MemoryBus::new().with_latency(1, 1));
    let config = TransactorConfig::new(0, stimulus::TEST_NAME);
    let mut cosim = Transactor::new(config, sim.port());

    let outcome = stimulus::async_trans(&mut cosim).await?;
    println!(
        "✅ {} finished at cycle {}: {} transactions, {} mismatches, {} bus faults",
        outcome.test_name, outcome.cycle, outcome.transactions, outcome.mismatches, outcome.bus_faults
    );

    drop(cosim);
    let (_, summary) = sim.shutdown().await?;
    if !outcome.passed || !summary.all_passed() {
        return Err(eyre::eyre!("{} failed", outcome.test_name));
    }

    println!("🎉 All tests passed!");
    Ok(())
}
