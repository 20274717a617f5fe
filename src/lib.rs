pub mod bus;
pub mod config;
pub mod decoupler;
pub mod dispatcher;
pub mod error;
pub mod pattern;
pub mod scoreboard;
pub mod sim;
pub mod stimulus;
pub mod tick;
pub mod transaction;
pub mod transactor;

pub use bus::{BusFault, MemoryBus, SimBus};
pub use config::TransactorConfig;
pub use decoupler::{AddressToken, DataToken, Decoupler};
pub use dispatcher::{Dispatcher, TxnHandle};
pub use error::{Result, TransactorError};
pub use pattern::{BurstDescriptor, BurstPattern};
pub use sim::{BusPort, NodeReport, SimSummary, Simulation};
pub use tick::{RunState, TestOutcome, TickController};
pub use transaction::{BusWord, Completion, Data, Direction, Mode, Transaction, TxnId, TxnStatus, Width};
pub use transactor::Transactor;
