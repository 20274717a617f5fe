/// Per-node settings, fixed for the lifetime of a transactor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactorConfig {
    pub node: u32,
    pub test_name: String,
    /// Cycles run after draining when the test ends through `Transactor::finish`.
    pub finish_cycles: u64,
}

impl Default for TransactorConfig {
    fn default() -> Self {
        Self {
            node: 0,
            test_name: String::from("cosim"),
            finish_cycles: 10,
        }
    }
}

impl TransactorConfig {
    pub fn new(node: u32, test_name: impl Into<String>) -> Self {
        Self {
            node,
            test_name: test_name.into(),
            ..Self::default()
        }
    }

    pub fn finish_cycles(mut self, cycles: u64) -> Self {
        self.finish_cycles = cycles;
        self
    }
}
