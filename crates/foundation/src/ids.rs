/// Monotonic string id source.
///
/// Counting starts at 1. One generator is owned per store so that ids stay
/// unique for the lifetime of a session without any global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGenerator {
    next: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `prefix` followed by the current counter value, then advances.
    pub fn unique_id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}{}", self.next);
        self.next += 1;
        id
    }

    /// Value the next call to [`IdGenerator::unique_id`] will use.
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Restarts counting at 1. Only meant for test isolation.
    pub fn reset(&mut self) {
        self.next = 1;
    }
}
