use std::collections::HashMap;

/// Run-scoped monotonic id source, one independent counter per target table.
///
/// Counters live in memory only and restart at zero every run, so the first
/// issued id is always 1 (0 is the sentinel "no id" in the target schema).
/// A freshly initialized target store is therefore a correctness
/// precondition: ids issued here are not checked against pre-existing rows.
#[derive(Debug, Default)]
pub struct IdAllocator {
    counters: HashMap<String, i64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id for `table`, strictly increasing per table name.
    pub fn next(&mut self, table: &str) -> i64 {
        let counter = self.counters.entry(table.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}
