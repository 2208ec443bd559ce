//! Least-loaded target selection.
//!
//! A [`LoadLedger`] is a per-sweep accumulator: it is rebuilt from
//! authoritative store reads at the start of every sweep and discarded
//! afterwards, so it can never drift from committed state across runs.

use std::collections::{BTreeSet, HashMap};

/// In-memory load ranking over senior employees.
///
/// Ordering is `(load, id)`: minimum load wins, ties break on the lowest
/// id so batch assignment is deterministic and reproducible.
#[derive(Debug, Default)]
pub struct LoadLedger {
    ranked: BTreeSet<(i64, i64)>,
    loads: HashMap<i64, i64>,
}

impl LoadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a senior employee with their current load.
    pub fn register(&mut self, senior_id: i64, load: i64) {
        if let Some(previous) = self.loads.insert(senior_id, load) {
            self.ranked.remove(&(previous, senior_id));
        }
        self.ranked.insert((load, senior_id));
    }

    /// The senior employee with the minimum current load, if any.
    pub fn least_loaded(&self) -> Option<i64> {
        self.ranked.iter().next().map(|&(_, id)| id)
    }

    /// Bump a senior's load by one. Called immediately after each
    /// assignment so later picks in the same batch see the updated load
    /// instead of piling onto the initially least-loaded senior.
    pub fn record_assignment(&mut self, senior_id: i64) {
        if let Some(load) = self.loads.get_mut(&senior_id) {
            self.ranked.remove(&(*load, senior_id));
            *load += 1;
            self.ranked.insert((*load, senior_id));
        }
    }

    pub fn load_of(&self, senior_id: i64) -> Option<i64> {
        self.loads.get(&senior_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }
}
