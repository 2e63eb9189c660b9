//! Per-status order counts maintained from row-level change events.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::domain::OrderStatus;
use crate::realtime::{ChangeKind, RowChange};

/// What applying one event did to the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOutcome {
    Applied,
    Ignored,
    /// The event cannot be applied incrementally; refetch everything.
    NeedsResync,
}

/// Order counts by status. Every status is always present and counts never
/// go below zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCounters {
    counts: BTreeMap<OrderStatus, u64>,
}

impl Default for StatusCounters {
    fn default() -> Self {
        Self {
            counts: OrderStatus::ALL.iter().map(|s| (*s, 0)).collect(),
        }
    }
}

fn statut_of(field: Option<&Value>) -> Option<OrderStatus> {
    field.and_then(Value::as_str).and_then(OrderStatus::parse)
}

impl StatusCounters {
    pub fn get(&self, statut: OrderStatus) -> u64 {
        self.counts.get(&statut).copied().unwrap_or(0)
    }

    pub fn set(&mut self, statut: OrderStatus, count: u64) {
        self.counts.insert(statut, count);
    }

    pub fn increment(&mut self, statut: OrderStatus) {
        *self.counts.entry(statut).or_insert(0) += 1;
    }

    /// Floor-clamped at zero.
    pub fn decrement(&mut self, statut: OrderStatus) {
        let count = self.counts.entry(statut).or_insert(0);
        *count = count.saturating_sub(1);
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OrderStatus, u64)> + '_ {
        self.counts.iter().map(|(s, c)| (*s, *c))
    }

    /// Applies one `commandes` change.
    ///
    /// UPDATE and DELETE need the old status. Under the default replica
    /// identity the old row carries only the id, so such events ask for a
    /// resync instead of guessing. A status string outside the known set is
    /// ignored.
    pub fn apply(&mut self, change: &RowChange) -> CounterOutcome {
        match change.kind {
            ChangeKind::Insert => match statut_of(change.new_field("statut")) {
                Some(statut) => {
                    self.increment(statut);
                    CounterOutcome::Applied
                }
                None => CounterOutcome::Ignored,
            },
            ChangeKind::Update => {
                match (statut_of(change.old_field("statut")), statut_of(change.new_field("statut"))) {
                    (Some(old), Some(new)) if old == new => CounterOutcome::Ignored,
                    (Some(old), Some(new)) => {
                        self.decrement(old);
                        self.increment(new);
                        CounterOutcome::Applied
                    }
                    _ => {
                        debug!("Update without both statuses");
                        CounterOutcome::NeedsResync
                    }
                }
            }
            ChangeKind::Delete => match change.old_field("statut") {
                None => {
                    debug!("Delete without old status");
                    CounterOutcome::NeedsResync
                }
                Some(field) => match statut_of(Some(field)) {
                    Some(statut) => {
                        self.decrement(statut);
                        CounterOutcome::Applied
                    }
                    None => CounterOutcome::Ignored,
                },
            },
        }
    }
}
