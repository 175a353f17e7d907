//! Bookkeeping of visited targets, their records, and failures.

use std::collections::btree_map::{BTreeMap, Entry};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::record::RecordStore;
use crate::task::Task;

//------------ TransferTable -------------------------------------------------

/// The targets dispatched during one crawl and the records found for each.
///
/// A target counts as visited once it has an entry. Checking for and
/// creating the entry happen under one lock, so no two workers can both
/// claim the same target.
#[derive(Debug, Default)]
pub struct TransferTable {
    /// The record store of each dispatched task, by composite key.
    transfers: Mutex<BTreeMap<String, (Task, Arc<RecordStore>)>>,
}

impl TransferTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the target of `task`.
    ///
    /// Returns the fresh record store for the target, or `None` if the
    /// target has been claimed before.
    pub fn claim(&self, task: &Task) -> Option<Arc<RecordStore>> {
        match self.transfers.lock().entry(task.key()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                let store = Arc::new(RecordStore::new());
                entry.insert((task.clone(), store.clone()));
                Some(store)
            }
        }
    }

    /// Returns the number of claimed targets.
    pub fn len(&self) -> usize {
        self.transfers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all entries ordered by composite key.
    pub fn entries(&self) -> Vec<(String, Task, Arc<RecordStore>)> {
        self.transfers
            .lock()
            .iter()
            .map(|(key, (task, store))| {
                (key.clone(), task.clone(), store.clone())
            })
            .collect()
    }
}

//------------ FailureLog ----------------------------------------------------

/// The failures of one crawl in the order they happened.
#[derive(Debug, Default)]
pub struct FailureLog {
    entries: Mutex<Vec<Failure>>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, failure: Failure) {
        self.entries.lock().push(failure)
    }

    /// Returns a copy of all failures.
    pub fn to_vec(&self) -> Vec<Failure> {
        self.entries.lock().clone()
    }
}

//------------ Failure -------------------------------------------------------

/// A single failure while transferring a zone.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Failure {
    /// The target the failure happened for.
    #[serde(flatten)]
    task: Task,

    /// Where in the transfer things went wrong.
    kind: FailureKind,

    /// What went wrong.
    error: String,
}

impl Failure {
    pub fn new(task: Task, kind: FailureKind, error: impl fmt::Display) -> Self {
        Failure {
            task,
            kind,
            error: error.to_string(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn error(&self) -> &str {
        &self.error
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} | {}", self.task, self.error)
    }
}

//------------ FailureKind ---------------------------------------------------

/// Where in a transfer a failure happened.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The transfer could not be started.
    Transfer,

    /// A message within a started transfer could not be processed.
    Stream,
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn targets_are_claimed_once() {
        let table = TransferTable::new();
        let task = Task::new("example.com", "ns1.example.com");
        assert!(table.is_empty());
        assert!(table.claim(&task).is_some());
        for _ in 0..5 {
            assert!(table.claim(&Task::new("EXAMPLE.com.", "ns1.example.com")).is_none());
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn entries_are_ordered_by_key() {
        let table = TransferTable::new();
        table.claim(&Task::new("b.", "ns."));
        table.claim(&Task::new("a.", "ns."));
        let keys: Vec<_> =
            table.entries().into_iter().map(|(key, _, _)| key).collect();
        assert_eq!(keys, ["a.@ns.", "b.@ns."]);
    }

    #[test]
    fn failures_display_target_and_error() {
        let failure = Failure::new(
            Task::new("zonetransfer.me", "nsztm2.digi.ninja"),
            FailureKind::Transfer,
            "server responded with REFUSED",
        );
        assert_eq!(
            failure.to_string(),
            "zonetransfer.me. @ nsztm2.digi.ninja. | server responded with REFUSED"
        );
    }
}
