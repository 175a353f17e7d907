//! Finding new targets in a transferred zone.
//!
//! A successful transfer hints at more targets in two ways. Every
//! nameserver listed in the zone may serve the zone, too, and every name in
//! the zone may be a zone of its own served by the same nameserver.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use domain::base::iana::Rtype;
use serde::Serialize;

use crate::record::{RecordStore, DOMAIN_TYPES};
use crate::task::Task;

//------------ OwnerScope ----------------------------------------------------

/// Which owner names are tried as zones on the same nameserver.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerScope {
    /// The owner of every record in the zone.
    #[default]
    All,

    /// Only the owners of NS, SOA, and CNAME records.
    Delegations,
}

impl FromStr for OwnerScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(OwnerScope::All),
            "delegations" => Ok(OwnerScope::Delegations),
            _ => Err(format!("unknown owner scope '{s}'")),
        }
    }
}

impl fmt::Display for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            OwnerScope::All => "all",
            OwnerScope::Delegations => "delegations",
        })
    }
}

//------------ mine ----------------------------------------------------------

/// Returns the candidate tasks found in the zone transferred for `task`.
///
/// * For every NS target in the zone, the zone itself is tried against
///   that nameserver.
/// * For NS records below the zone apex, the delegated name is also tried
///   against the nameservers it is delegated to.
/// * Owner names selected by `scope` are tried against the nameserver just
///   queried.
///
/// The result contains no duplicates but may contain `task` itself.
pub fn mine(task: &Task, store: &RecordStore, scope: OwnerScope) -> BTreeSet<Task> {
    let mut res = BTreeSet::new();

    for ns in store.get(Rtype::NS) {
        let Some(target) = ns.target() else { continue };
        res.insert(Task::new(task.domain(), target));
        if ns.owner() != task.domain() {
            res.insert(Task::new(ns.owner(), target));
        }
    }

    let mut owners = HashSet::new();
    for (rtype, records) in store.non_empty_types() {
        if scope == OwnerScope::Delegations && !DOMAIN_TYPES.contains(&rtype) {
            continue;
        }
        for rr in records {
            if owners.insert(rr.owner().to_string()) {
                res.insert(Task::new(rr.owner(), task.nameserver()));
            }
        }
    }
    res
}

//============ Tests =========================================================
