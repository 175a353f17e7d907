//! DNS enumeration.
//!
//! This crate collects what a nameserver will tell about a domain. It does
//! so in two ways:
//!
//! * It asks a nameserver for a selection of record types of the domain,
//!   one plain query per type. See [probe].
//! * If zone transfers are selected, it recursively transfers the zone
//!   from every nameserver it learns about, following delegations until no
//!   new pair of domain and nameserver turns up. See [crawl].
//!
//! Both are tied together by [enumerate], which produces a
//! [report::Report] that can be rendered as text or JSON.
//!
//! # Modules
//!
//! * [task] names a zone transfer target.
//! * [record] contains the record representation used throughout and the
//!   [record::RecordStore] collecting records by type.
//! * [net] does the talking to nameservers. Its [net::Lookup] and
//!   [net::TransferSource] traits are the seams at which the network can
//!   be replaced.
//! * [config] provides bounded configuration values and the
//!   [config::Options] of a run.
//! * [logging] sets up the `tracing` subscriber.

#![allow(renamed_and_removed_lints)]
#![allow(clippy::unknown_clippy_lints)]

pub mod config;
pub mod crawl;
pub mod enumerate;
pub mod logging;
pub mod net;
pub mod probe;
pub mod record;
pub mod report;
pub mod task;
