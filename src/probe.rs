//! Probing a nameserver for a list of record types.
//!
//! The [`Prober`] sends one plain query per record type to a single
//! nameserver, using a fixed number of workers, and collects every answer
//! into one shared [`RecordStore`]. There is no recursion and no
//! deduplication.
//!
//! A failing query ends the worker that sent it. Its sibling workers carry
//! on with the remaining types, so a single unresponsive type leaves the
//! rest of the probe intact. Every such failure is logged and handed back
//! in the [`ProbeReport`].

use std::fmt;
use std::sync::Arc;

use domain::base::iana::Rtype;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, trace};

use crate::config::THREADS;
use crate::net::{Error, Lookup};
use crate::record::{is_meta_type, RecordStore};

/// The capacity of the queue feeding record types to the workers.
const TYPE_QUEUE_CAPACITY: usize = 100;

//------------ Prober --------------------------------------------------------

/// Queries one nameserver for a set of record types in parallel.
#[derive(Debug)]
pub struct Prober<L> {
    lookup: Arc<L>,
    threads: usize,
}

impl<L: Lookup> Prober<L> {
    /// Creates a new prober with `threads` workers.
    ///
    /// If the number of workers is too small or too large, it will be
    /// caped.
    pub fn new(lookup: Arc<L>, threads: usize) -> Self {
        Prober {
            lookup,
            threads: THREADS.limit(threads),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Queries `nameserver` for every type in `types` at name `domain`.
    ///
    /// Records are stored under the type that was queried. Meta types,
    /// which cannot be asked for in a plain query, are skipped.
    pub async fn run(
        &self,
        domain: &str,
        nameserver: &str,
        types: &[Rtype],
    ) -> ProbeReport {
        let store = Arc::new(RecordStore::new());
        let types: Vec<_> = types
            .iter()
            .copied()
            .filter(|rtype| {
                if is_meta_type(*rtype) {
                    trace!("not probing meta type {rtype}");
                    false
                } else {
                    true
                }
            })
            .collect();
        debug!(
            "probing {domain} at {nameserver} for {} types with {} workers",
            types.len(),
            self.threads
        );

        let (tx, rx) = mpsc::channel(TYPE_QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));
        let feeder = tokio::spawn(async move {
            for rtype in types {
                // Fails only once all workers are gone.
                if tx.send(rtype).await.is_err() {
                    break;
                }
            }
        });

        let domain: Arc<str> = domain.into();
        let nameserver: Arc<str> = nameserver.into();
        let workers: Vec<_> = (0..self.threads)
            .map(|_| {
                tokio::spawn(worker(
                    self.lookup.clone(),
                    domain.clone(),
                    nameserver.clone(),
                    rx.clone(),
                    store.clone(),
                ))
            })
            .collect();
        drop(rx);

        let mut errors = Vec::new();
        for handle in workers {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => errors.push(err),
                Err(err) => error!("probe worker failed: {err}"),
            }
        }
        if let Err(err) = feeder.await {
            error!("probe feeder failed: {err}");
        }
        ProbeReport { store, errors }
    }
}

/// Queries types from the queue until it is empty or a query fails.
async fn worker<L: Lookup>(
    lookup: Arc<L>,
    domain: Arc<str>,
    nameserver: Arc<str>,
    types: Arc<Mutex<mpsc::Receiver<Rtype>>>,
    store: Arc<RecordStore>,
) -> Result<(), ProbeError> {
    loop {
        let rtype = types.lock().await.recv().await;
        let Some(rtype) = rtype else { return Ok(()) };
        match lookup.query(&domain, rtype, &nameserver).await {
            Ok(records) => {
                trace!("{} {rtype} records for {domain}", records.len());
                for rr in records {
                    store.record(rtype, rr);
                }
            }
            Err(err) => {
                error!("{rtype} query for {domain} at {nameserver} failed: {err}");
                return Err(ProbeError { rtype, error: err });
            }
        }
    }
}

//------------ ProbeReport ---------------------------------------------------

/// The outcome of a probe.
#[derive(Debug)]
pub struct ProbeReport {
    store: Arc<RecordStore>,
    errors: Vec<ProbeError>,
}

impl ProbeReport {
    pub fn new(store: Arc<RecordStore>, errors: Vec<ProbeError>) -> Self {
        ProbeReport { store, errors }
    }

    /// Returns the records found.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Returns the failures that ended a worker.
    pub fn errors(&self) -> &[ProbeError] {
        &self.errors
    }
}

//------------ ProbeError ----------------------------------------------------

/// A query that failed during a probe.
#[derive(Clone, Debug, Serialize)]
pub struct ProbeError {
    #[serde(rename = "type", serialize_with = "crate::record::display")]
    rtype: Rtype,

    #[serde(serialize_with = "crate::record::display")]
    error: Error,
}

impl ProbeError {
    pub fn new(rtype: Rtype, error: Error) -> Self {
        ProbeError { rtype, error }
    }

    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    pub fn error(&self) -> &Error {
        &self.error
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} query failed: {}", self.rtype, self.error)
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::ResourceRecord;
    use futures_util::future::BoxFuture;
    use parking_lot::Mutex as SyncMutex;

    /// Answers with one record per type unless told to fail.
    #[derive(Default)]
    struct Canned {
        failing: Vec<Rtype>,
        queried: SyncMutex<Vec<Rtype>>,
    }

    impl Lookup for Canned {
        fn query<'a>(
            &'a self,
            name: &'a str,
            rtype: Rtype,
            _nameserver: &'a str,
        ) -> BoxFuture<'a, Result<Vec<ResourceRecord>, Error>> {
            Box::pin(async move {
                self.queried.lock().push(rtype);
                if self.failing.contains(&rtype) {
                    return Err(Error::ConnectTimeout);
                }
                Ok(vec![ResourceRecord::new(name, rtype, 60, "data")])
            })
        }
    }

    #[tokio::test]
    async fn answers_are_stored_by_type() {
        let lookup = Arc::new(Canned::default());
        let prober = Prober::new(lookup.clone(), 3);
        let report = prober
            .run("example.com.", "192.0.2.53", &[Rtype::A, Rtype::MX, Rtype::TXT])
            .await;
        assert!(report.errors().is_empty());
        assert_eq!(report.store().len(), 3);
        for rtype in [Rtype::A, Rtype::MX, Rtype::TXT] {
            assert_eq!(report.store().get(rtype).len(), 1);
        }
    }

    #[tokio::test]
    async fn meta_types_are_not_queried() {
        let lookup = Arc::new(Canned::default());
        let prober = Prober::new(lookup.clone(), 2);
        let report = prober
            .run("example.com.", "192.0.2.53", &[Rtype::AXFR, Rtype::ANY, Rtype::NS])
            .await;
        assert_eq!(*lookup.queried.lock(), [Rtype::NS]);
        assert_eq!(report.store().len(), 1);
    }

    #[tokio::test]
    async fn failures_end_only_their_worker() {
        let lookup = Arc::new(Canned {
            failing: vec![Rtype::AAAA],
            ..Default::default()
        });
        let prober = Prober::new(lookup.clone(), 2);
        let report = prober
            .run(
                "example.com.",
                "192.0.2.53",
                &[Rtype::AAAA, Rtype::A, Rtype::MX, Rtype::TXT],
            )
            .await;
        assert_eq!(report.errors().len(), 1);
        assert_eq!(report.errors()[0].rtype(), Rtype::AAAA);
        assert_eq!(report.store().len(), 3);
        assert!(report.store().get(Rtype::AAAA).is_empty());
    }

    #[tokio::test]
    async fn a_lone_worker_stops_at_the_first_failure() {
        let lookup = Arc::new(Canned {
            failing: vec![Rtype::A],
            ..Default::default()
        });
        let prober = Prober::new(lookup.clone(), 1);
        let report = prober
            .run("example.com.", "192.0.2.53", &[Rtype::A, Rtype::MX])
            .await;
        assert_eq!(report.errors().len(), 1);
        assert!(report.store().is_empty());
        assert_eq!(*lookup.queried.lock(), [Rtype::A]);
    }

    #[test]
    fn thread_count_is_capped() {
        let lookup = Arc::new(Canned::default());
        assert_eq!(Prober::new(lookup.clone(), 0).threads(), 1);
        assert_eq!(Prober::new(lookup, 10_000).threads(), 256);
    }
}
