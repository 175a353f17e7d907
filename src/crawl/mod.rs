//! Recursive zone transfer crawling.
//!
//! The [`Crawler`] starts from a set of seed [`Task`]s and tries a zone
//! transfer for each. Every successful transfer is mined for new targets,
//! which are fed back into the crawl. A target, identified by its
//! [composite key], is only ever transferred once, so cyclic delegations
//! cannot keep the crawl going forever.
//!
//! # Architecture
//!
//! A fixed pool of workers consumes a bounded task queue. Workers hand new
//! targets to an unbounded injection queue which a pump forwards into the
//! task queue; see the [`queue`] module. The number of queued and
//! in-flight tasks is tracked by a [`Pending`] counter. When it reaches
//! zero the pump stops, the task queue closes, and the workers exit.
//!
//! All state lives in one [`Crawler::run`] invocation. The result is a
//! [`CrawlReport`] with the records of every target that produced any plus
//! the failures encountered along the way. No single failure stops a crawl.
//!
//! [composite key]: Task::key

pub use self::mine::OwnerScope;
pub use self::table::{Failure, FailureKind};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use domain::base::iana::Rtype;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, trace, warn};

use self::pending::Pending;
use self::queue::Injector;
use self::table::{FailureLog, TransferTable};
use crate::config::DefMinMax;
use crate::net::TransferSource;
use crate::record::{RecordSet, ResourceRecord};
use crate::task::Task;

pub mod mine;
pub mod pending;
pub mod queue;
pub mod table;

//------------ Configuration Constants ----------------------------------------

/// Configuration limits for the number of workers.
const WORKERS: DefMinMax<usize> = DefMinMax::new(5, 1, 256);

/// Configuration limits for the capacity of the task queue.
const QUEUE_CAPACITY: DefMinMax<usize> = DefMinMax::new(200, 1, 100_000);

//------------ Config ---------------------------------------------------------

/// Configuration for a crawl.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of workers transferring zones in parallel.
    workers: usize,

    /// Capacity of the task queue.
    queue_capacity: usize,

    /// Which owner names are mined for new targets.
    owner_scope: OwnerScope,
}

impl Config {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Sets the number of workers.
    ///
    /// If this value is too small or too large, it will be caped.
    pub fn set_workers(&mut self, value: usize) {
        self.workers = WORKERS.limit(value)
    }

    /// Returns the capacity of the task queue.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Sets the capacity of the task queue.
    ///
    /// If this value is too small or too large, it will be caped.
    pub fn set_queue_capacity(&mut self, value: usize) {
        self.queue_capacity = QUEUE_CAPACITY.limit(value)
    }

    /// Returns which owner names are mined for new targets.
    pub fn owner_scope(&self) -> OwnerScope {
        self.owner_scope
    }

    /// Sets which owner names are mined for new targets.
    pub fn set_owner_scope(&mut self, value: OwnerScope) {
        self.owner_scope = value
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: WORKERS.default(),
            queue_capacity: QUEUE_CAPACITY.default(),
            owner_scope: OwnerScope::default(),
        }
    }
}

//------------ Crawler -------------------------------------------------------

/// Walks nameservers via zone transfers.
#[derive(Debug)]
pub struct Crawler<S> {
    /// Where zone transfers come from.
    source: Arc<S>,

    config: Config,
}

impl<S: TransferSource> Crawler<S> {
    /// Creates a crawler transferring zones from `source`.
    pub fn new(source: Arc<S>, config: Config) -> Self {
        Crawler { source, config }
    }

    /// Returns the configuration of the crawler.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Crawls starting from `seeds` until no new targets remain.
    pub async fn run(
        &self,
        seeds: impl IntoIterator<Item = Task>,
    ) -> CrawlReport {
        let (injector, injected) = Injector::new();
        let state = Arc::new(State::new(injector, self.config.owner_scope));
        for seed in seeds {
            state.offer(seed);
        }
        if state.pending.get() == 0 {
            debug!("nothing to crawl");
            return state.report();
        }

        let (tasks_tx, tasks_rx) = mpsc::channel(self.config.queue_capacity);
        let tasks_rx = Arc::new(Mutex::new(tasks_rx));
        let pump = tokio::spawn(queue::pump(
            injected,
            tasks_tx,
            state.pending.clone(),
        ));
        let workers: Vec<_> = (0..self.config.workers)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    state.clone(),
                    self.source.clone(),
                    tasks_rx.clone(),
                ))
            })
            .collect();

        for handle in workers {
            if let Err(err) = handle.await {
                error!("crawler worker failed: {err}");
            }
        }
        if let Err(err) = pump.await {
            error!("crawler pump failed: {err}");
        }

        let report = state.report();
        info!(
            "crawl finished: {} targets, {} with records, {} failures",
            report.stats.dispatched,
            report.transfers.len(),
            report.failures.len()
        );
        report
    }
}

/// Processes tasks until the task queue is closed.
async fn worker<S: TransferSource>(
    id: usize,
    state: Arc<State>,
    source: Arc<S>,
    tasks: Arc<Mutex<mpsc::Receiver<Task>>>,
) {
    loop {
        let task = tasks.lock().await.recv().await;
        let Some(task) = task else { break };
        state.process(source.as_ref(), task).await;
    }
    trace!("worker {id} finished");
}

//------------ State ---------------------------------------------------------

/// Everything the workers of one crawl share.
#[derive(Debug)]
struct State {
    /// The targets dispatched so far and their records.
    table: TransferTable,

    /// Failures along the way.
    failures: FailureLog,

    /// Queued plus in-flight tasks.
    pending: Arc<Pending>,

    /// Where new tasks go.
    injector: Injector,

    /// Which owner names are mined.
    owner_scope: OwnerScope,

    /// Counters for the report.
    stats: Stats,
}

impl State {
    fn new(injector: Injector, owner_scope: OwnerScope) -> Self {
        State {
            table: TransferTable::new(),
            failures: FailureLog::new(),
            pending: Arc::new(Pending::new()),
            injector,
            owner_scope,
            stats: Stats::default(),
        }
    }

    /// Offers a new task to the crawl.
    fn offer(&self, task: Task) -> bool {
        self.injector.offer(task, &self.pending)
    }

    /// Transfers the zone of one task and mines it for more tasks.
    ///
    /// The task is uncounted when this returns, after any tasks it produced
    /// have been counted.
    async fn process<S: TransferSource + ?Sized>(&self, source: &S, task: Task) {
        let _finish = self.pending.guard();

        let Some(store) = self.table.claim(&task) else {
            trace!("skipping duplicate {task}");
            self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            return;
        };
        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        debug!("transferring {task}");

        let mut stream = match source.transfer(&task).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!("zone transfer of {task} failed: {err}");
                self.failures.push(Failure::new(
                    task,
                    FailureKind::Transfer,
                    err,
                ));
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        while let Some(item) = stream.next().await {
            match item {
                Ok(records) => store.extend(records),
                Err(err) => {
                    warn!("error during zone transfer of {task}: {err}");
                    self.failures.push(Failure::new(
                        task.clone(),
                        FailureKind::Stream,
                        err,
                    ));
                }
            }
        }
        self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
        debug!("transferred {} records for {task}", store.len());

        for candidate in mine::mine(&task, &store, self.owner_scope) {
            self.offer(candidate);
        }
    }

    /// Creates the report of the crawl.
    fn report(&self) -> CrawlReport {
        let transfers = self
            .table
            .entries()
            .into_iter()
            .filter(|(_, _, store)| !store.is_empty())
            .map(|(key, task, store)| TransferEntry {
                key,
                task,
                records: store.record_sets(),
            })
            .collect();
        CrawlReport {
            transfers,
            failures: self.failures.to_vec(),
            stats: CrawlStats {
                visited: self.table.len(),
                dispatched: self.stats.dispatched.load(Ordering::Relaxed),
                duplicates: self.stats.duplicates.load(Ordering::Relaxed),
                succeeded: self.stats.succeeded.load(Ordering::Relaxed),
                failed: self.stats.failed.load(Ordering::Relaxed),
                offered: self.injector.offered(),
                dropped: self.injector.dropped(),
            },
        }
    }
}

//------------ Stats ---------------------------------------------------------

#[derive(Debug, Default)]
struct Stats {
    dispatched: AtomicUsize,
    duplicates: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

//------------ CrawlReport ---------------------------------------------------

/// The outcome of a crawl.
#[derive(Clone, Debug, Serialize)]
pub struct CrawlReport {
    /// Every target that produced records, ordered by composite key.
    pub transfers: Vec<TransferEntry>,

    /// Every failure in the order it happened.
    pub failures: Vec<Failure>,

    /// Counters.
    pub stats: CrawlStats,
}

impl CrawlReport {
    /// Returns the entry for the target of `task`, if it produced records.
    pub fn get(&self, task: &Task) -> Option<&TransferEntry> {
        let key = task.key();
        self.transfers.iter().find(|entry| entry.key == key)
    }
}

/// The records transferred from one target.
#[derive(Clone, Debug, Serialize)]
pub struct TransferEntry {
    /// The composite key of the target.
    pub key: String,

    #[serde(skip)]
    pub task: Task,

    /// The records in canonical type order.
    pub records: Vec<RecordSet>,
}

impl TransferEntry {
    /// Returns the number of records of all types.
    pub fn len(&self) -> usize {
        self.records.iter().map(|set| set.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the records of type `rtype`.
    pub fn get(&self, rtype: Rtype) -> &[ResourceRecord] {
        self.records
            .iter()
            .find(|set| set.rtype == rtype)
            .map(|set| set.records.as_slice())
            .unwrap_or_default()
    }
}

/// Counters describing a crawl.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CrawlStats {
    /// Targets claimed, with or without records.
    pub visited: usize,

    /// Tasks that led to a transfer attempt.
    pub dispatched: usize,

    /// Tasks skipped because their target had been claimed before.
    pub duplicates: usize,

    /// Transfers that could be started.
    pub succeeded: usize,

    /// Transfers that could not be started.
    pub failed: usize,

    /// Tasks offered to the crawl, seeds included.
    pub offered: usize,

    /// Tasks that could not be offered.
    pub dropped: usize,
}

//============ Tests =========================================================
