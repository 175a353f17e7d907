//! The crawler's queues.
//!
//! New tasks never go into the task queue directly. They are offered to the
//! injection queue, which is unbounded so that a worker handing off newly
//! found targets can neither block nor lose them. A single pump moves tasks
//! from the injection queue into the bounded task queue the workers consume,
//! waiting for room when the task queue is full.
//!
//! Once the pending count reaches zero the pump stops. Dropping its end of
//! the task queue closes that queue, which in turn lets idle workers leave
//! their receive loops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::pending::Pending;
use crate::task::Task;

//------------ Injector ------------------------------------------------------

/// The producer side of the injection queue.
#[derive(Debug)]
pub struct Injector {
    /// The injection queue.
    tx: mpsc::UnboundedSender<Task>,

    /// The number of tasks successfully offered.
    offered: AtomicUsize,

    /// The number of tasks that could not be offered.
    dropped: AtomicUsize,
}

impl Injector {
    /// Creates a new injection queue.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Task>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let injector = Injector {
            tx,
            offered: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        };
        (injector, rx)
    }

    /// Offers a task to the crawl.
    ///
    /// The task is counted as pending before it becomes visible to the
    /// pump. This never blocks. It only fails if the crawl has already
    /// finished, in which case the task is logged and dropped.
    pub fn offer(&self, task: Task, pending: &Pending) -> bool {
        pending.add();
        match self.tx.send(task) {
            Ok(()) => {
                self.offered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::SendError(task)) => {
                pending.finish();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("dropping {task}: crawl already finished");
                false
            }
        }
    }

    pub fn offered(&self) -> usize {
        self.offered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

//------------ pump ----------------------------------------------------------

/// Forwards tasks from the injection queue into the task queue.
///
/// Returns once the crawl is complete, dropping `tasks` and thereby closing
/// the task queue. Returns the number of tasks forwarded.
pub async fn pump(
    mut injected: mpsc::UnboundedReceiver<Task>,
    tasks: mpsc::Sender<Task>,
    pending: Arc<Pending>,
) -> usize {
    let mut forwarded = 0;
    loop {
        tokio::select! {
            biased;

            _ = pending.wait() => break,
            task = injected.recv() => {
                let Some(task) = task else { break };
                if let Err(mpsc::error::SendError(task)) = tasks.send(task).await {
                    // All workers are gone. Nobody will ever pick this up.
                    warn!("dropping {task}: task queue closed");
                    pending.finish();
                    continue;
                }
                forwarded += 1;
            }
        }
    }
    injected.close();
    debug!("pump finished after forwarding {forwarded} tasks");
    forwarded
}

//============ Tests =========================================================
