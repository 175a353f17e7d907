//! Counting outstanding work and signalling completion.
//!
//! Every task that is handed to the crawler's queues is counted once when
//! it is offered and uncounted once when a worker is done with it. The
//! count dropping to zero means nothing is queued and nothing is in flight,
//! which ends the run. That moment is published exactly once through a
//! notification, so nobody has to poll the counter.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Notify;
use tracing::{error, trace};

//------------ Pending -------------------------------------------------------

/// The number of queued plus in-flight tasks of one crawl.
#[derive(Debug, Default)]
pub struct Pending {
    /// The current count.
    count: AtomicUsize,

    /// Set once the count has reached zero.
    complete: AtomicBool,

    /// Wakes everybody waiting for completion.
    notify: Notify,
}

impl Pending {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current count.
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Counts one more task.
    pub fn add(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Uncounts a finished task.
    ///
    /// Returns the remaining count. If this was the last task, completion
    /// is signalled.
    pub fn finish(&self) -> usize {
        let prev = self.count.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |count| count.checked_sub(1),
        );
        match prev {
            Ok(1) => {
                self.complete();
                0
            }
            Ok(prev) => prev - 1,
            Err(_) => {
                error!("pending task count would drop below zero");
                0
            }
        }
    }

    /// Returns a guard that uncounts one task when dropped.
    pub fn guard(&self) -> FinishGuard<'_> {
        FinishGuard { pending: self }
    }

    /// Returns whether completion has been signalled.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Signals completion, unless that has happened already.
    pub fn complete(&self) {
        if !self.complete.swap(true, Ordering::AcqRel) {
            trace!("no pending tasks left");
            self.notify.notify_waiters();
        }
    }

    /// Waits until completion has been signalled.
    pub async fn wait(&self) {
        loop {
            // A `Notified` receives `notify_waiters` as soon as it exists,
            // so creating it before the check cannot miss the wakeup.
            let notified = self.notify.notified();
            if self.is_complete() {
                return;
            }
            notified.await;
        }
    }
}

//------------ FinishGuard ---------------------------------------------------

/// Uncounts one task when dropped.
///
/// Holding a guard while processing a task makes sure the task is uncounted
/// exactly once, on every way out of the processing code.
#[derive(Debug)]
pub struct FinishGuard<'a> {
    pending: &'a Pending,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.pending.finish();
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn count_never_drops_below_zero() {
        let pending = Pending::new();
        pending.add();
        assert_eq!(pending.finish(), 0);
        assert!(pending.is_complete());
        assert_eq!(pending.finish(), 0);
        assert_eq!(pending.get(), 0);
    }

    #[test]
    fn guard_finishes_once() {
        let pending = Pending::new();
        pending.add();
        pending.add();
        {
            let _guard = pending.guard();
            assert_eq!(pending.get(), 2);
        }
        assert_eq!(pending.get(), 1);
        assert!(!pending.is_complete());
    }

    #[tokio::test]
    async fn waiters_are_woken_on_completion() {
        let pending = Arc::new(Pending::new());
        pending.add();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let pending = pending.clone();
                tokio::spawn(async move { pending.wait().await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        pending.finish();
        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn waiting_after_completion_returns() {
        let pending = Pending::new();
        pending.complete();
        pending.wait().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_balance_out() {
        let pending = Arc::new(Pending::new());
        pending.add();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pending = pending.clone();
                tokio::spawn(async move {
                    for _ in 0..1000 {
                        pending.add();
                        tokio::task::yield_now().await;
                        pending.finish();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(!pending.is_complete());
        assert_eq!(pending.finish(), 0);
        assert!(pending.is_complete());
    }
}
