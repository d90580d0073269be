//! Deferred delivery
//!
//! Connection establishment and `send` delivery run "later": after the
//! caller's synchronous code has had a chance to attach listeners. Jobs are
//! queued to a single worker task per registry and run strictly in the order
//! they were scheduled, each no earlier than `delay` after scheduling.

use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::error::{SocketError, SocketResult};
use crate::sync::lock;

struct Job {
    due: Instant,
    run: Box<dyn FnOnce() + Send>,
}

/// FIFO queue of delayed jobs backed by a tokio task
pub(crate) struct Scheduler {
    delay: Duration,
    queue: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl Scheduler {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            queue: Mutex::new(None),
        }
    }

    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `run` to execute after the delay
    ///
    /// The worker task is started lazily on the current tokio runtime and
    /// restarted if its runtime has gone away (e.g. between tests).
    pub(crate) fn defer<F>(&self, run: F) -> SocketResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut job = Job {
            due: Instant::now() + self.delay,
            run: Box::new(run),
        };

        let mut queue = lock(&self.queue);
        if let Some(tx) = queue.as_ref() {
            match tx.send(job) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(returned)) => job = returned,
            }
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SocketError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(run_queue(rx));
        tx.send(job).map_err(|_| SocketError::NoRuntime)?;
        *queue = Some(tx);

        tracing::trace!(delay_ms = self.delay.as_millis() as u64, "Started deferred delivery worker");
        Ok(())
    }

    /// Wait until every job scheduled before this call has run
    pub(crate) async fn settle(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .defer(move || {
                let _ = tx.send(());
            })
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

async fn run_queue(mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        tokio::time::sleep_until(job.due).await;
        (job.run)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_defer_without_runtime() {
        let scheduler = Scheduler::new(Duration::from_millis(1));
        assert_eq!(scheduler.defer(|| {}), Err(SocketError::NoRuntime));
    }

    #[tokio::test]
    async fn test_jobs_run_later_in_order() {
        let scheduler = Scheduler::new(Duration::from_millis(2));
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let o = Arc::clone(&order);
            scheduler.defer(move || o.lock().unwrap().push(i)).unwrap();
        }

        // Nothing runs during the synchronous turn
        assert!(order.lock().unwrap().is_empty());

        scheduler.settle().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_job_may_schedule_more_work() {
        let scheduler = Arc::new(Scheduler::new(Duration::from_millis(1)));
        let hits = Arc::new(Mutex::new(0));

        let s = Arc::clone(&scheduler);
        let h = Arc::clone(&hits);
        scheduler
            .defer(move || {
                let h2 = Arc::clone(&h);
                *h.lock().unwrap() += 1;
                s.defer(move || *h2.lock().unwrap() += 1).unwrap();
            })
            .unwrap();

        scheduler.settle().await;
        scheduler.settle().await;
        assert_eq!(*hits.lock().unwrap(), 2);
    }
}
