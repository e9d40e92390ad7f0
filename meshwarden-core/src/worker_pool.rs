use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

const MAX_BATCH_SIZE: usize = 10;
const MAX_STAGGER_DELAY: Duration = Duration::from_secs(2);
const JANITOR_MAX_WAIT: Duration = Duration::from_secs(15);
const JANITOR_MAX_POLL: Duration = Duration::from_secs(2);

struct PoolState {
    semaphore: Arc<Semaphore>,
    max_workers: usize,
    active: AtomicUsize,
}

impl PoolState {
    fn new(max_workers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            active: AtomicUsize::new(0),
        }
    }
}

/// Bounded-concurrency executor for probe tasks. Runtime-reconfigurable: the
/// live pool handle is published under a lock, but callers only hold that
/// lock long enough to clone the `Arc` — submission itself, and any
/// `.await`, always happens outside it.
#[derive(Clone)]
pub struct WorkerPool {
    current: Arc<Mutex<Arc<PoolState>>>,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            current: Arc::new(Mutex::new(Arc::new(PoolState::new(max_workers.max(1))))),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.current.lock().max_workers
    }

    pub fn active_workers(&self) -> usize {
        self.current.lock().active.load(Ordering::Relaxed)
    }

    /// Swaps in a freshly sized pool and detaches the old one's drain: the
    /// janitor polls remaining permits with capped exponential backoff for
    /// up to 15 seconds and just logs if workers are still running after
    /// that, rather than blocking the caller.
    pub fn reconfigure(&self, max_workers: usize) {
        let new_state = Arc::new(PoolState::new(max_workers.max(1)));
        let old_state = {
            let mut guard = self.current.lock();
            std::mem::replace(&mut *guard, new_state)
        };
        tokio::spawn(drain_old_pool(old_state));
    }

    /// Submits `ips` in batches of at most 10, waiting between batches for
    /// `stagger_sec * batch_len` capped at 2s. Aborts mid-batch if the
    /// shutdown signal fires. `task` is invoked once per IP after acquiring
    /// a pool permit.
    pub async fn submit_batch<F, Fut>(
        &self,
        ips: Vec<String>,
        stagger_sec: f64,
        mut shutdown: watch::Receiver<bool>,
        task: F,
    ) where
        F: Fn(String) -> Fut + Send + Sync + 'static + Clone,
        Fut: Future<Output = ()> + Send + 'static,
    {
        for chunk in ips.chunks(MAX_BATCH_SIZE) {
            if *shutdown.borrow() {
                debug!("submit_batch aborting before chunk: shutdown signaled");
                return;
            }
            let pool = self.current.lock().clone();
            let mut handles = Vec::with_capacity(chunk.len());
            for ip in chunk {
                let ip = ip.clone();
                let pool = pool.clone();
                let task = task.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = pool.semaphore.acquire().await;
                    pool.active.fetch_add(1, Ordering::Relaxed);
                    task(ip).await;
                    pool.active.fetch_sub(1, Ordering::Relaxed);
                }));
            }
            for handle in handles {
                let _ = handle.await;
            }

            let delay = Duration::from_secs_f64(stagger_sec * chunk.len() as f64).min(MAX_STAGGER_DELAY);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

async fn drain_old_pool(state: Arc<PoolState>) {
    let start = tokio::time::Instant::now();
    let mut poll_delay = Duration::from_millis(100);
    loop {
        if state.semaphore.available_permits() >= state.max_workers {
            return;
        }
        if start.elapsed() >= JANITOR_MAX_WAIT {
            warn!(
                remaining = state.max_workers - state.semaphore.available_permits(),
                "old worker pool still draining after 15s, abandoning wait"
            );
            return;
        }
        tokio::time::sleep(poll_delay).await;
        poll_delay = (poll_delay * 2).min(JANITOR_MAX_POLL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn submit_batch_invokes_task_for_every_ip() {
        let pool = WorkerPool::new(4);
        let (_tx, rx) = watch::channel(false);
        let count = Arc::new(AtomicU32::new(0));
        let ips: Vec<String> = (0..5).map(|i| format!("10.0.0.{i}")).collect();
        let counter = count.clone();
        pool.submit_batch(ips, 0.01, rx, move |_ip| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn submit_batch_aborts_when_shutdown_already_set() {
        let pool = WorkerPool::new(4);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        pool.submit_batch(vec!["10.0.0.1".to_string()], 0.01, rx, move |_ip| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reconfigure_changes_reported_capacity() {
        let pool = WorkerPool::new(4);
        pool.reconfigure(8);
        assert_eq!(pool.max_workers(), 8);
    }
}
