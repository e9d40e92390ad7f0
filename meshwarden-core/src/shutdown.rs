use std::time::Duration;

use tokio::sync::watch;

/// Process-wide shutdown signal. Every cancellable wait in the system
/// (scheduler tick, auto-heal sleep, worker-pool batch stagger, config
/// watcher poll) holds a [`watch::Receiver`] cloned from one
/// [`ShutdownHandle`], so a single `trigger()` call wakes all of them within
/// one poll interval.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Sleeps for `duration` but returns early if the shutdown signal fires,
/// returning `true` if the wait was interrupted by shutdown.
pub async fn interruptible_sleep(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.changed() => *shutdown.borrow(),
    }
}
