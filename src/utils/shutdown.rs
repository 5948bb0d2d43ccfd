// src/utils/shutdown.rs

//! Cooperative shutdown signalling.
//!
//! A `watch` channel split into a trigger half and a listener half. Workers
//! poll `is_cancelled` between units of work and race `cancelled` against
//! long sleeps, so an interrupt lands within one retry interval.

use tokio::sync::watch;

/// Sending half, held by whoever decides the run should stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Receiving half, cloned into every task that stops cooperatively.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a connected trigger/listener pair.
pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

impl ShutdownHandle {
    /// Signal all listeners to stop.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// Whether a stop has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until a stop is requested.
    ///
    /// Pends forever if the handle is dropped without triggering; callers
    /// always race this against real work in a `select!`.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_reaches_all_listeners() {
        let (handle, shutdown) = channel();
        let other = shutdown.clone();
        assert!(!shutdown.is_cancelled());

        handle.trigger();

        assert!(shutdown.is_cancelled());
        assert!(other.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), shutdown.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_wakes_pending_waiter() {
        let (handle, shutdown) = channel();
        let waiter = tokio::spawn(async move { shutdown.cancelled().await });

        tokio::task::yield_now().await;
        handle.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
