//! Single-flight operations.
//!
//! A [`Flight`] is a handle on work that runs once on the runtime while any
//! number of callers wait for it. Every waiter receives a clone of the same
//! outcome. The work is spawned, so it finishes even if the caller that
//! started it is dropped.

use std::future::Future;

use tokio::sync::watch;

use crate::error::{AuthringError, Result};

/// Shared handle on a spawned operation.
#[derive(Debug, Clone)]
pub struct Flight<T: Clone = ()> {
    rx: watch::Receiver<Option<Result<T>>>,
}

impl<T> Flight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawns `work` and returns a handle that every caller can wait on.
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        tokio::spawn(async move {
            let outcome = work.await;
            tx.send_replace(Some(outcome));
        });
        Self { rx }
    }

    /// Waits for the outcome.
    ///
    /// Fails with [`AuthringError::FlightAbandoned`] if the task went away
    /// without publishing one.
    pub async fn wait(&self) -> Result<T> {
        let mut rx = self.rx.clone();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(outcome) = current {
                return outcome;
            }
            if rx.changed().await.is_err() {
                let last = rx.borrow().clone();
                return last.unwrap_or(Err(AuthringError::FlightAbandoned));
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_all_waiters_share_one_run() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let flight = Flight::spawn(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(42u32)
        });

        let other = flight.clone();
        let (a, b, c) = tokio::join!(flight.wait(), other.wait(), flight.wait());
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (42, 42, 42));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(flight.is_finished());

        // late waiters still see the outcome
        assert_eq!(flight.wait().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_errors_are_shared() {
        let flight: Flight = Flight::spawn(async { Err(AuthringError::Keyring("bad".into())) });
        let (a, b) = tokio::join!(flight.wait(), flight.wait());
        assert_eq!(a, Err(AuthringError::Keyring("bad".into())));
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_panicking_work_is_abandoned() {
        let flight: Flight = Flight::spawn(async {
            if true {
                panic!("boom");
            }
            Ok(())
        });
        assert_eq!(flight.wait().await, Err(AuthringError::FlightAbandoned));
    }
}
