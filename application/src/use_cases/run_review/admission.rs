//! Admission control: bounds concurrently running agent invocations.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Interrupted while waiting for a concurrency permit")]
    Interrupted,

    #[error("Admission controller is closed")]
    Closed,
}

/// Counting permit pool with capacity `parallelism`.
#[derive(Debug)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Authorizes active work; dropping it releases the permit.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionController {
    pub fn new(parallelism: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(parallelism)),
            capacity: parallelism,
        }
    }

    /// Wait for a permit, or give up when `cancel` fires first.
    ///
    /// A cancelled waiter never holds a permit.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Permit, AdmissionError> {
        if cancel.is_cancelled() {
            return Err(AdmissionError::Interrupted);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AdmissionError::Interrupted),
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit
                .map(|permit| Permit { _permit: permit })
                .map_err(|_| AdmissionError::Closed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Fail all current and future waiters.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_permits_are_released_on_drop() {
        let admission = AdmissionController::new(2);
        let token = CancellationToken::new();

        let first = admission.acquire(&token).await.unwrap();
        let second = admission.acquire(&token).await.unwrap();
        assert_eq!(admission.available(), 0);

        drop(first);
        assert_eq!(admission.available(), 1);
        drop(second);
        assert_eq!(admission.available(), admission.capacity());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_is_interrupted_by_cancellation() {
        let admission = Arc::new(AdmissionController::new(1));
        let token = CancellationToken::new();
        let _held = admission.acquire(&token).await.unwrap();

        let waiter = {
            let admission = Arc::clone(&admission);
            let token = token.clone();
            tokio::spawn(async move { admission.acquire(&token).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        assert_eq!(waiter.await.unwrap(), Err(AdmissionError::Interrupted));
        assert_eq!(admission.available(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_token_never_acquires() {
        let admission = AdmissionController::new(1);
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(admission.acquire(&token).await.map(|_| ()), Err(AdmissionError::Interrupted));
        assert_eq!(admission.available(), 1);
    }

    #[tokio::test]
    async fn test_closed_controller() {
        let admission = AdmissionController::new(1);
        admission.close();
        let result = admission.acquire(&CancellationToken::new()).await.map(|_| ());
        assert_eq!(result, Err(AdmissionError::Closed));
    }
}
