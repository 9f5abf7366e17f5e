// ABOUTME: FanOutLimiter - bounds how many child runs are Running at once.
// ABOUTME: Admission waits are cancellable and end when the limiter closes.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Why an admission wait ended without a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("admission cancelled")]
    Cancelled,

    #[error("limiter closed")]
    Closed,
}

/// A counting limiter over running children.
///
/// A slot is held for as long as the returned permit lives.
#[derive(Debug, Clone)]
pub struct FanOutLimiter {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl FanOutLimiter {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a slot, or until `cancel` completes.
    pub async fn acquire_with_cancel<F>(
        &self,
        cancel: F,
    ) -> Result<OwnedSemaphorePermit, AdmissionError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        tokio::select! {
            biased;
            () = &mut cancel => Err(AdmissionError::Cancelled),
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.map_err(|_| AdmissionError::Closed)
            }
        }
    }

    /// Wait for a slot with no cancellation.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AdmissionError> {
        self.acquire_with_cancel(std::future::pending::<()>()).await
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.limit.saturating_sub(self.available())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fail every current and future admission wait.
    pub fn close(&self) {
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[tokio::test]
    async fn test_limits_concurrent_slots() {
        let limiter = FanOutLimiter::new(2);
        let a = limiter.acquire().await.unwrap();
        let _b = limiter.acquire().await.unwrap();
        assert_eq!(limiter.in_use(), 2);

        let mut third = task::spawn(limiter.acquire());
        assert_pending!(third.poll());

        drop(a);
        assert!(third.is_woken());
        assert!(assert_ready!(third.poll()).is_ok());
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let limiter = FanOutLimiter::new(1);
        let _held = limiter.acquire().await.unwrap();

        let result = limiter
            .acquire_with_cancel(tokio::time::sleep(Duration::from_millis(10)))
            .await;
        assert_eq!(result.unwrap_err(), AdmissionError::Cancelled);
        assert_eq!(limiter.in_use(), 1);
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let limiter = FanOutLimiter::new(1);
        let _held = limiter.acquire().await.unwrap();

        let mut waiter = task::spawn(limiter.acquire());
        assert_pending!(waiter.poll());

        limiter.close();
        assert_eq!(assert_ready!(waiter.poll()).unwrap_err(), AdmissionError::Closed);
    }

    #[test]
    fn test_zero_limit_clamped() {
        assert_eq!(FanOutLimiter::new(0).limit(), 1);
    }
}
