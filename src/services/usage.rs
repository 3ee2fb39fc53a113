// Capture usage counting

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::errors::{UsageError, UsageResult};

/// External counter of OCR captures. Implementations own atomicity.
#[async_trait]
pub trait UsageCounter: Send + Sync {
    /// Add `n` to the count. Fails with `LimitExceeded` when the new total
    /// would pass the limit, unless `allow_over_limit` is set.
    async fn increment(&self, n: u64, allow_over_limit: bool) -> UsageResult<()>;
}

/// In-process counter with an optional limit
#[derive(Debug, Default)]
pub struct LocalUsageCounter {
    used: AtomicU64,
    limit: Option<u64>,
}

impl LocalUsageCounter {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            used: AtomicU64::new(0),
            limit,
        }
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }
}

#[async_trait]
impl UsageCounter for LocalUsageCounter {
    async fn increment(&self, n: u64, allow_over_limit: bool) -> UsageResult<()> {
        let mut current = self.used.load(Ordering::Acquire);

        loop {
            let next = current.saturating_add(n);

            if let Some(limit) = self.limit {
                if next > limit && !allow_over_limit {
                    return Err(UsageError::LimitExceeded { used: current, limit });
                }
            }

            match self
                .used
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_limit_enforced() {
        let counter = LocalUsageCounter::new(Some(2));

        counter.increment(1, false).await.unwrap();
        counter.increment(1, false).await.unwrap();
        let err = counter.increment(1, false).await.unwrap_err();

        assert!(matches!(err, UsageError::LimitExceeded { used: 2, limit: 2 }));
        assert_eq!(counter.used(), 2);

        counter.increment(1, true).await.unwrap();
        assert_eq!(counter.used(), 3);
    }

    #[tokio::test]
    async fn test_unlimited_counter() {
        let counter = LocalUsageCounter::new(None);
        counter.increment(5, false).await.unwrap();
        counter.increment(u64::MAX, false).await.unwrap();
        assert_eq!(counter.used(), u64::MAX);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let counter = Arc::new(LocalUsageCounter::new(Some(50)));

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let counter = Arc::clone(&counter);
                tokio::spawn(async move { counter.increment(1, false).await.is_ok() })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 50);
        assert_eq!(counter.used(), 50);
    }
}
