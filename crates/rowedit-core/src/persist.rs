//! Persist seam
//!
//! The controller never talks to a backend itself. A commit hands the staged
//! value to either a closure passed at the call site or a [`Persister`]
//! fixed at construction time by the caller.

use crate::error::CommitError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Transport that durably stores one row's new value
#[async_trait]
pub trait Persister<K, V>: Send + Sync
where
    K: Send + 'static,
    V: Send + 'static,
{
    /// Persist `value` for row `id`
    async fn persist(&self, id: K, value: V) -> Result<(), CommitError>;
}

/// Persister backed by a closure
#[derive(Debug, Clone)]
pub struct FnPersister<F> {
    f: F,
}

/// Adapt an async closure into a [`Persister`]
#[inline]
pub fn persist_fn<F>(f: F) -> FnPersister<F> {
    FnPersister { f }
}

#[async_trait]
impl<K, V, F, Fut> Persister<K, V> for FnPersister<F>
where
    K: Send + 'static,
    V: Send + 'static,
    F: Fn(K, V) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), CommitError>> + Send,
{
    async fn persist(&self, id: K, value: V) -> Result<(), CommitError> {
        (self.f)(id, value).await
    }
}

/// Persister that fails with [`CommitError::Timeout`] when the inner call
/// does not resolve within `limit`
#[derive(Debug, Clone)]
pub struct WithTimeout<P> {
    inner: P,
    limit: Duration,
}

impl<P> WithTimeout<P> {
    /// Wrap a persister
    #[inline]
    #[must_use]
    pub fn new(inner: P, limit: Duration) -> Self {
        Self { inner, limit }
    }

    /// Configured limit
    #[inline]
    #[must_use]
    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl<K, V, P> Persister<K, V> for WithTimeout<P>
where
    K: Send + 'static,
    V: Send + 'static,
    P: Persister<K, V>,
{
    async fn persist(&self, id: K, value: V) -> Result<(), CommitError> {
        match tokio::time::timeout(self.limit, self.inner.persist(id, value)).await {
            Ok(result) => result,
            Err(_) => Err(CommitError::Timeout {
                duration_ms: u64::try_from(self.limit.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_persister_forwards() {
        let persister = persist_fn(|id: u32, value: &'static str| async move {
            if id == 1 && value == "write" {
                Ok(())
            } else {
                Err(CommitError::rejected("unexpected"))
            }
        });

        assert!(persister.persist(1, "write").await.is_ok());
        assert!(persister.persist(2, "write").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_resolves_to_commit_error() {
        let slow = persist_fn(|_id: u32, _value: u32| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let persister = WithTimeout::new(slow, Duration::from_millis(250));

        let err = persister.persist(1, 2).await.unwrap_err();
        assert!(matches!(err, CommitError::Timeout { duration_ms: 250 }));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_passes_fast_results() {
        let fast = persist_fn(|_id: u32, _value: u32| async { Ok(()) });
        let persister = WithTimeout::new(fast, Duration::from_millis(250));
        assert!(persister.persist(1, 2).await.is_ok());
        assert_eq!(persister.limit(), Duration::from_millis(250));
    }
}
