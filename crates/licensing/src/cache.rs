//! Time-boxed, request-deduplicated cache over the entitlement check.
//!
//! Concurrent callers during an outstanding fetch all await the same
//! shared future instead of issuing duplicate requests. A failed fetch is
//! reported as unpaid and is not cached, so the next caller retries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use nlmsync_core::tier::{resolve_tier, TierConfig};
use tokio::sync::Mutex;
use tracing::warn;

use crate::entitlement::{EntitlementChecker, UserState};

const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

type InflightFetch = Shared<BoxFuture<'static, UserState>>;

struct Inner {
    cached: Option<(UserState, Instant)>,
    inflight: Option<InflightFetch>,
}

pub struct LicenseCache {
    checker: Arc<dyn EntitlementChecker>,
    inner: Arc<Mutex<Inner>>,
    ttl: Duration,
}

impl LicenseCache {
    pub fn new(checker: Arc<dyn EntitlementChecker>) -> Self {
        Self::with_ttl(checker, CACHE_TTL)
    }

    pub fn with_ttl(checker: Arc<dyn EntitlementChecker>, ttl: Duration) -> Self {
        Self {
            checker,
            inner: Arc::new(Mutex::new(Inner {
                cached: None,
                inflight: None,
            })),
            ttl,
        }
    }

    /// Cached user state, refreshed at most once per TTL window.
    ///
    /// Never fails: an unreachable entitlement service reads as unpaid.
    pub async fn get_user(&self) -> UserState {
        let fetch = {
            let mut inner = self.inner.lock().await;

            if let Some((user, fetched_at)) = &inner.cached {
                if fetched_at.elapsed() < self.ttl {
                    return user.clone();
                }
            }

            if let Some(inflight) = &inner.inflight {
                inflight.clone()
            } else {
                let checker = self.checker.clone();
                let state = self.inner.clone();
                let fetch = async move {
                    let result = checker.fetch_user().await;
                    let mut inner = state.lock().await;
                    inner.inflight = None;
                    match result {
                        Ok(user) => {
                            inner.cached = Some((user.clone(), Instant::now()));
                            user
                        }
                        Err(e) => {
                            // Fail closed: treat as Free, leave the cache
                            // empty so the next caller retries.
                            warn!(error = %e, "Entitlement check failed, treating user as Free");
                            UserState::default()
                        }
                    }
                }
                .boxed()
                .shared();
                inner.inflight = Some(fetch.clone());
                fetch
            }
        };

        fetch.await
    }

    pub async fn is_pro(&self) -> bool {
        self.get_user().await.paid
    }

    pub async fn tier(&self) -> &'static TierConfig {
        resolve_tier(self.is_pro().await)
    }

    /// Drop the cached state, e.g. after an external "paid" event, so the
    /// next query re-evaluates entitlement immediately.
    pub async fn invalidate(&self) {
        let mut inner = self.inner.lock().await;
        inner.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nlmsync_core::{Error, Result};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingChecker {
        calls: AtomicU32,
        paid: bool,
        fail: bool,
    }

    impl CountingChecker {
        fn new(paid: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                paid,
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                paid: false,
                fail: true,
            })
        }
    }

    #[async_trait]
    impl EntitlementChecker for CountingChecker {
        async fn fetch_user(&self) -> Result<UserState> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Let concurrent callers pile up on the in-flight future.
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(Error::Licensing("service down".to_string()));
            }
            Ok(UserState {
                paid: self.paid,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let checker = CountingChecker::new(true);
        let cache = LicenseCache::new(checker.clone());

        let (a, b, c) = tokio::join!(cache.get_user(), cache.get_user(), cache.get_user());
        assert!(a.paid && b.paid && c.paid);
        assert_eq!(checker.calls.load(Ordering::SeqCst), 1);

        // Still within TTL: served from cache.
        cache.get_user().await;
        assert_eq!(checker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry_refetches() {
        let checker = CountingChecker::new(false);
        let cache = LicenseCache::with_ttl(checker.clone(), Duration::from_millis(1));

        cache.get_user().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.get_user().await;
        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_fails_closed_and_is_not_cached() {
        let checker = CountingChecker::failing();
        let cache = LicenseCache::new(checker.clone());

        assert!(!cache.is_pro().await);
        // The failure was not cached; the next call hits the service again.
        assert!(!cache.is_pro().await);
        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let checker = CountingChecker::new(true);
        let cache = LicenseCache::new(checker.clone());

        assert_eq!(cache.tier().await.name, "Pro");
        cache.invalidate().await;
        cache.get_user().await;
        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);
    }
}
