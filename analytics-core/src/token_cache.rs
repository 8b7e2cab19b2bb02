//! Client-credentials bearer token cache.
//!
//! A [`TokenCache`] owns at most one [`Credential`]. Callers ask for a token
//! with [`TokenCache::get_token`]; the cached value is handed out until its
//! (margin-adjusted) expiry, after which exactly one refresh is issued against
//! the injected [`TokenSource`]. The refresh runs while holding an async
//! mutex, so callers racing past an expired token wait for the same refresh
//! instead of issuing their own.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Seconds subtracted from the provider's advertised lifetime before a token
/// is considered stale. Capped at half the lifetime for short-lived tokens.
pub const SAFETY_MARGIN_SECS: i64 = 600;

/// Upper bound on a provider-reported lifetime (one year).
const MAX_LIFETIME_SECS: i64 = 365 * 24 * 3600;

// ------------------------------------------------------------------ //
//  Seams                                                              //
// ------------------------------------------------------------------ //

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A freshly issued token as reported by the provider.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// Something that can mint a new bearer token (one network round-trip).
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn request_token(&self) -> Result<TokenGrant>;
}

// ------------------------------------------------------------------ //
//  Cache                                                              //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    clock: Arc<dyn Clock>,
    margin: Duration,
    state: Mutex<Option<Credential>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self::with_clock(source, Arc::new(SystemClock))
    }

    pub fn with_clock(source: Arc<dyn TokenSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            margin: Duration::seconds(SAFETY_MARGIN_SECS),
            state: Mutex::new(None),
        }
    }

    /// Return a valid bearer token, refreshing it first if needed.
    pub async fn get_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        if let Some(cred) = state.as_ref() {
            if cred.is_valid_at(self.clock.now()) {
                return Ok(cred.token.clone());
            }
            debug!(expired_at = %cred.expires_at, "cached token expired");
        }

        let grant = self.source.request_token().await?;
        let lifetime = Duration::seconds(grant.expires_in.clamp(0, MAX_LIFETIME_SECS));
        if lifetime <= Duration::zero() {
            warn!(expires_in = grant.expires_in, "token issued without a usable lifetime, not caching it");
            *state = None;
            return Ok(grant.access_token);
        }

        let margin = self.margin.min(lifetime / 2);
        let expires_at = self.clock.now() + lifetime - margin;
        info!(%expires_at, "fetched new access token");

        let token = grant.access_token;
        *state = Some(Credential {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }

    /// Forget the cached credential so the next call re-authenticates.
    pub async fn invalidate(&self) {
        if self.state.lock().await.take().is_some() {
            debug!("cached token invalidated");
        }
    }

    /// Snapshot of the cached credential, if any.
    pub async fn current(&self) -> Option<Credential> {
        self.state.lock().await.clone()
    }
}

// ------------------------------------------------------------------ //
//  Tests                                                              //
// ------------------------------------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Service};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct ManualClock(StdMutex<DateTime<Utc>>);

    impl ManualClock {
        fn at(t: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(StdMutex::new(t)))
        }

        fn advance(&self, by: Duration) {
            let mut t = self.0.lock().unwrap();
            *t = *t + by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
        /// Reported `expires_in`; 3600 when unset.
        lifetime: Option<i64>,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn request_token(&self) -> Result<TokenGrant> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(Error::Auth {
                    service: Service::Recordings,
                    detail: "invalid_client".into(),
                });
            }
            // Yield so concurrent callers get a chance to pile up on the lock.
            tokio::task::yield_now().await;
            Ok(TokenGrant {
                access_token: format!("token-{n}"),
                expires_in: self.lifetime.unwrap_or(3600),
            })
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn first_call_fetches_and_sets_expiry_with_margin() {
        let clock = ManualClock::at(t0());
        let source = Arc::new(CountingSource::default());
        let cache = TokenCache::with_clock(source.clone(), clock.clone());

        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let cred = cache.current().await.unwrap();
        assert_eq!(cred.expires_at, t0() + Duration::seconds(3000));
    }

    #[tokio::test]
    async fn valid_token_is_reused_without_network() {
        let clock = ManualClock::at(t0());
        let source = Arc::new(CountingSource::default());
        let cache = TokenCache::with_clock(source.clone(), clock.clone());

        cache.get_token().await.unwrap();
        clock.advance(Duration::seconds(2999));
        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_is_refreshed_exactly_at_expiry() {
        let clock = ManualClock::at(t0());
        let source = Arc::new(CountingSource::default());
        let cache = TokenCache::with_clock(source.clone(), clock.clone());

        cache.get_token().await.unwrap();
        clock.advance(Duration::seconds(3000));
        assert_eq!(cache.get_token().await.unwrap(), "token-2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        let cred = cache.current().await.unwrap();
        assert_eq!(cred.expires_at, t0() + Duration::seconds(6000));
    }

    #[tokio::test]
    async fn short_lived_token_keeps_half_its_lifetime() {
        let clock = ManualClock::at(t0());
        let source = Arc::new(CountingSource {
            lifetime: Some(300),
            ..Default::default()
        });
        let cache = TokenCache::with_clock(source.clone(), clock.clone());

        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        let cred = cache.current().await.unwrap();
        assert_eq!(cred.expires_at, t0() + Duration::seconds(150));
        assert!(cred.is_valid_at(clock.now()));

        clock.advance(Duration::seconds(149));
        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get_token().await.unwrap(), "token-2");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_lifetime_token_is_not_cached() {
        let source = Arc::new(CountingSource {
            lifetime: Some(0),
            ..Default::default()
        });
        let cache = TokenCache::with_clock(source.clone(), ManualClock::at(t0()));

        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        assert!(cache.current().await.is_none());
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let clock = ManualClock::at(t0());
        let source = Arc::new(CountingSource::default());
        let cache = TokenCache::with_clock(source.clone(), clock);

        cache.get_token().await.unwrap();
        cache.invalidate().await;
        assert!(cache.current().await.is_none());
        assert_eq!(cache.get_token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn failed_refresh_leaves_cache_empty() {
        let source = Arc::new(CountingSource {
            fail: true,
            ..Default::default()
        });
        let cache = TokenCache::with_clock(source.clone(), ManualClock::at(t0()));

        assert!(matches!(cache.get_token().await, Err(Error::Auth { .. })));
        assert!(cache.current().await.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let source = Arc::new(CountingSource::default());
        let cache = Arc::new(TokenCache::with_clock(source.clone(), ManualClock::at(t0())));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_token().await.unwrap() })
            })
            .collect();

        for h in handles {
            assert_eq!(h.await.unwrap(), "token-1");
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
