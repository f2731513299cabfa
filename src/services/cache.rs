//! Short-lived read-through cache of normalized candidates per platform
//!
//! Each platform has its own async slot lock. The first caller on a stale
//! slot fetches while holding it; concurrent callers for the same platform
//! wait and then read the fresh entry, so at most one upstream fetch per
//! platform is in flight.

use crate::types::{Offer, Platform, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct CachedEntry {
    fetched_at: Instant,
    offers: Vec<Offer>,
}

type Slot = Arc<tokio::sync::Mutex<Option<CachedEntry>>>;

pub struct SourceCache {
    ttl: Duration,
    slots: Mutex<HashMap<Platform, Slot>>,
}

impl SourceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, platform: Platform) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(platform).or_default().clone()
    }

    /// Return cached offers for `platform`, or run `fetch` and cache its result.
    ///
    /// Errors are returned to the caller and never cached.
    pub async fn get_or_fetch<F, Fut>(&self, platform: Platform, fetch: F) -> Result<Vec<Offer>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Offer>>>,
    {
        let slot = self.slot(platform);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                debug!(%platform, offers = cached.offers.len(), "cache hit");
                return Ok(cached.offers.clone());
            }
        }

        debug!(%platform, "cache miss");
        let offers = fetch().await?;
        *entry = Some(CachedEntry {
            fetched_at: Instant::now(),
            offers: offers.clone(),
        });
        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Normalizer;
    use crate::types::{DealError, PriceUnit, RawOffer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn offers(platform: Platform) -> Vec<Offer> {
        let raw = RawOffer::new(platform, "1", "Cached Game").with_prices(
            Some(10.0),
            Some(5.0),
            PriceUnit::Major,
        );
        vec![Normalizer::default().normalize(raw).unwrap()]
    }

    async fn counted_fetch(counter: &AtomicUsize, platform: Platform) -> Result<Vec<Offer>> {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(offers(platform))
    }

    #[tokio::test]
    async fn test_hit_within_ttl_fetches_once() {
        let cache = SourceCache::new(Duration::from_secs(600));
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_fetch(Platform::Steam, || counted_fetch(&calls, Platform::Steam))
            .await
            .unwrap();
        let second = cache
            .get_or_fetch(Platform::Steam, || counted_fetch(&calls, Platform::Steam))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_refetches() {
        let cache = SourceCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        cache
            .get_or_fetch(Platform::Gog, || counted_fetch(&calls, Platform::Gog))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        cache
            .get_or_fetch(Platform::Gog, || counted_fetch(&calls, Platform::Gog))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_coalesce() {
        let cache = SourceCache::new(Duration::from_secs(600));
        let calls = AtomicUsize::new(0);

        let (a, b, c) = tokio::join!(
            cache.get_or_fetch(Platform::Epic, || counted_fetch(&calls, Platform::Epic)),
            cache.get_or_fetch(Platform::Epic, || counted_fetch(&calls, Platform::Epic)),
            cache.get_or_fetch(Platform::Epic, || counted_fetch(&calls, Platform::Epic)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap().len(), 1);
        assert_eq!(b.unwrap().len(), 1);
        assert_eq!(c.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cache = SourceCache::new(Duration::from_secs(600));
        let calls = AtomicUsize::new(0);

        let (steam, gog) = tokio::join!(
            cache.get_or_fetch(Platform::Steam, || counted_fetch(&calls, Platform::Steam)),
            cache.get_or_fetch(Platform::Gog, || counted_fetch(&calls, Platform::Gog)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(steam.unwrap()[0].platform(), Platform::Steam);
        assert_eq!(gog.unwrap()[0].platform(), Platform::Gog);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = SourceCache::new(Duration::from_secs(600));
        let calls = AtomicUsize::new(0);

        let failed = cache
            .get_or_fetch(Platform::Steam, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DealError::unavailable(Platform::Steam, "boom"))
            })
            .await;
        assert!(failed.is_err());

        let ok = cache
            .get_or_fetch(Platform::Steam, || counted_fetch(&calls, Platform::Steam))
            .await;
        assert!(ok.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
