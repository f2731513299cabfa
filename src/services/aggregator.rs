//! Aggregator service: fans out to sources, merges, filters, dedups and sorts

use crate::config::{AppConfig, DEFAULT_SOURCE_TIMEOUT_SECS};
use crate::services::cache::SourceCache;
use crate::services::filter::filter_offers;
use crate::services::images::ImageResolver;
use crate::services::normalizer::Normalizer;
use crate::sources::{SourceRegistry, StoreSource};
use crate::types::{DealError, Offer, OfferQuery, Platform, Result};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Aggregator over all registered storefront sources
pub struct OfferAggregator {
    registry: SourceRegistry,
    normalizer: Normalizer,
    source_timeout: Duration,
    cache: Option<SourceCache>,
    images: ImageResolver,
}

impl OfferAggregator {
    /// Build an aggregator over the given sources, without caching
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            normalizer: Normalizer::default(),
            source_timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
            cache: None,
            images: ImageResolver::default(),
        }
    }

    /// Build the default storefront aggregator from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let registry = SourceRegistry::new(config)?;
        Ok(Self::new(registry)
            .with_normalizer(Normalizer::new(config.double_scale_threshold))
            .with_source_timeout(config.source_timeout())
            .with_cache_ttl(config.cache_ttl())
            .with_images(ImageResolver::new(config.image_cache_ttl())))
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    /// Enable the per-platform result cache; a zero TTL disables it
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = (!ttl.is_zero()).then(|| SourceCache::new(ttl));
        self
    }

    pub fn with_images(mut self, images: ImageResolver) -> Self {
        self.images = images;
        self
    }

    /// Offers matching `query`, sorted by discount descending then title.
    ///
    /// Never fails: unavailable sources are logged and contribute nothing.
    pub async fn get_offers(&self, query: &OfferQuery) -> Vec<Offer> {
        let sources: Vec<Arc<dyn StoreSource>> = query
            .platforms
            .iter()
            .filter_map(|&platform| {
                let source = self.registry.get(platform);
                if source.is_none() {
                    warn!(%platform, "no source registered");
                }
                source
            })
            .collect();

        let results = join_all(sources.iter().map(|s| self.candidates(s.as_ref()))).await;

        // Merge in canonical platform order regardless of completion order
        let mut merged: Vec<(Platform, Vec<Offer>)> = Vec::with_capacity(results.len());
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(offers) => merged.push((source.platform(), offers)),
                Err(e) => warn!(platform = %source.platform(), "source skipped: {}", e),
            }
        }
        merged.sort_by_key(|(platform, _)| *platform);
        let succeeded = merged.len();

        let candidates: Vec<Offer> = merged.into_iter().flat_map(|(_, offers)| offers).collect();
        let total = candidates.len();

        let mut offers = dedup(filter_offers(candidates, &query.discount_filter()));
        sort_offers(&mut offers);

        if query.resolve_images {
            offers = self.images.annotate(offers);
        }

        info!(
            sources = sources.len(),
            succeeded,
            candidates = total,
            returned = offers.len(),
            min_discount = query.min_discount,
            exact = query.exact,
            "aggregated offers"
        );
        offers
    }

    /// 100%-off promotions on the given comma-separated platforms, or all of them
    pub async fn get_free_offers(&self, platforms: Option<&str>) -> Result<Vec<Offer>> {
        let query = OfferQuery::from_params(Some("free"), None, platforms)?;
        Ok(self.get_offers(&query).await)
    }

    /// Normalized candidates for one source, through the cache when enabled
    async fn candidates(&self, source: &dyn StoreSource) -> Result<Vec<Offer>> {
        let platform = source.platform();
        let fetch = || async {
            let raws = tokio::time::timeout(self.source_timeout, source.fetch_candidates())
                .await
                .map_err(|_| {
                    DealError::unavailable(
                        platform,
                        format!("timed out after {:?}", self.source_timeout),
                    )
                })??;
            Ok::<_, DealError>(self.normalizer.normalize_all(raws))
        };

        match &self.cache {
            Some(cache) => cache.get_or_fetch(platform, fetch).await,
            None => fetch().await,
        }
    }
}

/// Drop later offers sharing a `(platform, external_id)` key
fn dedup(offers: Vec<Offer>) -> Vec<Offer> {
    let mut seen: HashSet<(Platform, String)> = HashSet::new();
    offers
        .into_iter()
        .filter(|offer| {
            let (platform, id) = offer.key();
            seen.insert((platform, id.to_string()))
        })
        .collect()
}

/// Discount descending (free-to-play last), then title, platform and id ascending
fn sort_offers(offers: &mut [Offer]) {
    offers.sort_by(|a, b| {
        b.discount_percent()
            .cmp(&a.discount_percent())
            .then_with(|| a.title().cmp(b.title()))
            .then_with(|| a.platform().cmp(&b.platform()))
            .then_with(|| a.external_id().cmp(b.external_id()))
    });
}
