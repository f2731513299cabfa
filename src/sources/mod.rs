//! Source adapters for storefront APIs

mod epic;
mod gog;
mod steam;

pub use epic::EpicSource;
pub use gog::GogSource;
pub use steam::SteamSource;

use crate::config::AppConfig;
use crate::types::{DealError, Platform, RawOffer, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Trait for fetching candidate offers from one storefront
#[async_trait]
pub trait StoreSource: Send + Sync {
    /// Platform this source reports for
    fn platform(&self) -> Platform;

    /// Fetch current promotions as raw, unconverted candidates.
    ///
    /// Fails with `SourceUnavailable` only when the whole source is unusable;
    /// malformed items are skipped.
    async fn fetch_candidates(&self) -> Result<Vec<RawOffer>>;
}

/// Build the shared HTTP client used by all sources
pub fn build_client(config: &AppConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .user_agent(config.user_agent.clone())
        .gzip(true)
        .build()
        .map_err(|e| DealError::Config(format!("HTTP client error: {}", e)))
}

/// GET a storefront endpoint and return the raw body
pub(crate) async fn fetch_body(client: &Client, platform: Platform, url: &str) -> Result<Vec<u8>> {
    debug!(%platform, url, "fetching");
    read_body(platform, client.get(url)).await
}

/// POST a JSON payload (GraphQL query) and return the raw body
pub(crate) async fn post_json(
    client: &Client,
    platform: Platform,
    url: &str,
    payload: &Value,
) -> Result<Vec<u8>> {
    debug!(%platform, url, "posting query");
    read_body(platform, client.post(url).json(payload)).await
}

async fn read_body(platform: Platform, request: RequestBuilder) -> Result<Vec<u8>> {
    let response = request
        .header(header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| DealError::unavailable(platform, format!("HTTP request failed: {}", e)))?
        .error_for_status()
        .map_err(|e| DealError::unavailable(platform, format!("HTTP status: {}", e)))?;

    let body = response
        .bytes()
        .await
        .map_err(|e| DealError::unavailable(platform, format!("Failed to read body: {}", e)))?;
    Ok(body.to_vec())
}

/// Decode the top-level envelope; a shape mismatch makes the whole source unavailable
pub(crate) fn decode_envelope<T: DeserializeOwned>(platform: Platform, body: &mut [u8]) -> Result<T> {
    simd_json::serde::from_slice(body)
        .map_err(|e| DealError::unavailable(platform, format!("unexpected response shape: {}", e)))
}

/// Decode items one by one, skipping (and logging) those that fail.
///
/// `map` returns `Ok(None)` for items that decode fine but are not candidates.
pub(crate) fn decode_items<T, F>(platform: Platform, items: Vec<Value>, mut map: F) -> Vec<RawOffer>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Result<Option<RawOffer>>,
{
    let total = items.len();
    let mut offers = Vec::with_capacity(total);

    for (index, item) in items.into_iter().enumerate() {
        let decoded = serde_json::from_value::<T>(item)
            .map_err(|e| DealError::MalformedItem(e.to_string()))
            .and_then(&mut map);
        match decoded {
            Ok(Some(offer)) => offers.push(offer),
            Ok(None) => {}
            Err(e) => warn!(%platform, index, "skipping item: {}", e),
        }
    }

    debug!(%platform, total, kept = offers.len(), "decoded items");
    offers
}

/// First candidate that is present and not blank
pub(crate) fn first_non_blank<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

/// Registry of available sources
pub struct SourceRegistry {
    sources: Vec<Arc<dyn StoreSource>>,
}

impl SourceRegistry {
    /// Create a registry with the Steam, Epic and GOG sources sharing one client
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = build_client(config)?;
        Ok(Self {
            sources: vec![
                Arc::new(EpicSource::new(client.clone(), config)),
                Arc::new(SteamSource::new(client.clone(), config)),
                Arc::new(GogSource::new(client, config)),
            ],
        })
    }

    /// Registry over caller-supplied sources
    pub fn from_sources(sources: Vec<Arc<dyn StoreSource>>) -> Self {
        Self { sources }
    }

    /// Find the source for a platform
    pub fn get(&self, platform: Platform) -> Option<Arc<dyn StoreSource>> {
        self.sources
            .iter()
            .find(|s| s.platform() == platform)
            .cloned()
    }
}
