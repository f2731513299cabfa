//! Steam storefront source (`featuredcategories` specials)

use crate::config::AppConfig;
use crate::types::{DealError, Platform, PriceUnit, RawOffer, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{decode_envelope, decode_items, fetch_body, first_non_blank, StoreSource};

const FEATURED_URL: &str = "https://store.steampowered.com/api/featuredcategories";
const APP_URL: &str = "https://store.steampowered.com/app";

#[derive(Deserialize)]
struct FeaturedCategories {
    specials: Specials,
}

#[derive(Deserialize)]
struct Specials {
    items: Vec<Value>,
}

#[derive(Deserialize)]
struct SteamItem {
    id: u64,
    name: String,
    discounted: Option<bool>,
    discount_percent: Option<i64>,
    /// Cents; null when the item is not discounted
    original_price: Option<u64>,
    /// Cents
    final_price: Option<u64>,
    currency: Option<String>,
    large_capsule_image: Option<String>,
    header_image: Option<String>,
    small_capsule_image: Option<String>,
    /// Unix seconds
    discount_expiration: Option<i64>,
}

/// Source for Steam's featured specials
pub struct SteamSource {
    client: Client,
    url: String,
}

impl SteamSource {
    pub fn new(client: Client, config: &AppConfig) -> Self {
        let url = format!(
            "{}?cc={}&l={}",
            FEATURED_URL,
            config.country.to_ascii_lowercase(),
            config.steam_language
        );
        Self { client, url }
    }

    /// Parse a `featuredcategories` response body
    pub fn parse_body(body: &mut [u8]) -> Result<Vec<RawOffer>> {
        let featured: FeaturedCategories = decode_envelope(Platform::Steam, body)?;
        Ok(decode_items(
            Platform::Steam,
            featured.specials.items,
            Self::to_raw,
        ))
    }

    fn to_raw(item: SteamItem) -> Result<Option<RawOffer>> {
        let title = item.name.trim();
        if title.is_empty() {
            return Err(DealError::MalformedItem(format!("steam app {} has no name", item.id)));
        }
        if item.discounted == Some(false) {
            return Ok(None);
        }

        let app_id = item.id.to_string();
        let mut raw = RawOffer::new(Platform::Steam, app_id.clone(), title).with_prices(
            item.original_price.map(|p| p as f64),
            item.final_price.map(|p| p as f64),
            PriceUnit::CENTS,
        );
        raw.currency = item.currency;
        raw.reported_discount = item.discount_percent;
        raw.url = Some(format!("{}/{}", APP_URL, app_id));
        raw.image = first_non_blank([
            item.large_capsule_image,
            item.header_image,
            item.small_capsule_image,
        ]);
        raw.ends_at = item
            .discount_expiration
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

        Ok(Some(raw))
    }
}

#[async_trait]
impl StoreSource for SteamSource {
    fn platform(&self) -> Platform {
        Platform::Steam
    }

    async fn fetch_candidates(&self) -> Result<Vec<RawOffer>> {
        let mut body = fetch_body(&self.client, Platform::Steam, &self.url).await?;
        Self::parse_body(&mut body)
    }
}
