//! Epic Games Store source
//!
//! Two feeds share one `searchStore` element shape: the `freeGamesPromotions`
//! feed (current giveaways, with promotion windows) and a catalog search for
//! every title on sale. Both are merged, free feed first, one entry per id.

use crate::config::AppConfig;
use crate::types::{DealError, Platform, PriceUnit, RawOffer, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::warn;

use super::{decode_envelope, decode_items, fetch_body, first_non_blank, post_json, StoreSource};

const PROMOTIONS_URL: &str =
    "https://store-site-backend-static.ak.epicgames.com/freeGamesPromotions";
const CATALOG_URL: &str = "https://graphql.epicgames.com/graphql";
const STORE_URL: &str = "https://store.epicgames.com";

/// Base games, game bundles and editions
const CATALOG_CATEGORY: &str = "games/edition/base|bundle/games|editors";

const CATALOG_QUERY: &str = r#"query searchStoreQuery($allowCountries: String, $category: String, $count: Int, $country: String!, $locale: String, $onSale: Boolean, $start: Int) {
  Catalog {
    searchStore(allowCountries: $allowCountries, category: $category, count: $count, country: $country, locale: $locale, onSale: $onSale, start: $start) {
      elements {
        title
        id
        productSlug
        urlSlug
        keyImages { type url }
        catalogNs { mappings(pageType: "productHome") { pageSlug } }
        offerMappings { pageSlug }
        price(country: $country) {
          totalPrice { discountPrice originalPrice currencyCode currencyInfo { decimals } }
        }
        promotions(category: $category) {
          promotionalOffers { promotionalOffers { startDate endDate } }
        }
      }
    }
  }
}"#;

/// Placeholder entry Epic publishes ahead of a reveal
const MYSTERY_TITLE: &str = "Mystery Game";

/// Key image types in order of preference (vertical covers first)
const PREFERRED_IMAGE_TYPES: [&str; 3] = ["OfferImageTall", "DieselStoreFrontTall", "Thumbnail"];

#[derive(Deserialize)]
struct PromotionsResponse {
    data: PromotionsData,
}

#[derive(Deserialize)]
struct PromotionsData {
    #[serde(rename = "Catalog")]
    catalog: Catalog,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Catalog {
    search_store: SearchStore,
}

#[derive(Deserialize)]
struct SearchStore {
    elements: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpicElement {
    title: String,
    id: String,
    product_slug: Option<String>,
    url_slug: Option<String>,
    key_images: Option<Vec<KeyImage>>,
    price: Option<EpicPrice>,
    promotions: Option<Promotions>,
    catalog_ns: Option<CatalogNs>,
    offer_mappings: Option<Vec<PageMapping>>,
}

#[derive(Deserialize)]
struct KeyImage {
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpicPrice {
    total_price: Option<TotalPrice>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalPrice {
    discount_price: Option<i64>,
    original_price: Option<i64>,
    currency_code: Option<String>,
    currency_info: Option<CurrencyInfo>,
}

#[derive(Deserialize)]
struct CurrencyInfo {
    decimals: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Promotions {
    promotional_offers: Option<Vec<PromotionGroup>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromotionGroup {
    promotional_offers: Option<Vec<PromotionWindow>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromotionWindow {
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

impl PromotionWindow {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start_date.map_or(true, |start| start <= now)
            && self.end_date.map_or(true, |end| now < end)
    }
}

#[derive(Deserialize)]
struct CatalogNs {
    mappings: Option<Vec<PageMapping>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageMapping {
    page_slug: Option<String>,
}

impl EpicElement {
    /// Currently running promotion window, if any
    fn active_window(&self, now: DateTime<Utc>) -> Option<&PromotionWindow> {
        self.promotions
            .as_ref()?
            .promotional_offers
            .as_deref()?
            .iter()
            .filter_map(|group| group.promotional_offers.as_deref())
            .flatten()
            .find(|window| window.is_active(now))
    }

    fn image(&self) -> Option<String> {
        let images = self.key_images.as_deref().unwrap_or_default();
        PREFERRED_IMAGE_TYPES
            .iter()
            .find_map(|kind| images.iter().find(|img| img.kind == *kind))
            .or_else(|| images.first())
            .map(|img| img.url.clone())
            .filter(|url| !url.trim().is_empty())
    }

    fn slug(&self) -> Option<String> {
        let mapping_slug = |mappings: Option<&Vec<PageMapping>>| {
            mappings
                .and_then(|m| m.first())
                .and_then(|m| m.page_slug.clone())
        };
        // Epic uses "[]" as an empty productSlug
        let product_slug = self.product_slug.clone().filter(|s| s != "[]");
        first_non_blank([
            product_slug,
            mapping_slug(self.catalog_ns.as_ref().and_then(|ns| ns.mappings.as_ref())),
            mapping_slug(self.offer_mappings.as_ref()),
            self.url_slug.clone(),
        ])
    }
}

/// Merge feeds in order, keeping the first element seen for each id
fn merge_feeds(feeds: impl IntoIterator<Item = Vec<RawOffer>>) -> Vec<RawOffer> {
    let mut seen = HashSet::new();
    feeds
        .into_iter()
        .flatten()
        .filter(|raw| seen.insert(raw.external_id.clone()))
        .collect()
}

/// Merge both feeds; one failing feed is logged, both failing is an error
fn combine_feeds(
    promotions: Result<Vec<RawOffer>>,
    catalog: Result<Vec<RawOffer>>,
) -> Result<Vec<RawOffer>> {
    match (promotions, catalog) {
        (Ok(promotions), Ok(catalog)) => Ok(merge_feeds([promotions, catalog])),
        (Ok(promotions), Err(e)) => {
            warn!("epic catalog skipped: {}", e);
            Ok(promotions)
        }
        (Err(e), Ok(catalog)) => {
            warn!("epic free-games feed skipped: {}", e);
            Ok(catalog)
        }
        (Err(e), Err(_)) => Err(e),
    }
}

/// Source for the Epic Games Store free-games feed and on-sale catalog
pub struct EpicSource {
    client: Client,
    promotions_url: String,
    country: String,
    locale: String,
    catalog_count: u32,
}

impl EpicSource {
    pub fn new(client: Client, config: &AppConfig) -> Self {
        let promotions_url = format!(
            "{}?locale={}&country={}&allowCountries={}",
            PROMOTIONS_URL, config.locale, config.country, config.country
        );
        Self {
            client,
            promotions_url,
            country: config.country.clone(),
            locale: config.locale.clone(),
            catalog_count: config.epic_catalog_count,
        }
    }

    /// GraphQL payload for the on-sale catalog search
    fn catalog_request(&self) -> Value {
        json!({
            "query": CATALOG_QUERY,
            "variables": {
                "allowCountries": self.country,
                "country": self.country,
                "locale": self.locale,
                "category": CATALOG_CATEGORY,
                "count": self.catalog_count,
                "start": 0,
                "onSale": true,
            }
        })
    }

    async fn fetch_promotions(&self) -> Result<Vec<RawOffer>> {
        let mut body = fetch_body(&self.client, Platform::Epic, &self.promotions_url).await?;
        self.parse_body(&mut body)
    }

    async fn fetch_catalog(&self) -> Result<Vec<RawOffer>> {
        let payload = self.catalog_request();
        let mut body = post_json(&self.client, Platform::Epic, CATALOG_URL, &payload).await?;
        self.parse_body(&mut body)
    }

    /// Parse a `searchStore` response body from either feed
    pub fn parse_body(&self, body: &mut [u8]) -> Result<Vec<RawOffer>> {
        self.parse_body_at(body, Utc::now())
    }

    /// Parse with an explicit clock, so promotion windows are testable
    pub fn parse_body_at(&self, body: &mut [u8], now: DateTime<Utc>) -> Result<Vec<RawOffer>> {
        let response: PromotionsResponse = decode_envelope(Platform::Epic, body)?;
        Ok(decode_items(
            Platform::Epic,
            response.data.catalog.search_store.elements,
            |element: EpicElement| self.to_raw(element, now),
        ))
    }

    fn to_raw(&self, element: EpicElement, now: DateTime<Utc>) -> Result<Option<RawOffer>> {
        let title = element.title.trim();
        if title.is_empty() || title == MYSTERY_TITLE {
            return Ok(None);
        }

        let total = element
            .price
            .as_ref()
            .and_then(|p| p.total_price.as_ref())
            .ok_or_else(|| DealError::MalformedItem(format!("epic '{}' has no price", title)))?;

        let window = element.active_window(now);
        let discounted = matches!(
            (total.original_price, total.discount_price),
            (Some(original), Some(current)) if current < original
        );
        if window.is_none() && !discounted {
            return Ok(None);
        }

        let decimals = total
            .currency_info
            .as_ref()
            .and_then(|c| c.decimals)
            .unwrap_or(2);

        let mut raw = RawOffer::new(Platform::Epic, element.id.clone(), title).with_prices(
            total.original_price.map(|p| p as f64),
            total.discount_price.map(|p| p as f64),
            PriceUnit::Minor { decimals },
        );
        raw.currency = total.currency_code.clone();
        raw.ends_at = window.and_then(|w| w.end_date);
        raw.image = element.image();
        raw.url = element
            .slug()
            .map(|slug| format!("{}/{}/p/{}", STORE_URL, self.locale, slug));

        Ok(Some(raw))
    }
}

#[async_trait]
impl StoreSource for EpicSource {
    fn platform(&self) -> Platform {
        Platform::Epic
    }

    async fn fetch_candidates(&self) -> Result<Vec<RawOffer>> {
        let (promotions, catalog) = tokio::join!(self.fetch_promotions(), self.fetch_catalog());
        combine_feeds(promotions, catalog)
    }
}
