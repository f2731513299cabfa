//! GOG catalog source

use crate::config::AppConfig;
use crate::types::{DealError, Platform, PriceUnit, RawOffer, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{decode_envelope, decode_items, fetch_body, first_non_blank, StoreSource};

const CATALOG_URL: &str = "https://catalog.gog.com/v1/catalog";
const STORE_URL: &str = "https://www.gog.com";

#[derive(Deserialize)]
struct CatalogPage {
    products: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GogProduct {
    id: Option<Value>,
    slug: Option<String>,
    title: String,
    price: Option<GogPrice>,
    cover_vertical: Option<String>,
    cover_horizontal: Option<String>,
    store_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GogPrice {
    /// e.g. "-75%"
    discount: Option<String>,
    base_money: Option<GogMoney>,
    final_money: Option<GogMoney>,
}

#[derive(Deserialize)]
struct GogMoney {
    /// Decimal string in currency units, e.g. "19.99"
    amount: String,
    currency: Option<String>,
}

/// Parse a GOG money amount ("19.99")
fn parse_amount(money: Option<&GogMoney>) -> Result<Option<f64>> {
    let Some(money) = money else {
        return Ok(None);
    };
    money
        .amount
        .trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|_| DealError::MalformedItem(format!("invalid GOG amount '{}'", money.amount)))
}

/// Parse GOG's discount label ("-75%") into a percentage
fn parse_discount_label(label: &str) -> Option<i64> {
    let digits: String = label.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Product ids arrive as either strings or numbers
fn id_to_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Source for the GOG catalog's discounted products
pub struct GogSource {
    client: Client,
    url: String,
    locale: String,
}

impl GogSource {
    pub fn new(client: Client, config: &AppConfig) -> Self {
        let url = format!(
            "{}?limit={}&order=desc:trending&productType=in:game,pack&discounted=eq:true&countryCode={}&locale={}&currencyCode={}",
            CATALOG_URL, config.gog_page_size, config.country, config.locale, config.currency
        );
        Self {
            client,
            url,
            locale: config.locale.clone(),
        }
    }

    /// Parse a catalog page body
    pub fn parse_body(&self, body: &mut [u8]) -> Result<Vec<RawOffer>> {
        let page: CatalogPage = decode_envelope(Platform::Gog, body)?;
        Ok(decode_items(Platform::Gog, page.products, |product: GogProduct| {
            self.to_raw(product)
        }))
    }

    fn to_raw(&self, product: GogProduct) -> Result<Option<RawOffer>> {
        let title = product.title.trim();
        if title.is_empty() {
            return Err(DealError::MalformedItem("GOG product without title".into()));
        }

        let slug = product.slug.clone().filter(|s| !s.trim().is_empty());
        let external_id = slug
            .clone()
            .or_else(|| product.id.as_ref().and_then(id_to_string))
            .ok_or_else(|| DealError::MalformedItem(format!("GOG '{}' has no slug or id", title)))?;

        let price = product
            .price
            .as_ref()
            .ok_or_else(|| DealError::MalformedItem(format!("GOG '{}' has no price", title)))?;

        let original = parse_amount(price.base_money.as_ref())?;
        let current = parse_amount(price.final_money.as_ref())?;

        let mut raw = RawOffer::new(Platform::Gog, external_id, title).with_prices(
            original,
            current,
            PriceUnit::Major,
        );
        raw.currency = price
            .final_money
            .as_ref()
            .or(price.base_money.as_ref())
            .and_then(|m| m.currency.clone());
        raw.reported_discount = price.discount.as_deref().and_then(parse_discount_label);
        raw.image = first_non_blank([product.cover_vertical, product.cover_horizontal]);
        raw.url = first_non_blank([
            product.store_link,
            slug.map(|s| format!("{}/{}/game/{}", STORE_URL, self.locale, s)),
        ]);

        Ok(Some(raw))
    }
}

#[async_trait]
impl StoreSource for GogSource {
    fn platform(&self) -> Platform {
        Platform::Gog
    }

    async fn fetch_candidates(&self) -> Result<Vec<RawOffer>> {
        let mut body = fetch_body(&self.client, Platform::Gog, &self.url).await?;
        self.parse_body(&mut body)
    }
}
