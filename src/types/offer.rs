//! Offer types shared by sources and services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DealError;

/// Storefront an offer originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Epic,
    Steam,
    Gog,
}

impl Platform {
    /// All supported platforms, in canonical merge order
    pub const ALL: [Platform; 3] = [Platform::Epic, Platform::Steam, Platform::Gog];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Epic => "epic",
            Platform::Steam => "steam",
            Platform::Gog => "gog",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epic" => Ok(Platform::Epic),
            "steam" => Ok(Platform::Steam),
            "gog" => Ok(Platform::Gog),
            other => Err(DealError::InvalidRequest(format!(
                "unknown platform '{}' (expected epic, steam or gog)",
                other
            ))),
        }
    }
}

/// Unit of the raw price numbers an adapter reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceUnit {
    /// Integer minor units, e.g. cents with `decimals = 2`
    Minor { decimals: u32 },
    /// Already expressed in currency units
    Major,
}

impl PriceUnit {
    pub const CENTS: PriceUnit = PriceUnit::Minor { decimals: 2 };
}

/// Candidate offer as extracted by a source adapter, prices unconverted
#[derive(Debug, Clone, PartialEq)]
pub struct RawOffer {
    pub platform: Platform,
    pub external_id: String,
    pub title: String,
    pub original_price: Option<f64>,
    pub current_price: Option<f64>,
    pub unit: PriceUnit,
    pub currency: Option<String>,
    /// Discount percent as claimed by the store; informational only
    pub reported_discount: Option<i64>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl RawOffer {
    pub fn new(platform: Platform, external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            platform,
            external_id: external_id.into(),
            title: title.into(),
            original_price: None,
            current_price: None,
            unit: PriceUnit::Major,
            currency: None,
            reported_discount: None,
            url: None,
            image: None,
            ends_at: None,
        }
    }

    pub fn with_prices(mut self, original: Option<f64>, current: Option<f64>, unit: PriceUnit) -> Self {
        self.original_price = original;
        self.current_price = current;
        self.unit = unit;
        self
    }
}

/// A normalized, immutable record of one game's price on one platform.
///
/// Only the normalizer builds offers, so `discount_percent` always agrees
/// with the price pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    title: String,
    platform: Platform,
    external_id: String,
    original_price: f64,
    current_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    discount_percent: Option<u8>,
    is_free_to_play: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ends_at: Option<DateTime<Utc>>,
}

/// Prices and derived discount, produced together by the normalizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PricePoint {
    pub original: f64,
    pub current: f64,
    pub discount_percent: Option<u8>,
}

impl Offer {
    pub(crate) fn from_parts(raw: RawOffer, price: PricePoint) -> Self {
        Self {
            title: raw.title,
            platform: raw.platform,
            external_id: raw.external_id,
            original_price: price.original,
            current_price: price.current,
            discount_percent: price.discount_percent,
            is_free_to_play: price.discount_percent.is_none(),
            currency: raw.currency,
            url: raw.url,
            image: raw.image,
            ends_at: raw.ends_at,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn original_price(&self) -> f64 {
        self.original_price
    }

    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    /// `None` for free-to-play titles
    pub fn discount_percent(&self) -> Option<u8> {
        self.discount_percent
    }

    pub fn is_free_to_play(&self) -> bool {
        self.is_free_to_play
    }

    /// Temporarily free: a paid title currently priced at zero
    pub fn is_free_now(&self) -> bool {
        !self.is_free_to_play && self.current_price == 0.0
    }

    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at
    }

    /// Deduplication key
    pub fn key(&self) -> (Platform, &str) {
        (self.platform, &self.external_id)
    }

    /// Copy of this offer with a different display image
    pub fn with_image(&self, image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..self.clone()
        }
    }
}
