//! Display image resolution
//!
//! Fallback chain: the source's own image, then a deterministic CDN URL
//! where the platform has one, then a generated SVG placeholder. Never fails.

use crate::types::{Offer, Platform};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use sha3::{Digest, Sha3_256};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

const STEAM_CDN_URL: &str = "https://cdn.akamai.steamstatic.com/steam/apps";

/// Image references are effectively stable for a day
pub const DEFAULT_IMAGE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn title_cleaner() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[™®©]|[^\w\s-]").expect("valid regex"))
}

/// Strip trademark symbols and punctuation from a title
pub fn clean_title(title: &str) -> String {
    title_cleaner().replace_all(title, "").trim().to_string()
}

/// Up to two uppercase initials of the cleaned title, `?` when none
pub fn initials(title: &str) -> String {
    let letters: String = clean_title(title)
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    if letters.is_empty() {
        "?".to_string()
    } else {
        letters
    }
}

/// Background colour derived from the title hash, e.g. `#3fa2c1`
pub fn title_color(title: &str) -> String {
    let digest = Sha3_256::digest(title.as_bytes());
    format!("#{}", hex::encode(&digest[..3]))
}

/// Known CDN URL for a platform/id pair, if the platform has a convention
pub fn cdn_url(platform: Platform, external_id: &str) -> Option<String> {
    match platform {
        Platform::Steam
            if !external_id.is_empty() && external_id.chars().all(|c| c.is_ascii_digit()) =>
        {
            Some(format!("{}/{}/library_600x900.jpg", STEAM_CDN_URL, external_id))
        }
        _ => None,
    }
}

/// SVG placeholder as a base64 data URI
pub fn placeholder(title: &str, platform: Platform) -> String {
    let svg = format!(
        concat!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="600" height="900" viewBox="0 0 600 900">"##,
            r##"<rect width="600" height="900" fill="{color}"/>"##,
            r##"<text x="300" y="470" text-anchor="middle" fill="#ffffff" font-family="Arial" font-size="180" font-weight="bold">{initials}</text>"##,
            r##"<text x="300" y="580" text-anchor="middle" fill="#ffffff" font-family="Arial" font-size="36" opacity="0.8">{platform}</text>"##,
            "</svg>"
        ),
        color = title_color(title),
        initials = initials(title),
        platform = platform.as_str().to_uppercase(),
    );
    format!("data:image/svg+xml;base64,{}", BASE64.encode(svg))
}

/// Resolves and caches one display image per `(platform, external_id)`
pub struct ImageResolver {
    ttl: Duration,
    cache: Mutex<HashMap<(Platform, String), (Instant, String)>>,
}

impl Default for ImageResolver {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_TTL)
    }
}

impl ImageResolver {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Best available image reference for an offer
    pub fn resolve(&self, offer: &Offer) -> String {
        if let Some(image) = offer.image().filter(|s| !s.trim().is_empty()) {
            return image.to_string();
        }

        let key = (offer.platform(), offer.external_id().to_string());
        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((at, image)) = cache.get(&key) {
                if at.elapsed() < self.ttl {
                    return image.clone();
                }
            }
        }

        let image = cdn_url(offer.platform(), offer.external_id())
            .unwrap_or_else(|| placeholder(offer.title(), offer.platform()));

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.retain(|_, (at, _)| at.elapsed() < self.ttl);
        cache.insert(key, (Instant::now(), image.clone()));
        image
    }

    /// Attach a resolved image to every offer
    pub fn annotate(&self, offers: Vec<Offer>) -> Vec<Offer> {
        offers
            .into_iter()
            .map(|offer| {
                let image = self.resolve(&offer);
                offer.with_image(image)
            })
            .collect()
    }

    #[cfg(test)]
    fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
