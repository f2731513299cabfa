//! Inbound query contract

use std::collections::BTreeSet;

use super::{DealError, Platform, Result};

/// How `min_discount` is compared against an offer's discount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Keep offers with discount >= min_discount
    #[default]
    Threshold,
    /// Keep offers with discount == min_discount
    Exact,
}

/// Filtering criteria applied to normalized offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscountFilter {
    pub min_discount: u8,
    pub mode: FilterMode,
    /// Admit free-to-play titles when asking for free (100%) offers
    pub include_free_to_play: bool,
}

/// A validated request for offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferQuery {
    pub min_discount: u8,
    pub exact: bool,
    pub platforms: BTreeSet<Platform>,
    pub include_free_to_play: bool,
    pub resolve_images: bool,
}

impl Default for OfferQuery {
    fn default() -> Self {
        Self {
            min_discount: 0,
            exact: false,
            platforms: Platform::ALL.into_iter().collect(),
            include_free_to_play: false,
            resolve_images: false,
        }
    }
}

impl OfferQuery {
    /// Build a query from raw request parameters.
    ///
    /// - `discount`: integer 0-100 or `"free"` (= 100); missing means 0
    /// - `exact`: `true|1|yes` / `false|0|no`; missing means false
    /// - `platforms`: comma-separated subset of epic,steam,gog; missing or
    ///   blank means all three
    pub fn from_params(
        discount: Option<&str>,
        exact: Option<&str>,
        platforms: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            min_discount: parse_discount(discount)?,
            exact: parse_flag("exact", exact)?,
            platforms: parse_platforms(platforms)?,
            ..Self::default()
        })
    }

    /// Free (100%-off) offers across all platforms
    pub fn free() -> Self {
        Self {
            min_discount: 100,
            ..Self::default()
        }
    }

    pub fn with_platforms(mut self, platforms: impl IntoIterator<Item = Platform>) -> Self {
        self.platforms = platforms.into_iter().collect();
        self
    }

    pub fn discount_filter(&self) -> DiscountFilter {
        DiscountFilter {
            min_discount: self.min_discount,
            mode: if self.exact {
                FilterMode::Exact
            } else {
                FilterMode::Threshold
            },
            include_free_to_play: self.include_free_to_play,
        }
    }
}

fn parse_discount(raw: Option<&str>) -> Result<u8> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(0),
        Some(s) => s,
    };
    if raw.eq_ignore_ascii_case("free") {
        return Ok(100);
    }
    match raw.parse::<u8>() {
        Ok(d) if d <= 100 => Ok(d),
        _ => Err(DealError::InvalidRequest(format!(
            "discount must be an integer between 0 and 100 or \"free\", got '{}'",
            raw
        ))),
    }
}

fn parse_flag(name: &str, raw: Option<&str>) -> Result<bool> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") | Some("no") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some(other) => Err(DealError::InvalidRequest(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

fn parse_platforms(raw: Option<&str>) -> Result<BTreeSet<Platform>> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Platform::ALL.into_iter().collect()),
        Some(s) => s,
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== discount ==========

    #[test]
    fn test_discount_defaults_to_zero() {
        let q = OfferQuery::from_params(None, None, None).unwrap();
        assert_eq!(q.min_discount, 0);
        assert!(!q.exact);
    }

    #[test]
    fn test_discount_free_is_hundred() {
        let q = OfferQuery::from_params(Some("free"), None, None).unwrap();
        assert_eq!(q.min_discount, 100);
        let q = OfferQuery::from_params(Some("FREE"), None, None).unwrap();
        assert_eq!(q.min_discount, 100);
    }

    #[test]
    fn test_discount_numeric() {
        let q = OfferQuery::from_params(Some("75"), None, None).unwrap();
        assert_eq!(q.min_discount, 75);
    }

    #[test]
    fn test_discount_out_of_range() {
        let err = OfferQuery::from_params(Some("101"), None, None).unwrap_err();
        assert!(matches!(err, DealError::InvalidRequest(_)));
    }

    #[test]
    fn test_discount_negative_or_text() {
        assert!(OfferQuery::from_params(Some("-5"), None, None).is_err());
        assert!(OfferQuery::from_params(Some("half"), None, None).is_err());
        assert!(OfferQuery::from_params(Some("50.5"), None, None).is_err());
    }

    // ========== exact ==========

    #[test]
    fn test_exact_flag_values() {
        let q = OfferQuery::from_params(Some("75"), Some("true"), None).unwrap();
        assert!(q.exact);
        assert_eq!(q.discount_filter().mode, FilterMode::Exact);
        let q = OfferQuery::from_params(Some("75"), Some("0"), None).unwrap();
        assert!(!q.exact);
    }

    #[test]
    fn test_exact_flag_invalid() {
        let err = OfferQuery::from_params(None, Some("maybe"), None).unwrap_err();
        assert!(matches!(err, DealError::InvalidRequest(_)));
    }

    // ========== platforms ==========

    #[test]
    fn test_platforms_default_all() {
        let q = OfferQuery::from_params(None, None, Some("  ")).unwrap();
        assert_eq!(q.platforms.len(), 3);
    }

    #[test]
    fn test_platforms_subset() {
        let q = OfferQuery::from_params(None, None, Some("steam, GOG,,steam")).unwrap();
        let expected: BTreeSet<Platform> = [Platform::Steam, Platform::Gog].into_iter().collect();
        assert_eq!(q.platforms, expected);
    }

    #[test]
    fn test_platforms_unknown_rejected() {
        let err = OfferQuery::from_params(None, None, Some("steam,uplay")).unwrap_err();
        assert!(matches!(err, DealError::InvalidRequest(_)));
    }

    #[test]
    fn test_free_query() {
        let q = OfferQuery::free();
        assert_eq!(q.min_discount, 100);
        assert_eq!(q.discount_filter().mode, FilterMode::Threshold);
        assert!(!q.discount_filter().include_free_to_play);
    }
}
