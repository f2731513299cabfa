//! Price normalization service
//!
//! Converts each source's raw price representation into currency units and
//! derives the discount percentage. This is the only place offers are built,
//! so every source shares one set of unit and discount rules.

use crate::types::{DealError, Offer, PricePoint, PriceUnit, RawOffer, Result};
use tracing::{debug, warn};

/// Default ceiling above which a converted price is assumed still scaled
pub const DEFAULT_DOUBLE_SCALE_THRESHOLD: f64 = 200.0;

/// Largest minor-unit exponent any real currency uses
const MAX_MINOR_DECIMALS: u32 = 4;

/// Tolerance when comparing current against original price
const PRICE_EPSILON: f64 = 1e-9;

/// Derive a discount from a price pair.
///
/// Returns `None` for free-to-play titles (`original <= 0`), where a discount
/// is undefined.
///
/// # Examples
/// ```
/// use dealtrack::services::normalizer::discount_percent;
///
/// assert_eq!(discount_percent(20.0, 5.0), Some(75));
/// assert_eq!(discount_percent(19.99, 0.0), Some(100));
/// assert_eq!(discount_percent(0.0, 0.0), None);
/// ```
pub fn discount_percent(original: f64, current: f64) -> Option<u8> {
    if original <= 0.0 {
        return None;
    }
    if current == 0.0 {
        return Some(100);
    }
    let pct = (100.0 * (1.0 - current / original)).round();
    Some(pct.clamp(0.0, 100.0) as u8)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Normalizes raw candidates into offers
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    double_scale_threshold: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_DOUBLE_SCALE_THRESHOLD)
    }
}

impl Normalizer {
    pub fn new(double_scale_threshold: f64) -> Self {
        Self {
            double_scale_threshold,
        }
    }

    /// Convert raw values to currency units.
    ///
    /// Minor units are divided by `10^decimals`. If a result still exceeds the
    /// double-scale threshold the pair was reported in minor units twice over
    /// and is divided by 100 again; if that is still too high the item is
    /// rejected as ambiguous.
    pub fn convert_units(
        &self,
        original: Option<f64>,
        current: Option<f64>,
        unit: PriceUnit,
    ) -> Result<(Option<f64>, Option<f64>)> {
        for value in [original, current].into_iter().flatten() {
            if !value.is_finite() || value < 0.0 {
                return Err(DealError::AmbiguousPriceData(format!(
                    "price {} is negative or not a number",
                    value
                )));
            }
        }

        let PriceUnit::Minor { decimals } = unit else {
            return Ok((original, current));
        };

        if decimals > MAX_MINOR_DECIMALS {
            return Err(DealError::AmbiguousPriceData(format!(
                "{} minor-unit decimals is out of range",
                decimals
            )));
        }
        let divisor = 10f64.powi(decimals as i32);
        let mut original = original.map(|v| v / divisor);
        let mut current = current.map(|v| v / divisor);

        let exceeds = |o: Option<f64>, c: Option<f64>, limit: f64| {
            o.unwrap_or(0.0) > limit || c.unwrap_or(0.0) > limit
        };

        if exceeds(original, current, self.double_scale_threshold) {
            original = original.map(|v| v / 100.0);
            current = current.map(|v| v / 100.0);
            if exceeds(original, current, self.double_scale_threshold) {
                return Err(DealError::AmbiguousPriceData(format!(
                    "prices {:?}/{:?} remain above {} after rescaling",
                    original, current, self.double_scale_threshold
                )));
            }
        }

        Ok((original, current))
    }

    /// Normalize one raw candidate into an offer
    pub fn normalize(&self, raw: RawOffer) -> Result<Offer> {
        let (original, current) =
            self.convert_units(raw.original_price, raw.current_price, raw.unit)?;

        let (original, current) = match (original, current) {
            (Some(o), Some(c)) => (o, c),
            (None, Some(c)) => (c, c),
            (Some(o), None) => (o, o),
            (None, None) => {
                return Err(DealError::MalformedItem(format!(
                    "{} '{}' has no price fields",
                    raw.platform, raw.title
                )))
            }
        };

        if current > original + PRICE_EPSILON {
            return Err(DealError::AmbiguousPriceData(format!(
                "{} '{}' current price {} exceeds original {}",
                raw.platform, raw.title, current, original
            )));
        }

        let original = round_cents(original);
        let current = round_cents(current);
        let discount = discount_percent(original, current);

        if let (Some(reported), Some(derived)) = (raw.reported_discount, discount) {
            if (reported - i64::from(derived)).abs() > 1 {
                debug!(
                    platform = %raw.platform,
                    id = %raw.external_id,
                    reported,
                    derived,
                    "store-reported discount disagrees with prices"
                );
            }
        }

        Ok(Offer::from_parts(
            raw,
            PricePoint {
                original,
                current,
                discount_percent: discount,
            },
        ))
    }

    /// Normalize a batch, keeping input order and skipping items that fail
    pub fn normalize_all(&self, raws: Vec<RawOffer>) -> Vec<Offer> {
        let mut offers = Vec::with_capacity(raws.len());
        for raw in raws {
            let (platform, id) = (raw.platform, raw.external_id.clone());
            match self.normalize(raw) {
                Ok(offer) => offers.push(offer),
                Err(e) => warn!(%platform, %id, "skipping item: {}", e),
            }
        }
        offers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    fn raw(original: Option<f64>, current: Option<f64>, unit: PriceUnit) -> RawOffer {
        RawOffer::new(Platform::Steam, "42", "Game X").with_prices(original, current, unit)
    }

    // ========== discount_percent ==========

    #[test]
    fn test_discount_basic() {
        assert_eq!(discount_percent(20.0, 5.0), Some(75));
        assert_eq!(discount_percent(59.99, 29.99), Some(50));
    }

    #[test]
    fn test_discount_rounds_to_nearest() {
        // 1 - 6.66/9.99 = 0.3333 → 33
        assert_eq!(discount_percent(9.99, 6.66), Some(33));
        // 1 - 0.81/8.19 = 0.9011 → 90
        assert_eq!(discount_percent(8.19, 0.81), Some(90));
    }

    #[test]
    fn test_discount_zero_current_is_hundred() {
        assert_eq!(discount_percent(29.99, 0.0), Some(100));
    }

    #[test]
    fn test_discount_free_to_play_undefined() {
        assert_eq!(discount_percent(0.0, 0.0), None);
    }

    #[test]
    fn test_discount_no_reduction() {
        assert_eq!(discount_percent(19.99, 19.99), Some(0));
    }

    // ========== convert_units ==========

    #[test]
    fn test_convert_cents() {
        let n = Normalizer::default();
        let (o, c) = n
            .convert_units(Some(5999.0), Some(2999.0), PriceUnit::CENTS)
            .unwrap();
        assert_eq!(o, Some(59.99));
        assert_eq!(c, Some(29.99));
    }

    #[test]
    fn test_convert_major_untouched() {
        let n = Normalizer::default();
        let (o, c) = n
            .convert_units(Some(29.99), Some(7.49), PriceUnit::Major)
            .unwrap();
        assert_eq!(o, Some(29.99));
        assert_eq!(c, Some(7.49));
    }

    #[test]
    fn test_convert_detects_double_scaling() {
        // 599900 "cents" → 5999.00 after one pass, > 200 → 59.99
        let n = Normalizer::default();
        let (o, c) = n
            .convert_units(Some(599_900.0), Some(299_900.0), PriceUnit::CENTS)
            .unwrap();
        assert!((o.unwrap() - 59.99).abs() < 1e-9);
        assert!((c.unwrap() - 29.99).abs() < 1e-9);
    }

    #[test]
    fn test_convert_unrecoverable_scaling() {
        let n = Normalizer::default();
        let err = n
            .convert_units(Some(99_999_999.0), Some(1.0), PriceUnit::CENTS)
            .unwrap_err();
        assert!(matches!(err, DealError::AmbiguousPriceData(_)));
    }

    #[test]
    fn test_convert_custom_decimals() {
        let n = Normalizer::default();
        let (o, c) = n
            .convert_units(Some(19990.0), None, PriceUnit::Minor { decimals: 3 })
            .unwrap();
        assert_eq!(o, Some(19.99));
        assert_eq!(c, None);
    }

    #[test]
    fn test_convert_rejects_out_of_range_decimals() {
        let n = Normalizer::default();
        for decimals in [5, 400, u32::MAX] {
            let err = n
                .convert_units(Some(2999.0), Some(1499.0), PriceUnit::Minor { decimals })
                .unwrap_err();
            assert!(matches!(err, DealError::AmbiguousPriceData(_)));
        }
    }

    #[test]
    fn test_normalize_bad_decimals_never_looks_free_to_play() {
        let bad = raw(Some(2999.0), Some(1499.0), PriceUnit::Minor { decimals: 400 });
        assert!(Normalizer::default().normalize(bad).is_err());
        let batch = vec![raw(Some(2999.0), Some(1499.0), PriceUnit::Minor { decimals: 400 })];
        assert!(Normalizer::default().normalize_all(batch).is_empty());
    }

    #[test]
    fn test_convert_rejects_negative() {
        let n = Normalizer::default();
        assert!(n
            .convert_units(Some(-1.0), Some(0.0), PriceUnit::Major)
            .is_err());
        assert!(n
            .convert_units(Some(f64::NAN), Some(0.0), PriceUnit::Major)
            .is_err());
    }

    // ========== normalize ==========

    #[test]
    fn test_normalize_game_x_seventy_five_percent() {
        let offer = Normalizer::default()
            .normalize(raw(Some(20.0), Some(5.0), PriceUnit::Major))
            .unwrap();
        assert_eq!(offer.title(), "Game X");
        assert_eq!(offer.platform(), Platform::Steam);
        assert_eq!(offer.discount_percent(), Some(75));
        assert!(!offer.is_free_to_play());
    }

    #[test]
    fn test_normalize_free_to_play() {
        let offer = Normalizer::default()
            .normalize(raw(Some(0.0), Some(0.0), PriceUnit::CENTS))
            .unwrap();
        assert!(offer.is_free_to_play());
        assert_eq!(offer.discount_percent(), None);
    }

    #[test]
    fn test_normalize_temporarily_free() {
        let offer = Normalizer::default()
            .normalize(raw(Some(2999.0), Some(0.0), PriceUnit::CENTS))
            .unwrap();
        assert!(!offer.is_free_to_play());
        assert!(offer.is_free_now());
        assert_eq!(offer.discount_percent(), Some(100));
        assert_eq!(offer.original_price(), 29.99);
    }

    #[test]
    fn test_normalize_missing_original_means_no_discount() {
        let offer = Normalizer::default()
            .normalize(raw(None, Some(1999.0), PriceUnit::CENTS))
            .unwrap();
        assert_eq!(offer.original_price(), 19.99);
        assert_eq!(offer.discount_percent(), Some(0));
    }

    #[test]
    fn test_normalize_missing_current_means_no_discount() {
        let offer = Normalizer::default()
            .normalize(raw(Some(9.99), None, PriceUnit::Major))
            .unwrap();
        assert_eq!(offer.current_price(), 9.99);
        assert_eq!(offer.discount_percent(), Some(0));
    }

    #[test]
    fn test_normalize_no_prices_is_malformed() {
        let err = Normalizer::default()
            .normalize(raw(None, None, PriceUnit::Major))
            .unwrap_err();
        assert!(matches!(err, DealError::MalformedItem(_)));
    }

    #[test]
    fn test_normalize_current_above_original_is_ambiguous() {
        let err = Normalizer::default()
            .normalize(raw(Some(10.0), Some(12.0), PriceUnit::Major))
            .unwrap_err();
        assert!(matches!(err, DealError::AmbiguousPriceData(_)));
    }

    #[test]
    fn test_normalize_price_on_zero_original_is_ambiguous() {
        let err = Normalizer::default()
            .normalize(raw(Some(0.0), Some(4.99), PriceUnit::Major))
            .unwrap_err();
        assert!(matches!(err, DealError::AmbiguousPriceData(_)));
    }

    #[test]
    fn test_normalize_reported_discount_never_wins() {
        let mut r = raw(Some(20.0), Some(5.0), PriceUnit::Major);
        r.reported_discount = Some(90);
        let offer = Normalizer::default().normalize(r).unwrap();
        assert_eq!(offer.discount_percent(), Some(75));
    }

    #[test]
    fn test_normalize_all_skips_bad_items_in_order() {
        let mut bad = raw(Some(1.0), Some(2.0), PriceUnit::Major);
        bad.external_id = "bad".into();
        let mut second = raw(Some(10.0), Some(1.0), PriceUnit::Major);
        second.external_id = "second".into();

        let offers = Normalizer::default().normalize_all(vec![
            raw(Some(20.0), Some(5.0), PriceUnit::Major),
            bad,
            second,
        ]);
        let ids: Vec<&str> = offers.iter().map(|o| o.external_id()).collect();
        assert_eq!(ids, vec!["42", "second"]);
    }

    #[test]
    fn test_normalized_prices_consistent_with_discount() {
        let n = Normalizer::default();
        let cases = [(5999.0, 2999.0), (819.0, 81.0), (1999.0, 1.0), (333.0, 111.0)];
        for (o, c) in cases {
            let offer = n.normalize(raw(Some(o), Some(c), PriceUnit::CENTS)).unwrap();
            assert!(offer.current_price() <= offer.original_price());
            let expected =
                (100.0 * (1.0 - offer.current_price() / offer.original_price())).round() as u8;
            assert_eq!(offer.discount_percent(), Some(expected));
        }
    }
}
