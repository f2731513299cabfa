//! Discount filtering
//!
//! Stable and idempotent: the output keeps input order and filtering a
//! filtered list again changes nothing.

use crate::types::{DiscountFilter, FilterMode, Offer};

/// Whether a single offer satisfies the filter
pub fn matches(offer: &Offer, filter: &DiscountFilter) -> bool {
    let Some(discount) = offer.discount_percent() else {
        // Free-to-play is its own classification, not a degenerate discount
        return filter.include_free_to_play && filter.min_discount == 100;
    };

    // A 100% target means actually free right now, never a paid price
    // that merely rounds to 100
    if filter.min_discount == 100 {
        return offer.is_free_now();
    }

    match filter.mode {
        FilterMode::Exact => discount == filter.min_discount,
        FilterMode::Threshold => discount >= filter.min_discount,
    }
}

/// Keep the offers matching `filter`, preserving order
pub fn filter_offers(offers: Vec<Offer>, filter: &DiscountFilter) -> Vec<Offer> {
    offers
        .into_iter()
        .filter(|offer| matches(offer, filter))
        .collect()
}
