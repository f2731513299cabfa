//! dealtrack: discounted game offers from Steam, Epic and GOG

pub mod config;
pub mod services;
pub mod sources;
pub mod types;

pub use config::AppConfig;
pub use services::OfferAggregator;
pub use types::{DealError, Offer, OfferQuery, Platform, Result};
