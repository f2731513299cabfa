//! Service layer: normalization, filtering, caching, aggregation and images

pub mod aggregator;
pub mod cache;
pub mod filter;
pub mod images;
pub mod normalizer;

pub use aggregator::OfferAggregator;
pub use cache::SourceCache;
pub use filter::filter_offers;
pub use images::ImageResolver;
pub use normalizer::Normalizer;
