//! Type definitions for dealtrack

mod error;
mod offer;
mod query;

pub use error::*;
pub use offer::*;
pub use query::*;
