//! The screening core: per-entity classification, the per-job name cache
//! and the concurrent dispatcher.

pub mod cache;
pub mod engine;
pub mod types;

pub use cache::{Lookup, ScreeningCache};
pub use engine::{Screener, ScreeningContext};
pub use types::{sort_by_input_order, CacheEntry, EntityRecord, ScreeningResult, ScreeningStatus};
