//! Inventory aggregation and cache
//!
//! - [`query`] - What the user asked for
//! - [`table`] - Header/body tables with equal-width rows
//! - [`key`] - Deterministic cache keys
//! - [`store`] - Atomic on-disk cache entries
//! - [`aggregator`] - Region fan-out with a failure policy
//! - [`dispatcher`] - Live vs cached serving

pub mod aggregator;
pub mod dispatcher;
pub mod error;
pub mod key;
pub mod query;
pub mod store;
pub mod table;

pub use aggregator::{Aggregation, FailurePolicy, RegionAggregator, RegionFailure};
pub use dispatcher::{DataSource, InventoryDispatcher, Outcome};
pub use error::{InventoryError, ProviderError};
pub use key::CacheKey;
pub use query::{FilterSpec, RegionSpec, ResourceQuery};
pub use store::{CacheEntry, CacheStore};
pub use table::{ResourceRecord, TableData};
