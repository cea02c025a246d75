//! Resource abstraction layer
//!
//! Resource kinds are described by data, not code: each (provider, service)
//! definition names its columns, list method and region set.
//!
//! # Architecture
//!
//! - [`registry`] - Immutable schema registry loaded from embedded JSON
//! - [`catalog`] - Ordered region sets per service
//! - [`client`] - The per-service listing capability and its lookup table
//! - [`fetcher`] - GCP implementation with pagination support
//! - [`sdk_dispatch`] - Maps abstract list method names to concrete REST API calls
//!
//! # Resource Definitions
//!
//! Definitions live in JSON files under `src/resources/`:
//! - `regions.json` - Named region sets (zones, regions, global)
//! - `gcp.json` - Cloud Storage buckets, Compute Engine VMs, Cloud SQL instances

pub mod catalog;
pub mod client;
pub mod fetcher;
pub mod registry;
pub mod sdk_dispatch;

pub use catalog::{RegionCatalog, StaticCatalog};
pub use client::{ClientSet, ListRequest, ResourceClient};
pub use fetcher::{extract_json_value, GcpResourceClient};
pub use registry::{ResourceDef, SchemaRegistry};
