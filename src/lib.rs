//! cloudinv - cloud resource inventory with a local cache
//!
//! Lists instances, buckets and databases across regions, merges the results
//! in catalog order and caches them so later queries need no API calls.

pub mod config;
pub mod gcp;
pub mod inventory;
pub mod render;
pub mod resource;

/// Version injected at compile time via CLOUDINV_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("CLOUDINV_VERSION") {
    Some(v) => v,
    None => "dev",
};
