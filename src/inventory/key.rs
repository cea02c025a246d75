//! Cache keys
//!
//! A key is `provider/service/region/filter`, e.g. `tencent/lh/ap-beijing/all`.
//! Segments are percent-encoded so a `/` inside one can never be confused with
//! a separator. Plain ids pass through untouched.

use super::query::{FilterSpec, RegionSpec};
use std::fmt;
use std::path::PathBuf;

/// Stable storage key for one (provider, service, region, filter) tuple
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn build(provider: &str, service: &str, region: &RegionSpec, filter: &FilterSpec) -> Self {
        let segments = [provider, service, region.as_str(), filter.as_str()];
        let encoded: Vec<String> = segments.iter().map(|s| encode_segment(s)).collect();
        CacheKey(encoded.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relative path of the entry file under the cache root
    pub fn relative_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        let mut parts = self.0.split('/').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                path.push(part);
            } else {
                path.push(format!("{}.json", part));
            }
        }
        path
    }

    /// Rebuild a key from a relative entry path, if it has the key shape
    pub fn from_relative_path(path: &std::path::Path) -> Option<Self> {
        if path.extension()? != "json" {
            return None;
        }
        let stripped = path.with_extension("");
        let parts: Vec<&str> = stripped
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        Some(CacheKey(parts.join("/")))
    }

    /// Decoded segments: provider, service, region, filter
    pub fn segments(&self) -> Vec<String> {
        self.0
            .split('/')
            .map(|s| {
                urlencoding::decode(s)
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            })
            .collect()
    }

    /// Check whether this key belongs to a provider (and optionally a service)
    pub fn in_scope(&self, provider: &str, service: Option<&str>) -> bool {
        let mut parts = self.0.split('/');
        if parts.next() != Some(encode_segment(provider).as_str()) {
            return false;
        }
        match service {
            Some(service) => parts.next() == Some(encode_segment(service).as_str()),
            None => true,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Percent-encode one segment. A leading `.` is escaped too, so no segment
/// is `.`, `..` or a hidden file name.
fn encode_segment(segment: &str) -> String {
    let encoded = urlencoding::encode(segment);
    match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{}", rest),
        None => encoded.into_owned(),
    }
}
