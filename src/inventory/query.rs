//! Query model
//!
//! A [`ResourceQuery`] is built once per invocation and never mutated.

use super::error::InventoryError;
use std::fmt;
use std::str::FromStr;

/// Wildcard accepted for both the region and the filter
pub const ALL: &str = "all";

/// Which regions a query covers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegionSpec {
    /// Fan out across every region of the catalog
    All,
    /// Exactly one region
    Region(String),
}

impl RegionSpec {
    pub fn as_str(&self) -> &str {
        match self {
            RegionSpec::All => ALL,
            RegionSpec::Region(id) => id,
        }
    }

    /// Fold a region literally named "all" into [`RegionSpec::All`]
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            RegionSpec::Region(id) if id.trim().eq_ignore_ascii_case(ALL) => RegionSpec::All,
            other => other,
        }
    }
}

impl FromStr for RegionSpec {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(InventoryError::InvalidQuery("empty region".into()));
        }
        if s.eq_ignore_ascii_case(ALL) {
            Ok(RegionSpec::All)
        } else {
            Ok(RegionSpec::Region(s.to_string()))
        }
    }
}

impl fmt::Display for RegionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which resources a query covers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterSpec {
    All,
    /// A single resource id (instance id, bucket name, database name)
    Resource(String),
}

impl FilterSpec {
    pub fn as_str(&self) -> &str {
        match self {
            FilterSpec::All => ALL,
            FilterSpec::Resource(id) => id,
        }
    }

    /// Fold a resource literally named "all" into [`FilterSpec::All`]
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            FilterSpec::Resource(id) if id.trim().eq_ignore_ascii_case(ALL) => FilterSpec::All,
            other => other,
        }
    }

    /// Check whether a resource id passes this filter
    pub fn matches(&self, id: &str) -> bool {
        match self {
            FilterSpec::All => true,
            FilterSpec::Resource(wanted) => wanted == id,
        }
    }
}

impl FromStr for FilterSpec {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(InventoryError::InvalidQuery("empty resource filter".into()));
        }
        if s.contains('/') {
            return Err(InventoryError::InvalidQuery(format!(
                "resource filter '{}' must not contain '/'",
                s
            )));
        }
        if s.eq_ignore_ascii_case(ALL) {
            Ok(FilterSpec::All)
        } else {
            Ok(FilterSpec::Resource(s.to_string()))
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inventory request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQuery {
    pub provider: String,
    pub service: String,
    pub region: RegionSpec,
    pub filter: FilterSpec,
    pub running_only: bool,
    pub refresh: bool,
}

impl ResourceQuery {
    /// Query every region and every resource, served from cache
    pub fn new(provider: &str, service: &str) -> Self {
        Self {
            provider: provider.to_string(),
            service: service.to_string(),
            region: RegionSpec::All,
            filter: FilterSpec::All,
            running_only: false,
            refresh: false,
        }
    }

    #[must_use]
    pub fn with_region(mut self, region: RegionSpec) -> Self {
        self.region = region.normalized();
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter.normalized();
        self
    }

    /// Same query with the "all" wildcard in canonical form
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut query = self.clone();
        query.region = query.region.normalized();
        query.filter = query.filter.normalized();
        query
    }

    #[must_use]
    pub fn with_running_only(mut self, running_only: bool) -> Self {
        self.running_only = running_only;
        self
    }

    #[must_use]
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
}
