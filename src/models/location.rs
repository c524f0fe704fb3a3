//! Beach location registry
//!
//! Locations are immutable reference data loaded once per run from a JSON
//! list. Each entry names a beach, the region it belongs to, and the
//! geographic coordinate the upstream providers are queried with.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

fn default_region_order() -> u32 {
    999
}

/// One configured beach site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeachLocation {
    /// Region identifier (e.g. "busan")
    pub region: String,
    /// Region display name (e.g. "부산")
    pub region_name: String,
    /// Rank used to order regions in API responses
    #[serde(default = "default_region_order")]
    pub region_order: u32,
    /// Beach identifier (e.g. "songjeong")
    pub beach: String,
    /// Numeric beach id, unique across the registry
    pub beach_id: u32,
    /// Beach display name (e.g. "송정")
    pub display_name: String,
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
}

/// Region summary derived from the registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionInfo {
    pub id: String,
    pub name: String,
    pub order: u32,
}

impl BeachLocation {
    /// Region identifier made safe for use as a document path segment
    #[must_use]
    pub fn region_key(&self) -> String {
        sanitize_path_segment(&self.region)
    }
}

/// Replace characters that collide with the store's key separators
#[must_use]
pub fn sanitize_path_segment(segment: &str) -> String {
    segment.replace(['/', ' '], "_")
}

/// Load the locations registry from a JSON file
pub fn load_locations(path: impl AsRef<Path>) -> Result<Vec<BeachLocation>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read locations file: {}", path.display()))?;
    let locations: Vec<BeachLocation> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse locations file: {}", path.display()))?;
    Ok(locations)
}

/// Distinct regions in the registry, sorted by their configured order
#[must_use]
pub fn regions(locations: &[BeachLocation]) -> Vec<RegionInfo> {
    let mut by_id: BTreeMap<&str, RegionInfo> = BTreeMap::new();
    for loc in locations {
        by_id.entry(&loc.region).or_insert_with(|| RegionInfo {
            id: loc.region.clone(),
            name: loc.region_name.clone(),
            order: loc.region_order,
        });
    }
    let mut list: Vec<RegionInfo> = by_id.into_values().collect();
    list.sort_by_key(|r| r.order);
    list
}
