//! `Beachcast` - Beach weather and marine forecast collector
//!
//! This library provides the core functionality for collecting village
//! forecasts and marine conditions for Korean beaches, merging them into
//! unified per-timestamp records and serving them over a small read API.

pub mod api;
pub mod collector;
pub mod config;
pub mod error;
pub mod kma;
pub mod marine;
pub mod merge;
pub mod models;
pub mod store;
pub mod web;

// Re-export core types for public API
pub use collector::{Collector, CollectorOptions, RunSummary};
pub use config::BeachcastConfig;
pub use error::BeachcastError;
pub use kma::{BaseTime, FallbackPolicy, GridCell, VilageClient, VilageFetch};
pub use marine::{MarineClient, MarineFetch};
pub use models::{BeachLocation, MarineRecord, MergedForecast, PickedItem, RegionInfo};
pub use store::{BeachMetadata, ForecastCoverage, ForecastStore, RegionBeaches};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, BeachcastError>;
