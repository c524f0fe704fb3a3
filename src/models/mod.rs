//! Core data models shared across the collector, store and read API

pub mod forecast;
pub mod location;

pub use forecast::{MarineRecord, MergedForecast, PickedItem};
pub use location::{BeachLocation, RegionInfo};
