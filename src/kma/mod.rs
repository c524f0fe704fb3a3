//! Primary forecast source: grid projection, publication slots, status
//! taxonomy and the fallback fetch loop

pub mod basetime;
pub mod client;
pub mod grid;
pub mod status;

pub use basetime::{BaseTime, latest_slot, previous_slot};
pub use client::{FallbackPolicy, RawForecastItem, VilageClient, VilageFetch, fetch_with_fallback};
pub use grid::{GridCell, project};
pub use status::{StatusKind, classify};
