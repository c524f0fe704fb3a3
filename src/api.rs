//! Read API
//!
//! JSON endpoints over the store: location catalog, region listings and
//! per-beach forecasts. Handlers read the store through shared state,
//! never the upstream services.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use chrono::{Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::models::{BeachLocation, MergedForecast, RegionInfo, location};
use crate::store::{BeachMetadata, ForecastStore, RegionBeaches};

/// Timezone offset of the forecast service's local clock
const LOCAL_UTC_OFFSET_HOURS: i64 = 9;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ForecastStore>,
    pub locations: Arc<Vec<BeachLocation>>,
}

fn local_now() -> NaiveDateTime {
    Utc::now().naive_utc() + Duration::hours(LOCAL_UTC_OFFSET_HOURS)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/locations", get(get_locations))
        .route("/regions", get(get_regions))
        .route("/regions/{region}/beaches", get(get_region_beaches))
        .route("/beaches/{region}/{beach_id}", get(get_beach_metadata))
        .route(
            "/beaches/{region}/{beach_id}/forecasts",
            get(get_beach_forecasts),
        )
        .route("/beaches/{region}/{beach_id}/current", get(get_beach_current))
        .with_state(state)
}

/// One region with its beaches, for the catalog endpoint
#[derive(Debug, Serialize)]
pub struct RegionLocations {
    pub id: String,
    pub name: String,
    pub order: u32,
    pub beaches: Vec<BeachLocation>,
}

/// Full catalog grouped by region, regions in their configured order
async fn get_locations(State(state): State<AppState>) -> Json<Vec<RegionLocations>> {
    let grouped = location::regions(&state.locations)
        .into_iter()
        .map(|region| RegionLocations {
            beaches: state
                .locations
                .iter()
                .filter(|l| l.region == region.id)
                .cloned()
                .collect(),
            id: region.id,
            name: region.name,
            order: region.order,
        })
        .collect();
    Json(grouped)
}

async fn get_regions(State(state): State<AppState>) -> Json<Vec<RegionInfo>> {
    Json(location::regions(&state.locations))
}

async fn get_region_beaches(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> Result<Json<RegionBeaches>, StatusCode> {
    let listing = state.store.region_beaches(&region).await.map_err(|err| {
        error!(region, "region listing read failed: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    listing.map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn get_beach_metadata(
    State(state): State<AppState>,
    Path((region, beach_id)): Path<(String, u32)>,
) -> Result<Json<BeachMetadata>, StatusCode> {
    let metadata = state
        .store
        .beach_metadata(&region, beach_id)
        .await
        .map_err(|err| {
            error!(region, beach_id, "metadata read failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    metadata.map(Json).ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Deserialize)]
struct ForecastQuery {
    /// How many hours ahead to return; defaults to 72
    hours: Option<i64>,
}

async fn get_beach_forecasts(
    State(state): State<AppState>,
    Path((region, beach_id)): Path<(String, u32)>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<Vec<MergedForecast>>, StatusCode> {
    let hours = query.hours.unwrap_or(72);
    if !(1..=24 * 14).contains(&hours) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let from = local_now();
    let to = from + Duration::hours(hours);
    let forecasts = state
        .store
        .forecasts_between(&region, beach_id, from, to)
        .await
        .map_err(|err| {
            error!(region, beach_id, "forecast read failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(forecasts))
}

async fn get_beach_current(
    State(state): State<AppState>,
    Path((region, beach_id)): Path<(String, u32)>,
) -> Result<Json<MergedForecast>, StatusCode> {
    let current = state
        .store
        .current_conditions(&region, beach_id, local_now())
        .await
        .map_err(|err| {
            error!(region, beach_id, "current conditions read failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    current.map(Json).ok_or(StatusCode::NOT_FOUND)
}
