//! Route handlers.
//!
//! Handlers only translate query strings into a [`FilterSpec`], call the
//! reader, and serialize the result.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use places_db::{
    CityCount, DistrictCounts, FilterSpec, RawFilterParams, SearchResult, ValidationError,
};

use crate::error::ApiError;
use crate::AppState;

/// Raw query pairs; `category` may repeat.
pub type QueryPairs = Query<Vec<(String, String)>>;

/// Parsed query string shared by all read endpoints.
#[derive(Debug, Default)]
struct ReadQuery {
    params: RawFilterParams,
}

impl ReadQuery {
    fn parse(pairs: Vec<(String, String)>) -> Result<Self, ValidationError> {
        let mut params = RawFilterParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "category" => params.categories.push(value),
                "city" => params.city = Some(value),
                "bbox" => params.bbox = Some(value),
                "has_diaper_table" => params.has_diaper_table = Some(value),
                "has_parking" => params.has_parking = Some(value),
                "include_outdated" => {
                    params.include_outdated = parse_bool("include_outdated", &value)?
                }
                _ => {}
            }
        }
        Ok(Self { params })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ValidationError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// `GET /api/places`
pub async fn search_places(
    State(state): State<AppState>,
    Query(pairs): QueryPairs,
) -> Result<Json<SearchResult>, ApiError> {
    let start = Instant::now();
    let filter = FilterSpec::from_params(ReadQuery::parse(pairs)?.params)?;
    let result = state.reader.search(&filter).await?;
    debug!(
        subsystem = "api",
        op = "search_places",
        result_count = result.count,
        duration_ms = start.elapsed().as_millis() as u64,
        "Handled places request"
    );
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct CitiesResponse {
    pub cities: Vec<CityCount>,
}

/// `GET /api/cities`
///
/// Only `category` and `include_outdated` are honoured.
pub async fn list_cities(
    State(state): State<AppState>,
    Query(pairs): QueryPairs,
) -> Result<Json<CitiesResponse>, ApiError> {
    let query = ReadQuery::parse(pairs)?;
    let filter = aggregation_filter(query.params);
    let cities = state.reader.city_counts(&filter).await?;
    Ok(Json(CitiesResponse { cities }))
}

/// `GET /api/districts?city=...`
pub async fn list_districts(
    State(state): State<AppState>,
    Query(pairs): QueryPairs,
) -> Result<Json<DistrictCounts>, ApiError> {
    let query = ReadQuery::parse(pairs)?;
    let city = query
        .params
        .city
        .clone()
        .filter(|c| !c.trim().is_empty())
        .ok_or(ValidationError::MissingParameter("city"))?;
    let filter = aggregation_filter(query.params);
    let counts = state.reader.district_counts(&city, &filter).await?;
    Ok(Json(counts))
}

/// Aggregations skip bbox and feature flags, so they are not validated here.
fn aggregation_filter(params: RawFilterParams) -> FilterSpec {
    FilterSpec {
        categories: params
            .categories
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect(),
        include_outdated: params.include_outdated,
        ..FilterSpec::default()
    }
}
