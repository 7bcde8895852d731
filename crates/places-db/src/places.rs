//! Read side of the place store.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::{Arguments, PgPool, Row};
use tracing::{debug, info};

use places_core::{
    CityCount, DistrictCount, DistrictCounts, Error, FilterSpec, PlaceReader, Result,
    SearchResult, ValidationError,
};

use crate::aggregate::AggregationQueries;
use crate::normalize::{PlaceRow, ResultNormalizer};
use crate::query::{CompiledQuery, QueryCompiler, QueryParam};

/// Convert compiled parameters to bind arguments, preserving order.
pub fn bind_arguments(params: &[QueryParam]) -> Result<PgArguments> {
    let mut args = PgArguments::default();
    for param in params {
        let added = match param {
            QueryParam::Text(s) => args.add(s.clone()),
            QueryParam::Float(f) => args.add(*f),
            QueryParam::Int(i) => args.add(*i),
        };
        added.map_err(|e| Error::Database(sqlx::Error::Encode(e)))?;
    }
    Ok(args)
}

/// PostgreSQL + PostGIS implementation of [`PlaceReader`].
///
/// Each call acquires its connections from the pool and returns them before
/// the call completes, whatever the outcome.
#[derive(Debug, Clone)]
pub struct PgPlaceRepository {
    pool: PgPool,
}

impl PgPlaceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn trace_query(op: &'static str, query: &CompiledQuery) {
        debug!(
            subsystem = "db",
            component = "places",
            op,
            param_count = query.params.len(),
            sql = %query.sql,
            "Compiled query"
        );
    }
}

fn invalid(err: ValidationError) -> Error {
    Error::Validation(err)
}

#[async_trait]
impl PlaceReader for PgPlaceRepository {
    async fn search(&self, filter: &FilterSpec) -> Result<SearchResult> {
        let start = Instant::now();
        let query = QueryCompiler::compile_search(filter).map_err(invalid)?;
        Self::trace_query("search", &query);

        let rows: Vec<PlaceRow> =
            sqlx::query_as_with(&query.sql, bind_arguments(&query.params)?)
                .fetch_all(&self.pool)
                .await?;
        let result = SearchResult::new(ResultNormalizer::normalize_all(rows));

        info!(
            subsystem = "db",
            component = "places",
            op = "search",
            result_count = result.count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(result)
    }

    async fn city_counts(&self, filter: &FilterSpec) -> Result<Vec<CityCount>> {
        let start = Instant::now();
        let query = AggregationQueries::city_counts(filter);
        Self::trace_query("city_counts", &query);

        let rows = sqlx::query_with(&query.sql, bind_arguments(&query.params)?)
            .fetch_all(&self.pool)
            .await?;

        let cities = rows
            .iter()
            .map(|row| -> Result<CityCount> {
                let code: String = row.try_get("city")?;
                let name: Option<String> = row.try_get("city_name")?;
                Ok(CityCount {
                    name: name.unwrap_or_else(|| code.clone()),
                    code,
                    count: row.try_get("count")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            subsystem = "db",
            component = "places",
            op = "city_counts",
            result_count = cities.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "City counts complete"
        );
        Ok(cities)
    }

    async fn district_counts(&self, city: &str, filter: &FilterSpec) -> Result<DistrictCounts> {
        let start = Instant::now();
        let counts_query = AggregationQueries::district_counts(city, filter).map_err(invalid)?;
        let name_query = AggregationQueries::city_display_name(city, filter).map_err(invalid)?;
        Self::trace_query("district_counts", &counts_query);

        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_with(&counts_query.sql, bind_arguments(&counts_query.params)?)
            .fetch_all(&mut *conn)
            .await?;
        let districts = rows
            .iter()
            .map(|row| -> Result<DistrictCount> {
                Ok(DistrictCount {
                    name: row.try_get("district")?,
                    count: row.try_get("count")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let city_name = sqlx::query_scalar_with::<_, Option<String>, _>(
            &name_query.sql,
            bind_arguments(&name_query.params)?,
        )
        .fetch_optional(&mut *conn)
        .await?
        .flatten();

        info!(
            subsystem = "db",
            component = "places",
            op = "district_counts",
            city,
            result_count = districts.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "District counts complete"
        );
        Ok(DistrictCounts {
            city: city.to_string(),
            city_name: city_name.unwrap_or_else(|| city.to_string()),
            districts,
        })
    }
}
