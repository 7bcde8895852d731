//! Grouped counts over the freshness, category and city clauses of a filter.
//!
//! Bounding box and feature requirements are never applied to aggregations.

use places_core::{keys, FilterSpec, ValidationError};

use crate::query::{attr_text, render_all, CompiledQuery, Predicate, QueryCompiler};

/// Builders for the city and district count queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregationQueries;

impl AggregationQueries {
    /// Place count per city, with the first non-null `city_name` property
    /// seen in each group as display name.
    pub fn city_counts(filter: &FilterSpec) -> CompiledQuery {
        let mut preds = Vec::new();
        preds.extend(QueryCompiler::freshness(filter));
        preds.extend(QueryCompiler::categories(filter));

        let mut params = Vec::new();
        let where_clause = render_all(&preds, &mut params);
        let city_name = attr_text(keys::CITY_NAME);
        let sql = format!(
            "SELECT city, COUNT(*) AS count, \
             (array_agg({city_name}) FILTER (WHERE {city_name} IS NOT NULL))[1] AS city_name \
             FROM places WHERE {where_clause} GROUP BY city ORDER BY city"
        );
        CompiledQuery { sql, params }
    }

    /// Place count per non-null `district` property within one city.
    pub fn district_counts(
        city: &str,
        filter: &FilterSpec,
    ) -> Result<CompiledQuery, ValidationError> {
        let mut preds = Self::city_scope(city, filter)?;
        preds.push(Predicate::AttrPresent {
            key: keys::DISTRICT,
        });

        let mut params = Vec::new();
        let where_clause = render_all(&preds, &mut params);
        let district = attr_text(keys::DISTRICT);
        let sql = format!(
            "SELECT {district} AS district, COUNT(*) AS count \
             FROM places WHERE {where_clause} GROUP BY 1 ORDER BY 1"
        );
        Ok(CompiledQuery { sql, params })
    }

    /// First non-null `city_name` among the rows matching the district query.
    ///
    /// Which row wins among several with differing names is unspecified.
    pub fn city_display_name(
        city: &str,
        filter: &FilterSpec,
    ) -> Result<CompiledQuery, ValidationError> {
        let mut preds = Self::city_scope(city, filter)?;
        preds.push(Predicate::AttrPresent {
            key: keys::CITY_NAME,
        });

        let mut params = Vec::new();
        let where_clause = render_all(&preds, &mut params);
        let sql = format!(
            "SELECT {} AS city_name FROM places WHERE {where_clause} LIMIT 1",
            attr_text(keys::CITY_NAME)
        );
        Ok(CompiledQuery { sql, params })
    }

    /// The city is matched exactly as given, the same as `FilterSpec::city`.
    fn city_scope(city: &str, filter: &FilterSpec) -> Result<Vec<Predicate>, ValidationError> {
        if city.trim().is_empty() {
            return Err(ValidationError::MissingParameter("city"));
        }
        let mut preds = Vec::new();
        preds.extend(QueryCompiler::freshness(filter));
        preds.extend(QueryCompiler::categories(filter));
        preds.push(QueryCompiler::city(city));
        Ok(preds)
    }
}
