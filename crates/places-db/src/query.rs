//! Filter-to-SQL compilation.
//!
//! Filters are first lowered to a small predicate IR ([`Predicate`]) and then
//! rendered by a single function, [`render`]. Operand values only ever reach
//! the SQL text as `$n` placeholders: the renderer has no code path that
//! writes a value into the text. Property keys are compile-time constants
//! from `places_core::keys` and are emitted as quoted literals.
//!
//! Every rendered predicate evaluates to TRUE or FALSE, never NULL, so
//! predicates can be negated without surprises from missing attributes.

use places_core::encoding::{EncodingTest, Feature, ValueKind};
use places_core::{keys, Bbox, FilterSpec, ValidationError, DIAPER_TABLE, PARKING};

/// SRID of stored point geometries (WGS84).
pub const SRID: i32 = 4326;

/// Pattern a property's text form must match before it is cast to numeric.
const DECIMAL_PATTERN: &str = r"^-?[0-9]+(\.[0-9]+)?$";

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// Text parameter.
    Text(String),
    /// Double precision parameter.
    Float(f64),
    /// Bigint parameter.
    Int(i64),
}

/// Indexed scalar columns of the `places` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Category,
    City,
}

impl Column {
    fn as_sql(self) -> &'static str {
        match self {
            Column::Category => "category",
            Column::City => "city",
        }
    }
}

/// Predicate IR.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = $n`
    Eq { column: Column, value: QueryParam },
    /// `column IN ($n, $n+1, ...)`; an empty list matches nothing.
    In {
        column: Column,
        values: Vec<QueryParam>,
    },
    /// Property is absent or its text form differs from the value.
    AttrAbsentOrNe { key: &'static str, value: QueryParam },
    /// Property is present and not JSON null.
    AttrPresent { key: &'static str },
    /// Property's text form equals the value.
    AttrTextEq { key: &'static str, value: QueryParam },
    /// Property's text form is a decimal number greater than the value.
    AttrNumericGt { key: &'static str, value: QueryParam },
    /// Location lies inside the rectangle or on its boundary.
    WithinBbox(Bbox),
    /// Logical OR; an empty list matches nothing.
    Any(Vec<Predicate>),
    /// Logical NOT.
    Not(Box<Predicate>),
}

/// Query text plus parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

/// Quote a property key as a SQL string literal.
fn quote_key(key: &str) -> String {
    format!("'{}'", key.replace('\'', "''"))
}

/// `properties->>'key'`
pub fn attr_text(key: &str) -> String {
    format!("properties->>{}", quote_key(key))
}

fn placeholder(params: &mut Vec<QueryParam>, value: QueryParam) -> String {
    params.push(value);
    format!("${}", params.len())
}

/// Render a predicate, appending its operands to `params`.
///
/// Placeholders are numbered from `params.len() + 1`, so a caller that
/// already bound parameters can pass them in to continue the numbering.
pub fn render(predicate: &Predicate, params: &mut Vec<QueryParam>) -> String {
    match predicate {
        Predicate::Eq { column, value } => {
            format!("{} = {}", column.as_sql(), placeholder(params, value.clone()))
        }
        Predicate::In { column, values } => {
            if values.is_empty() {
                return "FALSE".to_string();
            }
            let list: Vec<String> = values
                .iter()
                .map(|v| placeholder(params, v.clone()))
                .collect();
            format!("{} IN ({})", column.as_sql(), list.join(", "))
        }
        Predicate::AttrAbsentOrNe { key, value } => {
            let attr = attr_text(key);
            format!(
                "({attr} IS NULL OR {attr} <> {})",
                placeholder(params, value.clone())
            )
        }
        Predicate::AttrPresent { key } => format!("{} IS NOT NULL", attr_text(key)),
        Predicate::AttrTextEq { key, value } => format!(
            "COALESCE({} = {}, FALSE)",
            attr_text(key),
            placeholder(params, value.clone())
        ),
        Predicate::AttrNumericGt { key, value } => {
            let attr = attr_text(key);
            format!(
                "(CASE WHEN {attr} ~ '{DECIMAL_PATTERN}' THEN ({attr})::numeric > {} ELSE FALSE END)",
                placeholder(params, value.clone())
            )
        }
        Predicate::WithinBbox(bbox) => {
            let bounds: Vec<String> = bbox
                .bounds()
                .into_iter()
                .map(|b| placeholder(params, QueryParam::Float(b)))
                .collect();
            format!(
                "ST_Intersects(location, ST_MakeEnvelope({}, {SRID}))",
                bounds.join(", ")
            )
        }
        Predicate::Any(preds) => {
            if preds.is_empty() {
                return "FALSE".to_string();
            }
            let parts: Vec<String> = preds.iter().map(|p| render(p, params)).collect();
            format!("({})", parts.join(" OR "))
        }
        Predicate::Not(inner) => format!("NOT ({})", render(inner, params)),
    }
}

/// Render a conjunction. An empty list renders as `TRUE`.
pub fn render_all(predicates: &[Predicate], params: &mut Vec<QueryParam>) -> String {
    if predicates.is_empty() {
        return "TRUE".to_string();
    }
    predicates
        .iter()
        .map(|p| render(p, params))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Lower a logical feature to an OR across its legacy encodings.
pub fn feature_predicate(feature: &Feature) -> Predicate {
    Predicate::Any(
        feature
            .encodings
            .iter()
            .map(|enc| match (enc.kind, enc.test) {
                (ValueKind::Number, EncodingTest::Positive) => Predicate::AttrNumericGt {
                    key: enc.key,
                    value: QueryParam::Int(0),
                },
                (ValueKind::Bool, EncodingTest::IsTrue) => Predicate::AttrTextEq {
                    key: enc.key,
                    value: QueryParam::Text("true".to_string()),
                },
                // Mismatched kind/test pairs never match.
                _ => Predicate::Any(Vec::new()),
            })
            .collect(),
    )
}

/// Compiles [`FilterSpec`]s into parameterized SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryCompiler;

impl QueryCompiler {
    /// Columns selected for a place row.
    pub const PLACE_COLUMNS: &'static str = "id, name, address, category, city, \
         ST_Y(location) AS lat, ST_X(location) AS lng, properties";

    /// Freshness: hide rows marked outdated unless asked not to.
    pub fn freshness(filter: &FilterSpec) -> Option<Predicate> {
        (!filter.include_outdated).then(|| Predicate::AttrAbsentOrNe {
            key: keys::DATA_STATUS,
            value: QueryParam::Text(keys::OUTDATED.to_string()),
        })
    }

    /// Category membership, one placeholder per category.
    pub fn categories(filter: &FilterSpec) -> Option<Predicate> {
        (!filter.categories.is_empty()).then(|| Predicate::In {
            column: Column::Category,
            values: filter
                .categories
                .iter()
                .map(|c| QueryParam::Text(c.clone()))
                .collect(),
        })
    }

    pub fn city(city: &str) -> Predicate {
        Predicate::Eq {
            column: Column::City,
            value: QueryParam::Text(city.to_string()),
        }
    }

    /// Freshness, category and city clauses, the part of a filter that
    /// aggregations honour.
    pub fn base_predicates(filter: &FilterSpec) -> Vec<Predicate> {
        let mut preds = Vec::new();
        preds.extend(Self::freshness(filter));
        preds.extend(Self::categories(filter));
        preds.extend(filter.city.as_deref().map(Self::city));
        preds
    }

    /// All clauses of a filter, in a fixed order.
    pub fn predicates(filter: &FilterSpec) -> Result<Vec<Predicate>, ValidationError> {
        let mut preds = Self::base_predicates(filter);

        if let Some(bbox) = filter.bbox {
            // Re-check: Bbox fields are public and may not have gone through parsing.
            let bbox = Bbox::new(bbox.min_lng, bbox.min_lat, bbox.max_lng, bbox.max_lat)?;
            preds.push(Predicate::WithinBbox(bbox));
        }

        for (requirement, feature) in [
            (filter.require_diaper_table, &DIAPER_TABLE),
            (filter.require_parking, &PARKING),
        ] {
            match requirement {
                Some(true) => preds.push(feature_predicate(feature)),
                Some(false) => preds.push(Predicate::Not(Box::new(feature_predicate(feature)))),
                None => {}
            }
        }

        Ok(preds)
    }

    /// Compile a place search.
    pub fn compile_search(filter: &FilterSpec) -> Result<CompiledQuery, ValidationError> {
        let preds = Self::predicates(filter)?;
        let mut params = Vec::new();
        let where_clause = render_all(&preds, &mut params);
        let sql = format!(
            "SELECT {} FROM places WHERE {} ORDER BY id",
            Self::PLACE_COLUMNS,
            where_clause
        );
        Ok(CompiledQuery { sql, params })
    }
}
