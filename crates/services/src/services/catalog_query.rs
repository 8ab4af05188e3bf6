//! Paginated, filterable catalog queries.
//!
//! A [`CatalogQuery`] is turned into a list of [`Predicate`]s which are pushed
//! into `sqlx::QueryBuilder`s for the count, the page and the filter metadata.
//! Filter metadata only uses the search predicate, so range bounds stay put
//! while the user drags a slider over the same field.

use std::collections::BTreeMap;

use db::models::catalog::{CatalogTable, catalog_table, row_to_json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;
use tracing::{debug, error};
use ts_rs::TS;

use super::price::{price_value, step_for_span};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum CatalogQueryError {
    #[error("unknown catalog table: {0}")]
    UnknownTable(String),
    #[error("unknown field `{field}` for table {table}")]
    UnknownField { table: String, field: String },
    #[error("invalid value for filter `{field}`: {value}")]
    InvalidFilterValue { field: String, value: String },
    #[error("invalid value for column `{0}`")]
    InvalidColumnValue(String),
    #[error("no columns to write")]
    EmptyWrite,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type CatalogItem = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FilterValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::List(_) => None,
        }
    }
}

/// Field name (optionally suffixed `_min`/`_max`) to filter value.
pub type CatalogFilters = BTreeMap<String, FilterValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub filters: CatalogFilters,
    pub sort_by: Option<String>,
    pub sort_dir: SortDirection,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            search: None,
            filters: CatalogFilters::new(),
            sort_by: None,
            sort_dir: SortDirection::Asc,
        }
    }
}

impl CatalogQuery {
    /// Build a query from raw query-string pairs. Every non-reserved key is a
    /// filter; repeated keys become a list.
    pub fn from_params(params: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (key, value) in params {
            match key.as_str() {
                "page" => query.page = value.trim().parse().unwrap_or(1),
                "limit" => query.limit = value.trim().parse().unwrap_or(DEFAULT_PAGE_SIZE),
                "search" => {
                    query.search = Some(value.trim().to_string()).filter(|s| !s.is_empty())
                }
                "sort" | "sort_by" => query.sort_by = Some(value).filter(|s| !s.is_empty()),
                "dir" | "sort_dir" => {
                    query.sort_dir = if value.eq_ignore_ascii_case("desc") {
                        SortDirection::Desc
                    } else {
                        SortDirection::Asc
                    }
                }
                _ if value.is_empty() => {}
                _ => grouped.entry(key).or_default().push(value),
            }
        }

        for (key, mut values) in grouped {
            let value = if values.len() == 1 {
                FilterValue::Text(values.remove(0))
            } else {
                FilterValue::List(values)
            };
            query.filters.insert(key, value);
        }
        query
    }

    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        self
    }
}

/// Quote an identifier for SQLite, doubling embedded quotes. Column names
/// with `/`, spaces or `-` are only valid this way.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive substring match over any of the fields.
    Search { fields: Vec<String>, term: String },
    Eq { field: String, value: String },
    In { field: String, values: Vec<String> },
    Gte { field: String, value: f64 },
    Lte { field: String, value: f64 },
}

fn unknown_field(table: &CatalogTable, field: &str) -> CatalogQueryError {
    CatalogQueryError::UnknownField {
        table: table.name.to_string(),
        field: field.to_string(),
    }
}

pub fn search_predicate(table: &CatalogTable, search: Option<&str>) -> Option<Predicate> {
    let term = search.map(str::trim).filter(|s| !s.is_empty())?;
    if table.searchable.is_empty() {
        return None;
    }
    Some(Predicate::Search {
        fields: table.searchable.iter().map(|f| f.to_string()).collect(),
        term: term.to_lowercase(),
    })
}

/// Translate filters into predicates, rejecting fields the table lacks.
pub fn filter_predicates(
    table: &CatalogTable,
    filters: &CatalogFilters,
) -> Result<Vec<Predicate>, CatalogQueryError> {
    let mut predicates = Vec::with_capacity(filters.len());

    for (key, value) in filters {
        let range = key
            .strip_suffix("_min")
            .map(|base| (base, true))
            .or_else(|| key.strip_suffix("_max").map(|base| (base, false)));

        if let Some((base, is_min)) = range {
            if !table.has_column(base) {
                return Err(unknown_field(table, key));
            }
            let number = value
                .as_number()
                .ok_or_else(|| CatalogQueryError::InvalidFilterValue {
                    field: key.clone(),
                    value: format!("{value:?}"),
                })?;
            let field = base.to_string();
            predicates.push(if is_min {
                Predicate::Gte { field, value: number }
            } else {
                Predicate::Lte { field, value: number }
            });
            continue;
        }

        if !table.has_column(key) {
            return Err(unknown_field(table, key));
        }
        match value {
            FilterValue::List(values) if values.is_empty() => {}
            FilterValue::List(values) => predicates.push(Predicate::In {
                field: key.clone(),
                values: values.clone(),
            }),
            FilterValue::Text(text) => predicates.push(Predicate::Eq {
                field: key.clone(),
                value: text.clone(),
            }),
            FilterValue::Number(number) => predicates.push(Predicate::Eq {
                field: key.clone(),
                value: number.to_string(),
            }),
        }
    }
    Ok(predicates)
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Append `WHERE ... AND ...` for the predicates, if any.
pub fn push_where(qb: &mut QueryBuilder<'_, Sqlite>, predicates: &[Predicate]) {
    for (index, predicate) in predicates.iter().enumerate() {
        qb.push(if index == 0 { " WHERE " } else { " AND " });
        match predicate {
            Predicate::Search { fields, term } => {
                let pattern = format!("%{}%", escape_like(term));
                qb.push("(");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    qb.push(format!("LOWER({}) LIKE ", quote_ident(field)));
                    qb.push_bind(pattern.clone());
                    qb.push(" ESCAPE '\\'");
                }
                qb.push(")");
            }
            Predicate::Eq { field, value } => {
                qb.push(format!("{} = ", quote_ident(field)));
                qb.push_bind(value.clone());
            }
            Predicate::In { field, values } => {
                qb.push(format!("{} IN (", quote_ident(field)));
                let mut separated = qb.separated(", ");
                for value in values {
                    separated.push_bind(value.clone());
                }
                separated.push_unseparated(")");
            }
            Predicate::Gte { field, value } => {
                qb.push(format!("{} >= ", quote_ident(field)));
                qb.push_bind(*value);
            }
            Predicate::Lte { field, value } => {
                qb.push(format!("{} <= ", quote_ident(field)));
                qb.push_bind(*value);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total.div_ceil(u64::from(limit)) as u32;
        Self {
            page: page.max(1),
            limit,
            total,
            total_pages,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ValueCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldMetadata {
    Categorical { values: Vec<ValueCount> },
    Range { min: f64, max: f64, step: f64 },
}

pub type FilterMetadata = BTreeMap<String, FieldMetadata>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
    pub filters: FilterMetadata,
}

fn order_clause(
    table: &CatalogTable,
    sort_by: Option<&str>,
    dir: SortDirection,
) -> Result<String, CatalogQueryError> {
    let field = sort_by.unwrap_or(table.default_sort);
    if !table.has_column(field) {
        return Err(unknown_field(table, field));
    }
    Ok(format!(
        " ORDER BY {} {}, {} ASC",
        quote_ident(field),
        dir.sql(),
        quote_ident(CatalogTable::ID_COLUMN)
    ))
}

pub(super) fn log_failure(table: &str, e: sqlx::Error) -> CatalogQueryError {
    error!(table, error = %e, "Catalog query failed");
    CatalogQueryError::Database(e)
}

pub fn resolve_table(name: &str) -> Result<&'static CatalogTable, CatalogQueryError> {
    catalog_table(name).ok_or_else(|| CatalogQueryError::UnknownTable(name.to_string()))
}

fn query_predicates(
    table: &CatalogTable,
    query: &CatalogQuery,
) -> Result<(Option<Predicate>, Vec<Predicate>), CatalogQueryError> {
    let search = search_predicate(table, query.search.as_deref());
    let mut predicates: Vec<Predicate> = search.iter().cloned().collect();
    predicates.extend(filter_predicates(table, &query.filters)?);
    Ok((search, predicates))
}

async fn fetch_rows(
    pool: &SqlitePool,
    table: &CatalogTable,
    query: &CatalogQuery,
    predicates: &[Predicate],
    offset: u64,
) -> Result<Vec<CatalogItem>, CatalogQueryError> {
    let order = order_clause(table, query.sort_by.as_deref(), query.sort_dir)?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {}", quote_ident(table.name)));
    push_where(&mut qb, predicates);
    qb.push(order);
    qb.push(" LIMIT ");
    qb.push_bind(i64::from(query.limit));
    qb.push(" OFFSET ");
    qb.push_bind(offset as i64);

    let rows = qb
        .build()
        .fetch_all(pool)
        .await
        .map_err(|e| log_failure(table.name, e))?;
    Ok(rows.iter().map(row_to_json).collect())
}

/// Items of the requested page only, without count or metadata.
pub async fn fetch_items(
    pool: &SqlitePool,
    table: &CatalogTable,
    query: &CatalogQuery,
) -> Result<Vec<CatalogItem>, CatalogQueryError> {
    let query = query.clone().normalized();
    let (_, predicates) = query_predicates(table, &query)?;
    let offset = Pagination::new(query.page, query.limit, 0).offset();
    fetch_rows(pool, table, &query, &predicates, offset).await
}

/// Run a catalog query: one page of items, the exact total and the filter
/// metadata of the search-matched rows.
pub async fn fetch_page(
    pool: &SqlitePool,
    table: &CatalogTable,
    query: &CatalogQuery,
) -> Result<PaginatedResponse<CatalogItem>, CatalogQueryError> {
    let query = query.clone().normalized();
    let (search, predicates) = query_predicates(table, &query)?;

    let mut count = QueryBuilder::<Sqlite>::new(format!(
        "SELECT COUNT(*) FROM {}",
        quote_ident(table.name)
    ));
    push_where(&mut count, &predicates);
    let total: i64 = count
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await
        .map_err(|e| log_failure(table.name, e))?;

    let pagination = Pagination::new(query.page, query.limit, total.max(0) as u64);
    let items = fetch_rows(pool, table, &query, &predicates, pagination.offset()).await?;
    let filters = filter_metadata(pool, table, search.as_ref()).await?;

    debug!(
        table = table.name,
        page = pagination.page,
        total = pagination.total,
        "Catalog page fetched"
    );

    Ok(PaginatedResponse {
        items,
        pagination,
        filters,
    })
}

/// Metadata for every filterable field, computed over rows matching only the
/// search term.
pub async fn filter_metadata(
    pool: &SqlitePool,
    table: &CatalogTable,
    search: Option<&Predicate>,
) -> Result<FilterMetadata, CatalogQueryError> {
    let search: Vec<Predicate> = search.into_iter().cloned().collect();
    let mut metadata = FilterMetadata::new();

    for field in table.filterable {
        let column = quote_ident(field);
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {column} AS value, COUNT(*) AS count FROM {}",
            quote_ident(table.name)
        ));
        push_where(&mut qb, &search);
        qb.push(if search.is_empty() { " WHERE " } else { " AND " });
        qb.push(format!("{column} IS NOT NULL GROUP BY {column}"));

        let rows = qb
            .build()
            .fetch_all(pool)
            .await
            .map_err(|e| log_failure(table.name, e))?;
        let counts = rows
            .iter()
            .map(row_to_json)
            .map(|row| ValueCount {
                value: match row.get("value") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                },
                count: row.get("count").and_then(Value::as_u64).unwrap_or(0),
            })
            .collect();
        metadata.insert(
            field.to_string(),
            FieldMetadata::Categorical {
                values: sort_counts(counts),
            },
        );
    }

    for field in table.range_filterable {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} AS value FROM {}",
            quote_ident(field),
            quote_ident(table.name)
        ));
        push_where(&mut qb, &search);

        let rows = qb
            .build()
            .fetch_all(pool)
            .await
            .map_err(|e| log_failure(table.name, e))?;
        let values = rows
            .iter()
            .map(row_to_json)
            .filter_map(|row| row.get("value").and_then(price_value));
        if let Some(range) = range_metadata(values) {
            metadata.insert(field.to_string(), range);
        }
    }

    Ok(metadata)
}

/// Most frequent first, ties broken by value.
pub fn sort_counts(mut counts: Vec<ValueCount>) -> Vec<ValueCount> {
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    counts
}

pub fn range_metadata(values: impl IntoIterator<Item = f64>) -> Option<FieldMetadata> {
    let (min, max) = values.into_iter().fold(None, |acc: Option<(f64, f64)>, v| {
        Some(match acc {
            None => (v, v),
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
        })
    })?;
    Some(FieldMetadata::Range {
        min,
        max,
        step: step_for_span(max - min),
    })
}
