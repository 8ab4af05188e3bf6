//! Admin CRUD over catalog tables.
//!
//! Incoming values are coerced to the column's storage kind. Price-like
//! strings in numeric columns are normalized with [`parse_price`] so the
//! database only ever holds numbers in range fields.

use db::models::catalog::{CatalogTable, ColumnKind, row_to_json};
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{info, warn};

use super::{
    catalog_query::{CatalogItem, CatalogQueryError, log_failure, quote_ident},
    price::parse_price,
};

#[derive(Debug, Clone, PartialEq)]
enum CellValue {
    Null,
    Text(String),
    Real(f64),
    Integer(i64),
}

fn coerce(field: &str, kind: ColumnKind, value: &Value) -> Result<CellValue, CatalogQueryError> {
    let invalid = || CatalogQueryError::InvalidColumnValue(field.to_string());
    match (kind, value) {
        (_, Value::Null) => Ok(CellValue::Null),
        (ColumnKind::Text, Value::String(s)) => Ok(CellValue::Text(s.clone())),
        (ColumnKind::Text, Value::Number(n)) => Ok(CellValue::Text(n.to_string())),
        (ColumnKind::Text, Value::Bool(b)) => Ok(CellValue::Text(b.to_string())),
        (ColumnKind::Real, Value::Number(n)) => n.as_f64().map(CellValue::Real).ok_or_else(invalid),
        (ColumnKind::Real, Value::String(s)) if s.trim().is_empty() => Ok(CellValue::Null),
        (ColumnKind::Real, Value::String(s)) => parse_price(s).map(CellValue::Real).ok_or_else(invalid),
        (ColumnKind::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(CellValue::Integer)
            .ok_or_else(invalid),
        (ColumnKind::Integer, Value::String(s)) if s.trim().is_empty() => Ok(CellValue::Null),
        (ColumnKind::Integer, Value::String(s)) => {
            s.trim().parse().map(CellValue::Integer).map_err(|_| invalid())
        }
        (ColumnKind::Integer, Value::Bool(b)) => Ok(CellValue::Integer(i64::from(*b))),
        _ => Err(invalid()),
    }
}

/// Validated `(column, value)` pairs in table column order. The id column is
/// never written.
fn writable_values(
    table: &CatalogTable,
    values: &Map<String, Value>,
) -> Result<Vec<(&'static str, CellValue)>, CatalogQueryError> {
    for key in values.keys() {
        if key != CatalogTable::ID_COLUMN && table.column(key).is_none() {
            return Err(CatalogQueryError::UnknownField {
                table: table.name.to_string(),
                field: key.clone(),
            });
        }
    }

    let cells = table
        .columns
        .iter()
        .filter_map(|column| {
            values
                .get(column.name)
                .map(|value| coerce(column.name, column.kind, value).map(|cell| (column.name, cell)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if cells.is_empty() {
        return Err(CatalogQueryError::EmptyWrite);
    }
    Ok(cells)
}

fn push_cell(qb: &mut QueryBuilder<'_, Sqlite>, cell: CellValue) {
    match cell {
        CellValue::Null => qb.push("NULL"),
        CellValue::Text(s) => qb.push_bind(s),
        CellValue::Real(f) => qb.push_bind(f),
        CellValue::Integer(i) => qb.push_bind(i),
    };
}

pub async fn get_item(
    pool: &SqlitePool,
    table: &CatalogTable,
    id: i64,
) -> Result<Option<CatalogItem>, CatalogQueryError> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT * FROM {} WHERE {} = ",
        quote_ident(table.name),
        quote_ident(CatalogTable::ID_COLUMN)
    ));
    qb.push_bind(id);
    let row = qb
        .build()
        .fetch_optional(pool)
        .await
        .map_err(|e| log_failure(table.name, e))?;
    Ok(row.as_ref().map(row_to_json))
}

pub async fn create_item(
    pool: &SqlitePool,
    table: &CatalogTable,
    values: &Map<String, Value>,
) -> Result<CatalogItem, CatalogQueryError> {
    let cells = writable_values(table, values)?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} (", quote_ident(table.name)));
    let columns: Vec<String> = cells.iter().map(|(name, _)| quote_ident(name)).collect();
    qb.push(columns.join(", "));
    qb.push(") VALUES (");
    for (index, (_, cell)) in cells.into_iter().enumerate() {
        if index > 0 {
            qb.push(", ");
        }
        push_cell(&mut qb, cell);
    }
    qb.push(") RETURNING *");

    let row = qb
        .build()
        .fetch_one(pool)
        .await
        .map_err(|e| log_failure(table.name, e))?;
    let item = row_to_json(&row);
    info!(table = table.name, id = ?item.get("id"), "Catalog item created");
    Ok(item)
}

/// Partial update; returns `None` when no row has the id.
pub async fn update_item(
    pool: &SqlitePool,
    table: &CatalogTable,
    id: i64,
    values: &Map<String, Value>,
) -> Result<Option<CatalogItem>, CatalogQueryError> {
    let cells = writable_values(table, values)?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", quote_ident(table.name)));
    for (index, (name, cell)) in cells.into_iter().enumerate() {
        if index > 0 {
            qb.push(", ");
        }
        qb.push(format!("{} = ", quote_ident(name)));
        push_cell(&mut qb, cell);
    }
    qb.push(format!(" WHERE {} = ", quote_ident(CatalogTable::ID_COLUMN)));
    qb.push_bind(id);
    qb.push(" RETURNING *");

    let row = qb
        .build()
        .fetch_optional(pool)
        .await
        .map_err(|e| log_failure(table.name, e))?;
    match row {
        Some(row) => {
            info!(table = table.name, id, "Catalog item updated");
            Ok(Some(row_to_json(&row)))
        }
        None => {
            warn!(table = table.name, id, "Catalog item not found for update");
            Ok(None)
        }
    }
}

/// Returns whether a row was deleted.
pub async fn delete_item(
    pool: &SqlitePool,
    table: &CatalogTable,
    id: i64,
) -> Result<bool, CatalogQueryError> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "DELETE FROM {} WHERE {} = ",
        quote_ident(table.name),
        quote_ident(CatalogTable::ID_COLUMN)
    ));
    qb.push_bind(id);
    let result = qb
        .build()
        .execute(pool)
        .await
        .map_err(|e| log_failure(table.name, e))?;
    let deleted = result.rows_affected() > 0;
    if deleted {
        info!(table = table.name, id, "Catalog item deleted");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use db::DBService;
    use serde_json::json;

    use super::*;
    use crate::services::catalog_query::resolve_table;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_price_strings_are_normalized_for_real_columns() {
        assert_eq!(
            coerce("price", ColumnKind::Real, &json!("€1.234,56")).unwrap(),
            CellValue::Real(1234.56)
        );
        assert_eq!(
            coerce("cycles", ColumnKind::Integer, &json!("6000")).unwrap(),
            CellValue::Integer(6000)
        );
        assert!(coerce("price", ColumnKind::Real, &json!("op aanvraag")).is_err());
        assert!(coerce("phases", ColumnKind::Integer, &json!(1.5)).is_err());
    }

    #[tokio::test]
    async fn test_create_update_delete_round() {
        let db = DBService::new_in_memory().await.unwrap();
        let batteries = resolve_table("batteries").unwrap();

        let created = create_item(
            &db.pool,
            batteries,
            &object(json!({
                "brand": "Sessy",
                "model": "5 kWh",
                "chemistry": "LFP",
                "capacity_kwh": 5,
                "price": "€ 3.495"
            })),
        )
        .await
        .unwrap();
        assert_eq!(created["price"], 3495.0);
        let id = created["id"].as_i64().unwrap();

        let updated = update_item(&db.pool, batteries, id, &object(json!({ "price": 3295 })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["price"], 3295.0);
        assert_eq!(updated["brand"], "Sessy");

        let fetched = get_item(&db.pool, batteries, id).await.unwrap().unwrap();
        assert_eq!(fetched, updated);

        assert!(delete_item(&db.pool, batteries, id).await.unwrap());
        assert!(!delete_item(&db.pool, batteries, id).await.unwrap());
        assert!(get_item(&db.pool, batteries, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_writes_reject_unknown_columns_and_empty_bodies() {
        let db = DBService::new_in_memory().await.unwrap();
        let panels = resolve_table("solar_panels").unwrap();

        let err = create_item(&db.pool, panels, &object(json!({ "colour": "black" })))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogQueryError::UnknownField { .. }));

        let err = update_item(&db.pool, panels, 1, &object(json!({ "id": 9 })))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogQueryError::EmptyWrite));

        let missing = update_item(&db.pool, panels, 9_999, &object(json!({ "price": 10 })))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_database_failures_surface_as_database_errors() {
        let db = DBService::new_in_memory().await.unwrap();
        let inverters = resolve_table("inverters").unwrap();
        db.pool.close().await;

        let body = object(json!({ "brand": "Fronius" }));
        assert!(matches!(
            get_item(&db.pool, inverters, 1).await,
            Err(CatalogQueryError::Database(_))
        ));
        assert!(matches!(
            create_item(&db.pool, inverters, &body).await,
            Err(CatalogQueryError::Database(_))
        ));
        assert!(matches!(
            update_item(&db.pool, inverters, 1, &body).await,
            Err(CatalogQueryError::Database(_))
        ));
        assert!(matches!(
            delete_item(&db.pool, inverters, 1).await,
            Err(CatalogQueryError::Database(_))
        ));
    }
}
