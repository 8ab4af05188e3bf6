//! Catalog tables and dynamic row decoding.
//!
//! Catalog tables have heterogeneous columns, so rows travel as JSON objects
//! instead of per-table structs. Each table is described by a [`CatalogTable`]
//! that lists every column with its storage kind and which columns can be
//! searched, grouped or range-filtered.

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{Column, Row, TypeInfo, ValueRef, sqlite::SqliteRow};
use strum_macros::Display;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Real,
    Integer,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CatalogColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> CatalogColumn {
    CatalogColumn {
        name,
        kind: ColumnKind::Text,
    }
}

const fn real(name: &'static str) -> CatalogColumn {
    CatalogColumn {
        name,
        kind: ColumnKind::Real,
    }
}

const fn integer(name: &'static str) -> CatalogColumn {
    CatalogColumn {
        name,
        kind: ColumnKind::Integer,
    }
}

/// Static description of one catalog table.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CatalogTable {
    pub name: &'static str,
    pub label: &'static str,
    pub columns: &'static [CatalogColumn],
    pub searchable: &'static [&'static str],
    pub filterable: &'static [&'static str],
    pub range_filterable: &'static [&'static str],
    pub default_sort: &'static str,
}

impl CatalogTable {
    pub const ID_COLUMN: &'static str = "id";

    pub fn column(&self, name: &str) -> Option<&CatalogColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        name == Self::ID_COLUMN || self.column(name).is_some()
    }
}

pub const CATALOG_TABLES: &[CatalogTable] = &[
    CatalogTable {
        name: "heat_pumps",
        label: "Warmtepompen",
        columns: &[
            text("brand"),
            text("model"),
            text("description"),
            text("image_url"),
            text("pump_type"),
            real("power_kw"),
            real("scop"),
            real("noise_db"),
            text("energy_label"),
            real("price"),
        ],
        searchable: &["brand", "model", "description"],
        filterable: &["brand", "pump_type", "energy_label"],
        range_filterable: &["price", "power_kw", "scop"],
        default_sort: "brand",
    },
    CatalogTable {
        name: "solar_panels",
        label: "Zonnepanelen",
        columns: &[
            text("brand"),
            text("model"),
            text("description"),
            text("image_url"),
            text("panel_type"),
            real("wattage_wp"),
            real("efficiency"),
            integer("warranty_years"),
            real("price"),
        ],
        searchable: &["brand", "model", "description"],
        filterable: &["brand", "panel_type"],
        range_filterable: &["price", "wattage_wp", "efficiency"],
        default_sort: "brand",
    },
    CatalogTable {
        name: "batteries",
        label: "Thuisbatterijen",
        columns: &[
            text("brand"),
            text("model"),
            text("description"),
            text("image_url"),
            text("chemistry"),
            real("capacity_kwh"),
            real("power_kw"),
            integer("cycles"),
            real("price"),
        ],
        searchable: &["brand", "model", "description"],
        filterable: &["brand", "chemistry"],
        range_filterable: &["price", "capacity_kwh"],
        default_sort: "brand",
    },
    CatalogTable {
        name: "inverters",
        label: "Omvormers",
        columns: &[
            text("brand"),
            text("model"),
            text("description"),
            text("image_url"),
            text("inverter_type"),
            real("power_kw"),
            real("efficiency"),
            integer("phases"),
            real("price"),
        ],
        searchable: &["brand", "model", "description"],
        filterable: &["brand", "inverter_type", "phases"],
        range_filterable: &["price", "power_kw"],
        default_sort: "brand",
    },
    CatalogTable {
        name: "airco_units",
        label: "Airco's",
        columns: &[
            text("brand"),
            text("model"),
            text("description"),
            text("image_url"),
            text("unit_type"),
            real("cooling_kw"),
            real("seer"),
            real("noise_db"),
            text("energy_label"),
            real("price"),
        ],
        searchable: &["brand", "model", "description"],
        filterable: &["brand", "unit_type", "energy_label"],
        range_filterable: &["price", "cooling_kw", "seer"],
        default_sort: "brand",
    },
];

pub fn catalog_table(name: &str) -> Option<&'static CatalogTable> {
    CATALOG_TABLES.iter().find(|t| t.name == name)
}

/// Decode a row of any catalog table into a JSON object keyed by column name.
pub fn row_to_json(row: &SqliteRow) -> Map<String, Value> {
    let mut object = Map::with_capacity(row.columns().len());
    for column in row.columns() {
        let index = column.ordinal();
        object.insert(column.name().to_string(), column_value(row, index));
    }
    object
}

fn column_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" | "NUMERIC" => row
            .try_get_unchecked::<f64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        _ => row
            .try_get_unchecked::<String, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[test]
    fn test_every_listed_field_is_a_column() {
        for table in CATALOG_TABLES {
            for field in table
                .searchable
                .iter()
                .chain(table.filterable)
                .chain(table.range_filterable)
                .chain(std::iter::once(&table.default_sort))
            {
                assert!(table.has_column(field), "{}.{field}", table.name);
            }
        }
    }

    #[tokio::test]
    async fn test_seeded_rows_decode_to_typed_json() {
        let db = DBService::new_in_memory().await.unwrap();
        let row = sqlx::query("SELECT * FROM batteries WHERE brand = 'Tesla'")
            .fetch_one(&db.pool)
            .await
            .unwrap();

        let object = row_to_json(&row);
        assert_eq!(object["brand"], "Tesla");
        assert_eq!(object["capacity_kwh"], 13.5);
        assert_eq!(object["cycles"], 6000);
        assert!(object["id"].is_i64());
    }
}
