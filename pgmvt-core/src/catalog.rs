//! Index of geometry tables discovered by introspecting the database once at startup.

use std::collections::{BTreeMap, HashMap};

use deadpool_postgres::tokio_postgres::Row;
use serde::{Deserialize, Serialize};
use tilejson::Bounds;
use tracing::{debug, info, warn};

use crate::PgMvtCoreError::PostgresError;
use crate::{PgMvtCoreResult, PgPool};

pub type InfoMap<T> = BTreeMap<String, T>;

/// One geometry column of a table or view.
///
/// Serialized as the catalog entry returned by the `/tables.json` and `/table/{id}.json` endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    /// `<schema>.<table>`
    pub id: String,
    pub schema: String,
    pub table: String,
    pub geometry_column: String,
    pub geometry_srid: i32,
    pub geometry_type: String,
    /// Every column of the relation mapped to its `PostgreSQL` type name
    pub properties: InfoMap<String>,
    /// Estimated extent in WGS84
    pub bounds: Bounds,
    /// Single-column primary key, used for feature ordering
    #[serde(skip)]
    pub primary_key: Option<String>,
    /// `PostgreSQL` type name of the primary key
    #[serde(skip)]
    pub primary_key_type: Option<String>,
    #[serde(skip)]
    pub is_view: bool,
}

impl TableInfo {
    /// Primary key usable as the MVT feature id, i.e. one with an integer type.
    #[must_use]
    pub fn feature_id_column(&self) -> Option<&str> {
        match self.primary_key_type.as_deref() {
            Some("int2" | "int4" | "int8") => self.primary_key.as_deref(),
            _ => None,
        }
    }

    fn from_row(row: &Row) -> Self {
        let schema: String = row.get("schema");
        let table: String = row.get("name");
        let names: Vec<String> = row.get("column_names");
        let types: Vec<String> = row.get("column_types");
        Self {
            id: format!("{schema}.{table}"),
            schema,
            table,
            geometry_column: row.get("geom"),
            geometry_srid: row.get("srid"),
            geometry_type: row.get("type"),
            properties: names.into_iter().zip(types).collect(),
            bounds: Bounds::new(
                row.get("xmin"),
                row.get("ymin"),
                row.get("xmax"),
                row.get("ymax"),
            ),
            primary_key: row.get("pk_column"),
            primary_key_type: row.get("pk_type"),
            is_view: row.get("is_view"),
        }
    }
}

/// Immutable snapshot of all queryable geometry tables, ordered by id.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: Vec<TableInfo>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Introspect the database with a single query.
    ///
    /// Any database error is returned as is: the catalog is either complete or not built at all.
    pub async fn build(pool: &PgPool) -> PgMvtCoreResult<Self> {
        let rows = pool
            .get()
            .await?
            .query(include_str!("scripts/query_available_tables.sql"), &[])
            .await
            .map_err(|e| PostgresError(e, "querying available tables"))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let info = TableInfo::from_row(row);
            if info.geometry_srid == 0 {
                warn!(
                    "Skipping {} because column {} has SRID 0 and cannot be reprojected",
                    info.id, info.geometry_column
                );
                continue;
            }
            debug!(
                "Discovered {} ({} {}, SRID {})",
                info.id, info.geometry_column, info.geometry_type, info.geometry_srid
            );
            tables.push(info);
        }

        let catalog = Self::from_tables(tables);
        info!("Discovered {} geometry tables in {}", catalog.len(), pool.get_id());
        Ok(catalog)
    }

    /// Create a catalog from already known tables.
    ///
    /// A table with several geometry columns is only served through the first one in name order.
    #[must_use]
    pub fn from_tables(mut tables: Vec<TableInfo>) -> Self {
        tables.sort_by(|a, b| {
            (&a.id, &a.geometry_column).cmp(&(&b.id, &b.geometry_column))
        });
        tables.dedup_by(|dup, kept| {
            let is_dup = dup.id == kept.id;
            if is_dup {
                warn!(
                    "Table {} has more than one geometry column, ignoring {}",
                    dup.id, dup.geometry_column
                );
            }
            is_dup
        });
        let index = tables
            .iter()
            .enumerate()
            .map(|(idx, t)| (t.id.clone(), idx))
            .collect();
        Self { tables, index }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TableInfo> {
        self.index.get(id).map(|&idx| &self.tables[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;

    pub fn roads() -> TableInfo {
        TableInfo {
            id: "public.roads".to_string(),
            schema: "public".to_string(),
            table: "roads".to_string(),
            geometry_column: "geom".to_string(),
            geometry_srid: 4326,
            geometry_type: "LINESTRING".to_string(),
            properties: InfoMap::from([
                ("geom".to_string(), "geometry".to_string()),
                ("gid".to_string(), "int4".to_string()),
                ("name".to_string(), "varchar".to_string()),
            ]),
            bounds: Bounds::new(-10.0, -10.0, 10.0, 10.0),
            primary_key: Some("gid".to_string()),
            primary_key_type: Some("int4".to_string()),
            is_view: false,
        }
    }

    #[test]
    fn catalog_entry_json() {
        assert_eq!(
            serde_json::to_value(roads()).unwrap(),
            json!({
                "id": "public.roads",
                "schema": "public",
                "table": "roads",
                "geometry_column": "geom",
                "geometry_srid": 4326,
                "geometry_type": "LINESTRING",
                "properties": {
                    "geom": "geometry",
                    "gid": "int4",
                    "name": "varchar"
                },
                "bounds": [-10.0, -10.0, 10.0, 10.0]
            })
        );
    }

    #[test]
    fn lookup_and_order() {
        let mut parks = roads();
        parks.id = "other.parks".to_string();
        parks.schema = "other".to_string();
        parks.table = "parks".to_string();

        let catalog = Catalog::from_tables(vec![roads(), parks.clone()]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            ["other.parks", "public.roads"]
        );
        assert_eq!(catalog.get("other.parks"), Some(&parks));
        assert_eq!(catalog.get("public.roads"), Some(&roads()));
        assert!(catalog.get("public.parks").is_none());
    }

    #[test]
    fn duplicate_geometry_columns() {
        let mut second = roads();
        second.geometry_column = "centroid".to_string();
        let catalog = Catalog::from_tables(vec![roads(), second]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get("public.roads").unwrap().geometry_column,
            "centroid"
        );
    }

    #[test]
    fn feature_id_requires_integer_key() {
        let mut table = roads();
        assert_eq!(table.feature_id_column(), Some("gid"));
        table.primary_key_type = Some("uuid".to_string());
        assert_eq!(table.feature_id_column(), None);
        table.primary_key = None;
        table.primary_key_type = None;
        assert_eq!(table.feature_id_column(), None);
    }
}
