//! Tile queries for catalog tables.

use deadpool_postgres::tokio_postgres::types::{ToSql, Type};
use pgmvt_tile_utils::{TileCoord, TileData, TileEnvelope};
use postgres_protocol::escape::{escape_identifier, escape_literal};
use tracing::debug;

use crate::PgMvtCoreError::QueryExecutionError;
use crate::PgMvtCoreResult;
use crate::cancel::CancelOnDrop;
use crate::catalog::TableInfo;
use crate::settings::TileSettings;

/// Types of `$1..$5`: the tile envelope and the SRID of the tile matrix set.
const PARAM_TYPES: &[Type] = &[
    Type::FLOAT8,
    Type::FLOAT8,
    Type::FLOAT8,
    Type::FLOAT8,
    Type::INT4,
];

/// Name of the geometry column in the generated tile rows.
const MVT_GEOM: &str = "geom";

/// Highest latitude a mercator SRID can represent, its y axis is infinite at the poles.
fn mercator_max_latitude(srid: i32) -> Option<f64> {
    match srid {
        3857 | 900_913 => Some(85.051_128_779_806_59),
        3395 => Some(85.084_059_155_6),
        _ => None,
    }
}

impl TableInfo {
    /// Columns copied into the tile as feature properties.
    pub fn tile_properties(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|(name, typ)| {
                *name != &self.geometry_column
                    && name.as_str() != MVT_GEOM
                    && !matches!(typ.as_str(), "geometry" | "geography")
            })
            .map(|(name, _)| name.as_str())
    }

    /// SQL producing the MVT of this table for the envelope bound as `$1..$4` in SRID `$5`.
    ///
    /// Identifiers come from the catalog and are always quoted. Only the tile settings and
    /// the native SRID are formatted into the text, all request dependent values are bound.
    #[must_use]
    pub fn tile_query(&self, settings: &TileSettings) -> String {
        let geometry_column = escape_identifier(&self.geometry_column);
        let schema = escape_identifier(&self.schema);
        let table = escape_identifier(&self.table);
        let layer_id = escape_literal(&self.id);
        let srid = self.geometry_srid;
        let TileSettings {
            extent,
            buffer,
            max_features,
            ..
        } = *settings;

        let properties = self
            .tile_properties()
            .map(|col| format!(",\n    t.{}", escape_identifier(col)))
            .collect::<String>();
        let id_name = self
            .feature_id_column()
            .filter(|id| self.tile_properties().any(|col| col == *id))
            .map_or_else(String::new, |id| format!(", {}", escape_literal(id)));
        let order_by = match (&self.primary_key, self.is_view) {
            (Some(pk), _) => format!("\n  ORDER BY t.{}", escape_identifier(pk)),
            (None, false) => "\n  ORDER BY t.ctid".to_string(),
            // views have no ctid, order by everything that ends up in the tile
            (None, true) => {
                let columns = self
                    .tile_properties()
                    .map(|col| format!(", t.{}::text", escape_identifier(col)))
                    .collect::<String>();
                format!("\n  ORDER BY t.{geometry_column}::geometry{columns}")
            }
        };

        let tile_area = "ST_Segmentize(bounds.geom, (ST_XMax(bounds.geom) - ST_XMin(bounds.geom)) / 4)";
        let filter_area = match mercator_max_latitude(srid) {
            // tiles of other tile matrix sets may reach the poles
            Some(lat) => format!(
                "ST_Transform(ST_Intersection(ST_Transform({tile_area}, 4326), ST_MakeEnvelope(-180, -{lat}, 180, {lat}, 4326)), {srid})"
            ),
            None => format!("ST_Transform({tile_area}, {srid})"),
        };

        format!(
            r"
WITH bounds AS (
  SELECT ST_MakeEnvelope($1::double precision, $2::double precision, $3::double precision, $4::double precision, $5::integer) AS geom
)
SELECT
  ST_AsMVT(tile, {layer_id}, {extent}, '{MVT_GEOM}'{id_name})
FROM (
  SELECT
    ST_AsMVTGeom(
        ST_Transform(t.{geometry_column}::geometry, $5::integer),
        bounds.geom::box2d,
        {extent}, {buffer}, true
    ) AS {MVT_GEOM}{properties}
  FROM
    {schema}.{table} t, bounds
  WHERE
    t.{geometry_column} && {filter_area}{order_by}
  LIMIT {max_features}
) AS tile
"
        )
        .trim()
        .to_string()
    }

    pub(crate) async fn get_tile(
        &self,
        settings: &TileSettings,
        mut conn: CancelOnDrop,
        xyz: TileCoord,
        envelope: &TileEnvelope,
    ) -> PgMvtCoreResult<TileData> {
        let query = self.tile_query(settings);
        let args: [&(dyn ToSql + Sync); 5] = [
            &envelope.xmin,
            &envelope.ymin,
            &envelope.xmax,
            &envelope.ymax,
            &envelope.srid,
        ];
        debug!("SQL: {query} [{xyz}, {envelope:?}]");

        let client = conn.client();
        let row = match client.prepare_typed_cached(&query, PARAM_TYPES).await {
            Ok(stmt) => client.query_opt(&stmt, &args).await,
            Err(e) => Err(e),
        };
        conn.release();

        Ok(row
            .map_err(|e| QueryExecutionError(e, self.id.clone(), xyz))?
            .and_then(|r| r.get::<_, Option<TileData>>(0))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::catalog::tests::roads;

    #[test]
    fn table_with_integer_key() {
        assert_eq!(
            roads().tile_query(&TileSettings::default()),
            indoc! {r#"
                WITH bounds AS (
                  SELECT ST_MakeEnvelope($1::double precision, $2::double precision, $3::double precision, $4::double precision, $5::integer) AS geom
                )
                SELECT
                  ST_AsMVT(tile, 'public.roads', 4096, 'geom', 'gid')
                FROM (
                  SELECT
                    ST_AsMVTGeom(
                        ST_Transform(t."geom"::geometry, $5::integer),
                        bounds.geom::box2d,
                        4096, 256, true
                    ) AS geom,
                    t."gid",
                    t."name"
                  FROM
                    "public"."roads" t, bounds
                  WHERE
                    t."geom" && ST_Transform(ST_Segmentize(bounds.geom, (ST_XMax(bounds.geom) - ST_XMin(bounds.geom)) / 4), 4326)
                  ORDER BY t."gid"
                  LIMIT 10000
                ) AS tile"#}
        );
    }

    #[test]
    fn settings_and_quoting() {
        let mut table = roads();
        table.schema = "My Schema".to_string();
        table.table = r#"we"ird"#.to_string();
        table.id = format!("{}.{}", table.schema, table.table);
        table.geometry_column = "the_geom".to_string();
        table.geometry_srid = 3857;
        table.properties = [
            ("the_geom", "geometry"),
            ("geom", "geometry"),
            ("shape", "geography"),
            ("label", "text"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        table.primary_key = None;
        table.primary_key_type = None;

        let settings = TileSettings {
            extent: 512,
            buffer: 16,
            max_features: 50,
            ..TileSettings::default()
        };
        assert_eq!(
            table.tile_query(&settings),
            indoc! {r#"
                WITH bounds AS (
                  SELECT ST_MakeEnvelope($1::double precision, $2::double precision, $3::double precision, $4::double precision, $5::integer) AS geom
                )
                SELECT
                  ST_AsMVT(tile, 'My Schema.we"ird', 512, 'geom')
                FROM (
                  SELECT
                    ST_AsMVTGeom(
                        ST_Transform(t."the_geom"::geometry, $5::integer),
                        bounds.geom::box2d,
                        512, 16, true
                    ) AS geom,
                    t."label"
                  FROM
                    "My Schema"."we""ird" t, bounds
                  WHERE
                    t."the_geom" && ST_Transform(ST_Intersection(ST_Transform(ST_Segmentize(bounds.geom, (ST_XMax(bounds.geom) - ST_XMin(bounds.geom)) / 4), 4326), ST_MakeEnvelope(-180, -85.05112877980659, 180, 85.05112877980659, 4326)), 3857)
                  ORDER BY t.ctid
                  LIMIT 50
                ) AS tile"#}
        );
    }

    #[test]
    fn view_without_key_orders_by_content() {
        let mut view = roads();
        view.is_view = true;
        view.primary_key = None;
        view.primary_key_type = None;
        let query = view.tile_query(&TileSettings::default());
        assert!(
            query.ends_with(indoc! {r#"
                ORDER BY t."geom"::geometry, t."gid"::text, t."name"::text
                  LIMIT 10000
                ) AS tile"#}),
            "{query}"
        );
        assert!(query.contains("ST_AsMVT(tile, 'public.roads', 4096, 'geom')"));
    }

    #[test]
    fn view_with_key_orders_by_key() {
        let mut view = roads();
        view.is_view = true;
        let query = view.tile_query(&TileSettings::default());
        assert!(query.contains("ORDER BY t.\"gid\"\n  LIMIT"), "{query}");
    }

    #[rstest]
    #[case::web_mercator(3857, Some("85.05112877980659"))]
    #[case::world_mercator(3395, Some("85.0840591556"))]
    #[case::wgs84(4326, None)]
    #[case::laea(3035, None)]
    fn filter_is_clipped_for_mercator(#[case] srid: i32, #[case] max_lat: Option<&str>) {
        let mut table = roads();
        table.geometry_srid = srid;
        let query = table.tile_query(&TileSettings::default());
        match max_lat {
            Some(lat) => assert!(
                query.contains(&format!(
                    "ST_MakeEnvelope(-180, -{lat}, 180, {lat}, 4326)), {srid})"
                )),
                "{query}"
            ),
            None => assert!(!query.contains("ST_Intersection"), "{query}"),
        }
    }

    #[test]
    fn injection_attempts_stay_quoted() {
        let mut table = roads();
        table.table = "roads; DROP TABLE roads; --".to_string();
        table.id = format!("public.{}", table.table);
        let query = table.tile_query(&TileSettings::default());
        assert!(query.contains(r#""public"."roads; DROP TABLE roads; --" t"#));
        assert!(query.contains("'public.roads; DROP TABLE roads; --'"));
    }
}
