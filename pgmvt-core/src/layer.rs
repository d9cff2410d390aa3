//! Resolution of a requested layer id into a table or a function layer, and tile generation.

use pgmvt_tile_utils::{TileCoord, TileData, TileMatrixSet};
use tilejson::Bounds;
use tracing::debug;

use crate::PgMvtCoreError::{InvalidIdentifier, LayerNotFound};
use crate::cancel::CancelOnDrop;
use crate::catalog::{Catalog, TableInfo};
use crate::function::{FunctionInfo, UrlQuery};
use crate::registry::FunctionRegistry;
use crate::settings::TileSettings;
use crate::{PgMvtCoreResult, PgPool};

/// SRID assumed for function layers that do not declare one.
const FUNCTION_SRID_DEFAULT: i32 = 4326;

/// A resolved layer, borrowed from the catalog or the function registry for one request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Layer<'a> {
    Table(&'a TableInfo),
    Function(&'a FunctionInfo),
}

impl Layer<'_> {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Table(t) => &t.id,
            Self::Function(f) => &f.id,
        }
    }

    #[must_use]
    pub fn srid(&self) -> i32 {
        match self {
            Self::Table(t) => t.geometry_srid,
            Self::Function(f) => f.srid.unwrap_or(FUNCTION_SRID_DEFAULT),
        }
    }

    /// WGS84 bounds, the whole world when unknown.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Table(t) => t.bounds,
            Self::Function(f) => f.bounds.unwrap_or(Bounds::MAX),
        }
    }

    #[must_use]
    pub fn minzoom(&self) -> Option<u8> {
        match self {
            Self::Table(_) => None,
            Self::Function(f) => f.minzoom,
        }
    }

    #[must_use]
    pub fn maxzoom(&self) -> Option<u8> {
        match self {
            Self::Table(_) => None,
            Self::Function(f) => f.maxzoom,
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Table(_) => None,
            Self::Function(f) => f.description.as_deref(),
        }
    }

    /// Generate the MVT of one tile.
    ///
    /// `query` holds the function parameters and is ignored for tables.
    /// A zoom outside of `tms` is an error, while a tile outside of the tile matrix is returned
    /// empty without querying the database.
    pub async fn get_tile(
        &self,
        pool: &PgPool,
        xyz: TileCoord,
        tms: &TileMatrixSet,
        settings: &TileSettings,
        query: &UrlQuery,
    ) -> PgMvtCoreResult<TileData> {
        let params = match self {
            Self::Table(_) => Vec::new(),
            Self::Function(f) => f.bind_params(query)?,
        };
        let Some(envelope) = tms.envelope(xyz.z, xyz.x, xyz.y)? else {
            debug!(
                "Tile {xyz:#} is outside of {} matrix, returning an empty tile for {}",
                tms.id,
                self.id()
            );
            return Ok(TileData::new());
        };

        let conn = CancelOnDrop::new(pool.get().await?);
        match self {
            Self::Table(t) => t.get_tile(settings, conn, xyz, &envelope).await,
            Self::Function(f) => f.get_tile(conn, xyz, &envelope, &params).await,
        }
    }
}

/// Everything needed to turn a requested id into a [`Layer`].
///
/// Built once at startup and shared read-only by all requests.
#[derive(Clone, Debug, Default)]
pub struct LayerResolver {
    catalog: Catalog,
    registry: FunctionRegistry,
}

impl LayerResolver {
    #[must_use]
    pub fn new(catalog: Catalog, registry: FunctionRegistry) -> Self {
        Self { catalog, registry }
    }

    /// Registered functions take precedence. Anything else must be `<schema>.<table>`,
    /// split on the first dot, and present in the catalog under exactly that id.
    pub fn resolve(&self, id: &str) -> PgMvtCoreResult<Layer<'_>> {
        if let Some(func) = self.registry.get(id) {
            return Ok(Layer::Function(func));
        }
        match id.split_once('.') {
            Some((schema, table)) if !schema.is_empty() && !table.is_empty() => {}
            _ => return Err(InvalidIdentifier(id.to_string())),
        }
        self.catalog
            .get(id)
            .map(Layer::Table)
            .ok_or_else(|| LayerNotFound(id.to_string()))
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::PgMvtCoreError;
    use crate::catalog::tests::roads;
    use crate::function::tests::hexbin;

    fn resolver() -> LayerResolver {
        let mut registry = FunctionRegistry::new();
        registry.register(hexbin()).unwrap();
        // a function shadowing a table id wins
        registry
            .register(FunctionInfo::new("public.parks", "public.parks_fn"))
            .unwrap();
        let mut parks = roads();
        parks.id = "public.parks".to_string();
        parks.table = "parks".to_string();
        LayerResolver::new(Catalog::from_tables(vec![roads(), parks]), registry)
    }

    #[test]
    fn functions_resolve_without_catalog() {
        let mut registry = FunctionRegistry::new();
        registry.register(hexbin()).unwrap();
        let resolver = LayerResolver::new(Catalog::default(), registry);
        let layer = resolver.resolve("hexbin").unwrap();
        assert!(matches!(layer, Layer::Function(f) if f.function == "pg_temp.hexbin"));
        assert_eq!(layer.srid(), 4326);
        assert_eq!(layer.bounds(), Bounds::MAX);
    }

    #[test]
    fn function_shadows_table() {
        let resolver = resolver();
        assert!(matches!(
            resolver.resolve("public.parks").unwrap(),
            Layer::Function(f) if f.function == "public.parks_fn"
        ));
    }

    #[test]
    fn table_matches_catalog_entry() {
        let resolver = resolver();
        let layer = resolver.resolve("public.roads").unwrap();
        assert_eq!(layer, Layer::Table(&roads()));
        assert_eq!(layer.id(), "public.roads");
        assert_eq!(layer.srid(), 4326);
        assert_eq!(layer.bounds(), Bounds::new(-10.0, -10.0, 10.0, 10.0));
        assert_eq!(layer.minzoom(), None);
    }

    #[rstest]
    #[case("roads")]
    #[case("")]
    #[case(".roads")]
    #[case("public.")]
    #[case(".")]
    fn malformed_ids(#[case] id: &str) {
        let err = resolver().resolve(id).unwrap_err();
        assert!(matches!(&err, PgMvtCoreError::InvalidIdentifier(v) if v == id), "{err:?}");
        assert!(err.is_not_found());
    }

    #[rstest]
    #[case("public.rivers")]
    #[case("other.roads")]
    #[case("public.roads.geom")]
    fn absent_tables(#[case] id: &str) {
        let err = resolver().resolve(id).unwrap_err();
        assert!(matches!(&err, PgMvtCoreError::LayerNotFound(v) if v == id), "{err:?}");
    }
}
