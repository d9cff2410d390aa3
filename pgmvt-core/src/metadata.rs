//! Self-describing metadata: tile URL templates and `TileJSON` documents.

use pgmvt_tile_utils::{DEFAULT_TILE_MATRIX_SET, TileMatrixSet};
use tilejson::{TileJSON, VectorLayer, tilejson};
use url::form_urlencoded;

use crate::PgMvtCoreError::InvalidParameter;
use crate::PgMvtCoreResult;
use crate::layer::Layer;
use crate::settings::TileSettings;

/// Route name of the tile endpoint, with `layer`, `z`, `x` and `y` path elements.
pub const TILE_ROUTE: &str = "tile";

/// Query keys selecting the tile matrix set and the zoom overrides, compared case-insensitively.
pub const TMS_QUERY_KEY: &str = "tilematrixsetid";
const MINZOOM_QUERY_KEY: &str = "minzoom";
const MAXZOOM_QUERY_KEY: &str = "maxzoom";

/// Builds URLs from named routes, as registered by the HTTP layer.
pub trait RouteReverser {
    /// Absolute URL of `route` with its path elements filled in order,
    /// or `None` if there is no such route or the elements do not fit it.
    fn url_for(&self, route: &str, elements: &[&str]) -> Option<String>;
}

/// Tile URL template of a layer, with literal `{z}`, `{x}` and `{y}` placeholders.
pub fn tile_url(routes: &impl RouteReverser, layer_id: &str) -> Option<String> {
    routes.url_for(TILE_ROUTE, &[layer_id, "{z}", "{x}", "{y}"])
}

/// The tile matrix set selected by the `tilematrixsetid` query key, or the default one.
pub fn tile_matrix_set_from_query(
    query: &[(String, String)],
) -> PgMvtCoreResult<&'static TileMatrixSet> {
    match query.iter().find(|(k, _)| k.eq_ignore_ascii_case(TMS_QUERY_KEY)) {
        Some((_, id)) => Ok(TileMatrixSet::get(id)?),
        None => Ok(TileMatrixSet::default_set()),
    }
}

/// Compose the `TileJSON` of a layer.
///
/// `query` is the query string of the `TileJSON` request. `minzoom` and `maxzoom` override
/// the zoom range, `tilematrixsetid` selects the tile matrix set, and every other pair is
/// appended to the tile URL so that tiles are requested with the same function parameters.
pub fn layer_tilejson(
    layer: &Layer<'_>,
    routes: &impl RouteReverser,
    settings: &TileSettings,
    query: &[(String, String)],
) -> PgMvtCoreResult<TileJSON> {
    let tms = tile_matrix_set_from_query(query)?;
    let minzoom = zoom_override(layer, query, MINZOOM_QUERY_KEY)?
        .or(layer.minzoom())
        .unwrap_or_else(|| settings.default_minzoom.clamp(tms.minzoom(), tms.maxzoom()));
    let maxzoom = zoom_override(layer, query, MAXZOOM_QUERY_KEY)?
        .or(layer.maxzoom())
        .unwrap_or_else(|| settings.default_maxzoom.clamp(tms.minzoom(), tms.maxzoom()));

    let tiles = tile_url(routes, layer.id())
        .map(|url| url + &tiles_query(query, tms))
        .into_iter()
        .collect();

    let mut tilejson = tilejson! {
        tiles: tiles,
        name: layer.id().to_string(),
        minzoom: minzoom,
        maxzoom: maxzoom,
        bounds: layer.bounds(),
    };
    tilejson.description = layer.description().map(ToString::to_string);
    if let Layer::Table(table) = layer {
        let fields = table
            .tile_properties()
            .map(|col| (col.to_string(), table.properties[col].clone()))
            .collect();
        tilejson.vector_layers = Some(vec![VectorLayer::new(table.id.clone(), fields)]);
    }
    Ok(tilejson)
}

fn zoom_override(
    layer: &Layer<'_>,
    query: &[(String, String)],
    key: &str,
) -> PgMvtCoreResult<Option<u8>> {
    let Some((param, value)) = query.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)) else {
        return Ok(None);
    };
    value.parse().map(Some).map_err(|_| InvalidParameter {
        layer: layer.id().to_string(),
        param: param.clone(),
        value: value.clone(),
        reason: "expected a zoom level".to_string(),
    })
}

/// Query string to append to a tile URL, including the leading `?`, or empty.
fn tiles_query(query: &[(String, String)], tms: &TileMatrixSet) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut empty = true;
    for (key, value) in query {
        let lower = key.to_ascii_lowercase();
        if lower != MINZOOM_QUERY_KEY && lower != MAXZOOM_QUERY_KEY && lower != TMS_QUERY_KEY {
            serializer.append_pair(key, value);
            empty = false;
        }
    }
    if tms.id != DEFAULT_TILE_MATRIX_SET {
        serializer.append_pair(TMS_QUERY_KEY, tms.id);
        empty = false;
    }
    if empty {
        String::new()
    } else {
        format!("?{}", serializer.finish())
    }
}
