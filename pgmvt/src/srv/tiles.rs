use actix_web::web::{Data, Path, Query};
use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, middleware, route};
use pgmvt_core::metadata::{TMS_QUERY_KEY, tile_matrix_set_from_query};
use pgmvt_core::{LayerResolver, PgMvtCoreError, PgPool, TileSettings, UrlQuery};
use pgmvt_tile_utils::{MVT_CONTENT_TYPE, TileCoord};
use serde::Deserialize;
use tracing::trace;

use crate::srv::server::map_core_error;

#[derive(Deserialize, Clone)]
pub struct TileRequest {
    layer: String,
    z: u8,
    x: u32,
    y: u32,
}

#[route(
    "/tiles/{layer}/{z}/{x}/{y}.pbf",
    method = "GET",
    method = "HEAD",
    name = "tile",
    wrap = "middleware::Compress::default()"
)]
async fn get_tile(
    req: HttpRequest,
    path: Path<TileRequest>,
    resolver: Data<LayerResolver>,
    pool: Data<PgPool>,
    settings: Data<TileSettings>,
) -> ActixResult<HttpResponse> {
    let layer = resolver.resolve(&path.layer).map_err(map_core_error)?;
    let xyz = TileCoord::new_checked(path.z, path.x, path.y)
        .ok_or(PgMvtCoreError::InvalidZoom(path.z))
        .map_err(map_core_error)?;

    let query = Query::<Vec<(String, String)>>::from_query(req.query_string())?.into_inner();
    let tms = tile_matrix_set_from_query(&query).map_err(map_core_error)?;
    let params: UrlQuery = query
        .into_iter()
        .filter(|(k, _)| !k.eq_ignore_ascii_case(TMS_QUERY_KEY))
        .collect();

    let tile = layer
        .get_tile(&pool, xyz, tms, &settings, &params)
        .await
        .map_err(map_core_error)?;
    trace!("Tile {xyz:#} of {} has {} bytes", layer.id(), tile.len());

    Ok(if tile.is_empty() {
        HttpResponse::NoContent().finish()
    } else {
        HttpResponse::Ok()
            .content_type(MVT_CONTENT_TYPE)
            .body(tile)
    })
}
