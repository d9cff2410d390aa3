use actix_web::error::ErrorNotFound;
use actix_web::web::{Data, Path};
use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, middleware, route};
use pgmvt_core::metadata::RouteReverser as _;
use pgmvt_tile_utils::{TileMatrixSet, tile_matrix_sets};
use serde::Serialize;

use crate::config::srv::SrvConfig;
use crate::srv::routes::ActixRoutes;

const TMS_ROUTE: &str = "tile_matrix_set";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TileMatrixSetList {
    tile_matrix_sets: Vec<TileMatrixSetRef>,
}

#[derive(Serialize)]
struct TileMatrixSetRef {
    id: &'static str,
    title: &'static str,
    links: Vec<Link>,
}

#[derive(Serialize)]
struct Link {
    href: Option<String>,
    rel: &'static str,
    #[serde(rename = "type")]
    media_type: &'static str,
}

#[route(
    "/tileMatrixSets",
    method = "GET",
    method = "HEAD",
    wrap = "middleware::Compress::default()"
)]
#[allow(clippy::unused_async)]
async fn get_tile_matrix_sets(req: HttpRequest, srv_config: Data<SrvConfig>) -> HttpResponse {
    let routes = ActixRoutes::new(&req, srv_config.base_path.as_deref());
    let list = TileMatrixSetList {
        tile_matrix_sets: tile_matrix_sets()
            .iter()
            .map(|tms| TileMatrixSetRef {
                id: tms.id,
                title: tms.title,
                links: vec![Link {
                    href: routes.url_for(TMS_ROUTE, &[tms.id]),
                    rel: "item",
                    media_type: "application/json",
                }],
            })
            .collect(),
    };
    HttpResponse::Ok().json(list)
}

#[route(
    "/tileMatrixSets/{id}",
    method = "GET",
    method = "HEAD",
    name = "tile_matrix_set",
    wrap = "middleware::Compress::default()"
)]
#[allow(clippy::unused_async)]
async fn get_tile_matrix_set(path: Path<String>) -> ActixResult<HttpResponse> {
    let tms = TileMatrixSet::get(&path).map_err(|e| ErrorNotFound(e.to_string()))?;
    Ok(HttpResponse::Ok().json(tms))
}
