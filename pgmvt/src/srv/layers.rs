use actix_web::error::ErrorNotFound;
use actix_web::web::{Data, Path, Query};
use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, middleware, route};
use pgmvt_core::metadata::{layer_tilejson, tile_url};
use pgmvt_core::{Layer, LayerResolver, TileSettings};
use serde::{Deserialize, Serialize};

use crate::config::srv::SrvConfig;
use crate::srv::routes::ActixRoutes;
use crate::srv::server::map_core_error;

#[derive(Deserialize)]
pub struct LayerRequest {
    layer: String,
}

/// A catalog or registry entry together with its tile URL template.
#[derive(Serialize)]
struct LayerEntry<'a, T> {
    #[serde(flatten)]
    info: &'a T,
    tileurl: Option<String>,
}

impl<'a, T> LayerEntry<'a, T> {
    fn new(info: &'a T, id: &str, routes: &ActixRoutes<'_>) -> Self {
        Self {
            info,
            tileurl: tile_url(routes, id),
        }
    }
}

#[route(
    "/tables.json",
    method = "GET",
    method = "HEAD",
    wrap = "middleware::Compress::default()"
)]
#[allow(clippy::unused_async)]
async fn get_tables(
    req: HttpRequest,
    resolver: Data<LayerResolver>,
    srv_config: Data<SrvConfig>,
) -> HttpResponse {
    let routes = ActixRoutes::new(&req, srv_config.base_path.as_deref());
    let tables: Vec<_> = resolver
        .catalog()
        .iter()
        .map(|t| LayerEntry::new(t, &t.id, &routes))
        .collect();
    HttpResponse::Ok().json(tables)
}

#[route(
    "/table/{layer}.json",
    method = "GET",
    method = "HEAD",
    name = "table",
    wrap = "middleware::Compress::default()"
)]
#[allow(clippy::unused_async)]
async fn get_table(
    req: HttpRequest,
    path: Path<LayerRequest>,
    resolver: Data<LayerResolver>,
    srv_config: Data<SrvConfig>,
) -> ActixResult<HttpResponse> {
    let Layer::Table(table) = resolver.resolve(&path.layer).map_err(map_core_error)? else {
        return Err(ErrorNotFound(format!("{} is not a table", path.layer)));
    };
    let routes = ActixRoutes::new(&req, srv_config.base_path.as_deref());
    Ok(HttpResponse::Ok().json(LayerEntry::new(table, &table.id, &routes)))
}

#[route(
    "/functions.json",
    method = "GET",
    method = "HEAD",
    wrap = "middleware::Compress::default()"
)]
#[allow(clippy::unused_async)]
async fn get_functions(
    req: HttpRequest,
    resolver: Data<LayerResolver>,
    srv_config: Data<SrvConfig>,
) -> HttpResponse {
    let routes = ActixRoutes::new(&req, srv_config.base_path.as_deref());
    let functions: Vec<_> = resolver
        .registry()
        .iter()
        .map(|f| LayerEntry::new(f, &f.id, &routes))
        .collect();
    HttpResponse::Ok().json(functions)
}

#[route(
    "/function/{layer}.json",
    method = "GET",
    method = "HEAD",
    name = "function",
    wrap = "middleware::Compress::default()"
)]
#[allow(clippy::unused_async)]
async fn get_function(
    req: HttpRequest,
    path: Path<LayerRequest>,
    resolver: Data<LayerResolver>,
    srv_config: Data<SrvConfig>,
) -> ActixResult<HttpResponse> {
    let Some(func) = resolver.registry().get(&path.layer) else {
        return Err(ErrorNotFound(format!("Function {} not found", path.layer)));
    };
    let routes = ActixRoutes::new(&req, srv_config.base_path.as_deref());
    Ok(HttpResponse::Ok().json(LayerEntry::new(func, &func.id, &routes)))
}

#[route(
    "/{layer}/tilejson.json",
    method = "GET",
    method = "HEAD",
    name = "tilejson",
    wrap = "middleware::Compress::default()"
)]
#[allow(clippy::unused_async)]
async fn get_tilejson(
    req: HttpRequest,
    path: Path<LayerRequest>,
    resolver: Data<LayerResolver>,
    settings: Data<TileSettings>,
    srv_config: Data<SrvConfig>,
) -> ActixResult<HttpResponse> {
    let layer = resolver.resolve(&path.layer).map_err(map_core_error)?;
    let query = Query::<Vec<(String, String)>>::from_query(req.query_string())?.into_inner();
    let routes = ActixRoutes::new(&req, srv_config.base_path.as_deref());
    let tilejson =
        layer_tilejson(&layer, &routes, &settings, &query).map_err(map_core_error)?;
    Ok(HttpResponse::Ok().json(tilejson))
}
