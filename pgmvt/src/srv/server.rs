use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use actix_web::error::{
    ErrorBadRequest, ErrorInternalServerError, ErrorNotFound, ErrorServiceUnavailable,
};
use actix_web::http::header::CACHE_CONTROL;
use actix_web::middleware::{Logger, NormalizePath, TrailingSlash};
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, middleware, route, web};
use futures::TryFutureExt;
use pgmvt_core::PgMvtCoreError;
use serde_json::json;
use tracing::{error, warn};

use crate::config::ServerState;
use crate::config::srv::{
    CACHE_CONTROL_DEFAULT, KEEP_ALIVE_DEFAULT, LISTEN_ADDRESSES_DEFAULT, SrvConfig,
};
use crate::srv::layers::{get_function, get_functions, get_table, get_tables, get_tilejson};
use crate::srv::tiles::get_tile;
use crate::srv::tms::{get_tile_matrix_set, get_tile_matrix_sets};
use crate::{PgMvtError, PgMvtResult};

pub fn map_internal_error<T: std::fmt::Display>(e: T) -> actix_web::Error {
    error!("{e}");
    ErrorInternalServerError(e.to_string())
}

/// Translate a core error into an HTTP error response.
pub fn map_core_error(e: PgMvtCoreError) -> actix_web::Error {
    if e.is_not_found() {
        ErrorNotFound(e.to_string())
    } else if e.is_client_error() {
        ErrorBadRequest(e.to_string())
    } else if e.is_pool_timeout() {
        warn!("{e}");
        ErrorServiceUnavailable(e.to_string())
    } else {
        map_internal_error(e)
    }
}

/// Return 200 OK if healthy. Used for readiness and liveness probes.
#[route("/healthz", method = "GET", method = "HEAD")]
#[allow(clippy::unused_async)]
async fn get_health() -> impl Responder {
    HttpResponse::Ok()
        .insert_header((CACHE_CONTROL, "no-cache"))
        .json(json!({"ping": "pong!"}))
}

pub fn router(cfg: &mut web::ServiceConfig) {
    cfg.service(get_health)
        .service(get_tile_matrix_sets)
        .service(get_tile_matrix_set)
        .service(get_tables)
        .service(get_table)
        .service(get_functions)
        .service(get_function)
        .service(get_tilejson)
        .service(get_tile);
}

type Server = Pin<Box<dyn Future<Output = PgMvtResult<()>>>>;

/// Create a future for an Actix web server together with the listening address.
pub fn new_server(config: SrvConfig, state: ServerState) -> PgMvtResult<(Server, String)> {
    let keep_alive = Duration::from_secs(config.keep_alive.unwrap_or(KEEP_ALIVE_DEFAULT));
    let worker_processes = config.worker_processes.unwrap_or_else(num_cpus::get);
    let listen_addresses = config
        .listen_addresses
        .clone()
        .unwrap_or_else(|| LISTEN_ADDRESSES_DEFAULT.to_string());
    let cache_control = config
        .cache_control
        .clone()
        .unwrap_or_else(|| CACHE_CONTROL_DEFAULT.to_string());

    let cors_config = config.cors.clone().unwrap_or_default();
    cors_config.validate()?;
    cors_config.log_current_configuration();

    let resolver = Data::new(state.resolver);
    let pool = Data::new(state.pool);
    let settings = Data::new(state.settings);
    let srv_config = Data::new(config);

    let factory = move || {
        let cors_middleware = cors_config.make_cors_middleware();

        App::new()
            .app_data(resolver.clone())
            .app_data(pool.clone())
            .app_data(settings.clone())
            .app_data(srv_config.clone())
            .wrap(middleware::DefaultHeaders::new().add((CACHE_CONTROL, cache_control.clone())))
            .wrap(middleware::Condition::new(
                cors_middleware.is_some(),
                cors_middleware.unwrap_or_default(),
            ))
            .wrap(Logger::default())
            .wrap(NormalizePath::new(TrailingSlash::MergeOnly))
            .configure(router)
    };

    let server = HttpServer::new(factory)
        .bind(listen_addresses.clone())
        .map_err(|e| PgMvtError::BindingError(e, listen_addresses.clone()))?
        .keep_alive(keep_alive)
        .shutdown_timeout(0)
        .workers(worker_processes)
        .run()
        .err_into();

    Ok((Box::pin(server), listen_addresses))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use actix_http::Request;
    use actix_web::dev::{Service, ServiceResponse};
    use actix_web::http::header::HOST;
    use actix_web::test::{TestRequest, call_service, init_service, read_body};
    use actix_web::web::Data;
    use actix_web::{App, Error};
    use pgmvt_core::{
        Catalog, FunctionInfo, FunctionRegistry, LayerResolver, ParamType, ParamValue, PgPool,
        TableInfo, TileSettings,
    };
    use tilejson::Bounds;

    use super::*;

    pub fn roads() -> TableInfo {
        TableInfo {
            id: "public.roads".to_string(),
            schema: "public".to_string(),
            table: "roads".to_string(),
            geometry_column: "geom".to_string(),
            geometry_srid: 4326,
            geometry_type: "LINESTRING".to_string(),
            properties: BTreeMap::from([
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

    pub fn hexbin() -> FunctionInfo {
        FunctionInfo::new("hexbin", "pg_temp.hexbin").with_param(
            "resolution",
            ParamType::Int,
            Some(ParamValue::Int(6)),
        )
    }

    /// An app over a fixed catalog, with a pool that never connects.
    pub async fn test_app(
        srv_config: SrvConfig,
    ) -> impl Service<Request, Response = ServiceResponse, Error = Error> {
        let mut registry = FunctionRegistry::new();
        registry.register(hexbin()).unwrap();
        let resolver = LayerResolver::new(Catalog::from_tables(vec![roads()]), registry);
        let pool =
            PgPool::new_lazy("postgres://localhost:1/tiles", 1, Duration::from_millis(10)).unwrap();

        init_service(
            App::new()
                .app_data(Data::new(resolver))
                .app_data(Data::new(pool))
                .app_data(Data::new(TileSettings::default()))
                .app_data(Data::new(srv_config))
                .configure(router),
        )
        .await
    }

    pub fn get(path: &str) -> Request {
        TestRequest::get()
            .uri(path)
            .insert_header((HOST, "localhost:8081"))
            .to_request()
    }

    #[actix_rt::test]
    async fn health() {
        let app = test_app(SrvConfig::default()).await;
        let response = call_service(&app, get("/healthz")).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "no-cache");
        let body = read_body(response).await;
        assert_eq!(body, r#"{"ping":"pong!"}"#);
    }

    #[actix_rt::test]
    async fn unknown_path() {
        let app = test_app(SrvConfig::default()).await;
        let response = call_service(&app, get("/nothing/here/at/all")).await;
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn core_error_status() {
        let status = |e: PgMvtCoreError| map_core_error(e).as_response_error().status_code();
        assert_eq!(
            status(PgMvtCoreError::LayerNotFound("public.rivers".into())),
            404
        );
        assert_eq!(status(PgMvtCoreError::InvalidIdentifier("x".into())), 404);
        assert_eq!(status(PgMvtCoreError::InvalidZoom(31)), 400);
        assert_eq!(
            status(PgMvtCoreError::InvalidFunctionName("a.b.c".into())),
            500
        );
    }
}
