#![cfg(feature = "test-pg")]

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::header::{CONTENT_TYPE, HOST};
use actix_web::test::{TestRequest, call_and_read_body_json, call_service, init_service, read_body};
use actix_web::web::Data;
use actix_web::{App, Error};
use indoc::indoc;
use pgmvt::config::env::FauxEnv;
use pgmvt::config::parse_config;
use pgmvt::config::srv::SrvConfig;
use pgmvt::srv::router;
use pgmvt_core::PgPool;
use serde_json::Value;
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::runners::AsyncRunner as _;
use testcontainers_modules::testcontainers::{ContainerAsync, ImageExt as _};

const FIXTURES: &str = indoc! {"
    CREATE TABLE public.roads (
        gid  serial PRIMARY KEY,
        name text,
        geom geometry(LineString, 4326)
    );
    INSERT INTO public.roads (name, geom)
    VALUES ('diagonal', 'SRID=4326;LINESTRING(-10 -10, 10 10)'),
           ('short', 'SRID=4326;LINESTRING(5 -5, 6 -6)');

    CREATE TABLE public.no_srid (id integer, geom geometry);

    CREATE FUNCTION public.roads_tile(
        xmin float8, ymin float8, xmax float8, ymax float8, srid integer, resolution integer DEFAULT 6
    ) RETURNS bytea AS $$
        SELECT ST_AsMVT(t, 'roads_tile', 4096, 'geom')
        FROM (
            SELECT ST_AsMVTGeom(
                       ST_Transform(geom, srid),
                       ST_MakeEnvelope(xmin, ymin, xmax, ymax, srid)::box2d
                   ) AS geom,
                   resolution
            FROM public.roads
        ) t
    $$ LANGUAGE sql STABLE;

    ANALYZE;
"};

async fn start_postgis() -> (ContainerAsync<Postgres>, String) {
    let node = Postgres::default()
        .with_name("postgis/postgis")
        .with_tag("16-3.4")
        .start()
        .await
        .expect("container launched");
    let conn_str = format!(
        "postgres://postgres:postgres@{}:{}/postgres",
        node.get_host().await.unwrap(),
        node.get_host_port_ipv4(5432).await.unwrap()
    );
    (node, conn_str)
}

async fn create_app(
    conn_str: &str,
) -> impl Service<Request, Response = ServiceResponse, Error = Error> {
    let setup = PgPool::new(conn_str, 1, Duration::from_secs(5))
        .await
        .unwrap();
    setup.get().await.unwrap().batch_execute(FIXTURES).await.unwrap();

    let env = FauxEnv(
        [("DATABASE_URL", OsString::from(conn_str))]
            .into_iter()
            .collect(),
    );
    let mut config = parse_config(
        indoc! {"
            postgres:
              connection_string: ${DATABASE_URL}
              pool_size: 2
            functions:
              - id: roads_tile
                function: public.roads_tile
                params:
                  - name: resolution
                    type: int
                    default: 6
        "},
        &env,
        Path::new("test.yaml"),
    )
    .unwrap();
    config.finalize().unwrap();
    let state = config.resolve().await.unwrap();

    init_service(
        App::new()
            .app_data(Data::new(state.resolver))
            .app_data(Data::new(state.pool))
            .app_data(Data::new(state.settings))
            .app_data(Data::new(SrvConfig::default()))
            .configure(router),
    )
    .await
}

fn get(path: &str) -> Request {
    TestRequest::get()
        .uri(path)
        .insert_header((HOST, "localhost:8081"))
        .to_request()
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[actix_rt::test]
async fn pg_catalog_and_tiles() {
    let (_node, conn_str) = start_postgis().await;
    let app = create_app(&conn_str).await;

    let tables: Value = call_and_read_body_json(&app, get("/tables.json")).await;
    let tables = tables.as_array().unwrap();
    let roads = tables
        .iter()
        .find(|t| t["id"] == "public.roads")
        .expect("public.roads is in the catalog");
    assert_eq!(roads["geometry_column"], "geom");
    assert_eq!(roads["geometry_srid"], 4326);
    assert_eq!(roads["properties"]["gid"], "int4");
    assert_eq!(
        roads["tileurl"],
        "http://localhost:8081/tiles/public.roads/{z}/{x}/{y}.pbf"
    );
    assert!(tables.iter().all(|t| t["id"] != "public.no_srid"));

    let response = call_service(&app, get("/tiles/public.roads/0/0/0.pbf")).await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "application/x-protobuf"
    );
    let tile = read_body(response).await;
    assert!(contains(&tile, b"public.roads"), "layer is named after the table");
    assert!(contains(&tile, b"diagonal"));

    let again = read_body(call_service(&app, get("/tiles/public.roads/0/0/0.pbf")).await).await;
    assert_eq!(tile, again);

    let crs84 = call_service(
        &app,
        get("/tiles/public.roads/0/0/0.pbf?tilematrixsetid=WorldCRS84Quad"),
    )
    .await;
    assert_eq!(crs84.status(), 200);

    // far away from any road
    let response = call_service(&app, get("/tiles/public.roads/10/0/0.pbf")).await;
    assert_eq!(response.status(), 204);
}

#[actix_rt::test]
async fn pg_function_tiles() {
    let (_node, conn_str) = start_postgis().await;
    let app = create_app(&conn_str).await;

    let response = call_service(&app, get("/tiles/roads_tile/0/0/0.pbf?resolution=3")).await;
    assert_eq!(response.status(), 200);
    let tile = read_body(response).await;
    assert!(contains(&tile, b"roads_tile"));

    let response = call_service(&app, get("/tiles/roads_tile/0/0/0.pbf?resolution=abc")).await;
    assert_eq!(response.status(), 400);

    let tilejson: Value =
        call_and_read_body_json(&app, get("/roads_tile/tilejson.json?resolution=3")).await;
    assert_eq!(
        tilejson["tiles"][0],
        "http://localhost:8081/tiles/roads_tile/{z}/{x}/{y}.pbf?resolution=3"
    );
}
