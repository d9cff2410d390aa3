mod layers;
mod routes;
pub use routes::ActixRoutes;

mod server;
pub use server::{map_core_error, map_internal_error, new_server, router};

mod tiles;
mod tms;
