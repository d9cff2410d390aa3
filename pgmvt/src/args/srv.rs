use crate::config::srv::{
    CACHE_CONTROL_DEFAULT, KEEP_ALIVE_DEFAULT, LISTEN_ADDRESSES_DEFAULT, SrvConfig,
};

/// HTTP server options, each one overrides the matching top-level key of the config file.
#[derive(clap::Args, Debug, PartialEq, Default)]
pub struct SrvArgs {
    #[arg(short, long, help = format!("Socket address to listen on [default: {LISTEN_ADDRESSES_DEFAULT}]"))]
    pub listen_addresses: Option<String>,
    #[arg(short, long, help = format!("Keep-alive timeout of idle connections in seconds [default: {KEEP_ALIVE_DEFAULT}]"))]
    pub keep_alive: Option<u64>,
    /// Number of HTTP workers [default: number of CPUs]
    #[arg(short = 'W', long)]
    pub workers: Option<usize>,
    /// URL prefix of the tile URLs in `TileJSON` and catalog responses, e.g. `/tiles` behind a proxy.
    /// Routes are served without it. Must begin with a `/`.
    #[arg(long)]
    pub base_path: Option<String>,
    #[arg(long, help = format!("Cache-Control header of tile and metadata responses [default: {CACHE_CONTROL_DEFAULT}]"))]
    pub cache_control: Option<String>,
}

impl SrvArgs {
    pub(crate) fn merge_into_config(self, srv: &mut SrvConfig) {
        let Self {
            listen_addresses,
            keep_alive,
            workers,
            base_path,
            cache_control,
        } = self;
        srv.listen_addresses = listen_addresses.or(srv.listen_addresses.take());
        srv.keep_alive = keep_alive.or(srv.keep_alive);
        srv.worker_processes = workers.or(srv.worker_processes);
        srv.base_path = base_path.or(srv.base_path.take());
        srv.cache_control = cache_control.or(srv.cache_control.take());
    }
}
