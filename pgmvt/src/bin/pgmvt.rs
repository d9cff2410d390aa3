use std::env;

use clap::Parser;
use pgmvt::PgMvtResult;
use pgmvt::args::Args;
use pgmvt::config::env::OsEnv;
use pgmvt::config::{Config, read_config};
use pgmvt::logging::{ensure_core_log_level_matches, init_tracing};
use pgmvt::srv::new_server;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

async fn start(args: Args) -> PgMvtResult<()> {
    info!("Starting pgmvt v{VERSION}");

    let env = OsEnv;
    let save_config = args.meta.save_config.clone();
    let mut config = if let Some(ref cfg_filename) = args.meta.config {
        info!("Using {}", cfg_filename.display());
        read_config(cfg_filename, &env)?
    } else {
        info!("Config file is not specified, using command line arguments");
        Config::default()
    };

    args.merge_into_config(&mut config, &env)?;
    config.finalize()?;
    let state = config.resolve().await?;
    info!(
        "Serving {} tables and {} functions",
        state.resolver.catalog().len(),
        state.resolver.registry().len()
    );

    if let Some(file_name) = save_config {
        config.save_to_file(file_name.as_path())?;
    } else {
        info!("Use --save-config to save or print the configuration.");
    }

    let (server, listen_addresses) = new_server(config.srv, state)?;
    info!("pgmvt has been started on {listen_addresses}.");
    info!("Use http://{listen_addresses}/tables.json to get the list of available tables.");

    server.await
}

#[tokio::main]
async fn main() {
    let filter = ensure_core_log_level_matches(env::var("RUST_LOG").ok());
    init_tracing(&filter, env::var("PGMVT_LOG_FORMAT").ok());

    let args = Args::parse();
    if let Err(e) = start(args).await {
        // Ensure the message is printed, even if the logging is disabled
        if tracing::enabled!(tracing::Level::ERROR) {
            error!("{e}");
        } else {
            eprintln!("{e}");
        }
        std::process::exit(1);
    }
}
