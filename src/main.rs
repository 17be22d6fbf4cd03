//! Todo Service - Main entry point.
//!
//! Loads the database configuration, bootstraps the connection pool and
//! serves the todo API over HTTP.

use clap::Parser;
use todo_service::config::{AppConfig, ServerArgs};
use todo_service::db::{ConnectionBootstrapper, TodoStore};
use todo_service::http::HttpServer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(args: &ServerArgs) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if args.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServerArgs::parse();

    init_tracing(&args);

    info!("Starting todo-service v{}", env!("CARGO_PKG_VERSION"));

    // Any configuration problem aborts startup before a pool exists.
    let config = AppConfig::load(&args.config)?;
    info!(backend = %config.backend(), "Configuration loaded");

    let pool = ConnectionBootstrapper::build(&config).await?;
    let store = TodoStore::new(pool);
    store.init_schema().await?;

    let server = HttpServer::new(store, &args.http_host, args.http_port);
    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
