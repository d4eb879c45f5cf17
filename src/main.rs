//! This file defines the horreum-explorer binary entry point.

use horreum_explorer::app;
use horreum_explorer::cli;
use horreum_explorer::metrics;
use horreum_explorer::server;
use horreum_explorer::tracing;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing(&args);
    ::tracing::debug!(?args, "parsed command line arguments");
    metrics::register_metrics();
    app::init(&args);
    let service = app::service(&args);
    server::serve(&args, service).await;
    tracing::shutdown_tracing();
}
