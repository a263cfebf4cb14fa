use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use quizroom_server::config::ServerConfig;
use quizroom_server::generator::HttpGenerator;
use quizroom_server::{build_app, spawn_idle_sweeper};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load();
    config.validate();

    let generator = Arc::new(HttpGenerator::new(&config.generator));
    let listen_addr = config.listen_addr.clone();
    let (app, state) = build_app(config, generator);
    spawn_idle_sweeper(state);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };
    tracing::info!(addr = %listen_addr, "quizroom server listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
    }
}
