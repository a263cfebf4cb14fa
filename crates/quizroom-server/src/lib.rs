pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod generator;
pub mod health;
pub mod state;
pub mod store;
pub mod timer;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use config::ServerConfig;
use generator::QuestionGenerator;
use state::AppState;

/// Build the Axum router and application state from a config and a
/// question-generation client.
pub fn build_app(
    config: ServerConfig,
    generator: Arc<dyn QuestionGenerator>,
) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config, generator);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .route("/ready", axum::routing::get(health::readiness_check))
        .fallback_service(ServeDir::new(&web_root))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}

/// Background task that periodically destroys idle rooms (and their
/// timers) so abandoned sessions do not accumulate.
pub fn spawn_idle_sweeper(state: AppState) {
    tokio::spawn(async move {
        let period = Duration::from_secs(state.config.rooms.idle_check_interval_secs);
        let max_idle = Duration::from_secs(state.config.rooms.idle_timeout_secs);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let removed = state.engine.write().await.sweep_idle(max_idle);
            if removed > 0 {
                tracing::info!(removed, "Idle room sweep");
            }
        }
    });
}
