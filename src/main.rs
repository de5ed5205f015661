mod client_ip;
mod clock;
mod config;
mod cost_basis;
mod db;
mod error;
mod routes;
mod services;
mod state;
mod throttle;
mod tier;

use std::sync::Arc;

use clock::SystemClock;
use throttle::Throttle;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let throttle = Throttle::new(Arc::new(SystemClock));
    let sweeper = throttle.spawn_sweeper(config.sweep_interval);
    let state = state::AppState::new(pool, throttle, config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "folio listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    sweeper.shutdown().await;
    tracing::info!("folio stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
