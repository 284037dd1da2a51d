use std::net::SocketAddr;
use std::sync::Arc;

use going_api::{build_router, users::InMemoryUserDirectory, AppState};
use going_security::Reaper;
use going_shared::config::AppConfig;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize telemetry
    going_shared::telemetry::init_telemetry()?;

    info!("going server starting...");

    // Load configuration
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if config.uses_default_secret() {
        warn!("session.secret is still the placeholder value; set GOING_SESSION__SECRET");
    }
    if config.session.allow_insecure_id_fallback {
        info!("session ids fall back to time-derived values if the OS random source fails");
    }

    // Create App State
    let users = Arc::new(InMemoryUserDirectory::new());
    let state = AppState::from_config(&config, users)?;
    info!(
        lifetime_minutes = config.session.lifetime_minutes,
        reap = ?state.sessions.reap_strategy(),
        "session store ready"
    );

    let reaper = state
        .sessions
        .reap_strategy()
        .periodic_interval()
        .map(|every| Reaper::spawn(state.sessions.clone(), every));

    let app = build_router(state.clone());

    // Bind address
    let host: std::net::IpAddr = config.app.host.parse()?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(reaper) = reaper {
        reaper.shutdown().await;
    }
    let stats = state.sessions.stats();
    info!(
        active = stats.active,
        swept = stats.swept,
        degraded_ids = stats.degraded_ids,
        "going server stopped"
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
