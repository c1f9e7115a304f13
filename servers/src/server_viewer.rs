//! # Viewer Backend Server
//!
//! Serves the aggregated game master-data maps, the gacha browser API and the
//! bilibili dynamic/image proxies to the viewer frontend, plus the frontend
//! build itself.
//!
//! ## Functionality:
//! - **Master data**: refreshed once before the listener opens, then hourly
//!   by a background poller. A failed refresh keeps the previous maps.
//! - **Bilibili proxy**: WBI-signed dynamic feed requests and Referer-patched
//!   image fetches, both behind bounded TTL caches that a background task
//!   purges of expired entries.
//! - **Static files**: served from the configured directory with `.html`
//!   fallback and a custom 404 page.
//! - **Graceful Shutdown**: Ctrl-C or SIGTERM stops the listener and the pollers
//!   through a shared broadcast channel.

use anyhow::Result;
use tokio::signal;

use lib_common::ingestors::{CacheSweeper, MasterDataPoller};

mod viewer_logic;
use viewer_logic::{config, logger, routes, state};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Ctrl-C received, initiating shutdown.");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
                tracing::info!("SIGTERM received, initiating shutdown.");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so clap sees its values
    dotenvy::dotenv().ok();

    let settings = config::load_config();
    let _log_guard = logger::setup_logging(&settings.log_dir, &settings.log_level)?;
    tracing::info!(port = settings.port, master_data_dir = %settings.master_data_dir.display(), "Starting server_viewer");

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let app_state = state::AppState::from_settings(&settings)?;

    match &app_state.static_dir {
        Some(dir) => tracing::info!("Serving static files from {}", dir.display()),
        None => tracing::warn!(
            "{} not found. Only the API will be served.",
            settings.static_dir.display()
        ),
    }

    app_state.bilibili.spawn_warm_up();

    let sweeper_handle = CacheSweeper::new(vec![
        app_state.bilibili.api_cache().clone(),
        app_state.bilibili.image_cache().clone(),
    ])
    .start(shutdown_tx.subscribe());

    let poller_handle = MasterDataPoller::new(app_state.store.clone(), settings.refresh_interval)
        .start(shutdown_tx.subscribe())
        .await;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port)).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    let mut server_shutdown = shutdown_tx.subscribe();
    let server = axum::serve(listener, routes::build_router(app_state)).with_graceful_shutdown(async move {
        let _ = server_shutdown.recv().await;
    });
    let server_handle = tokio::spawn(async move { server.await });

    shutdown_signal().await;

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());

    let (server_result, poller_result, sweeper_result) = tokio::join!(server_handle, poller_handle, sweeper_handle);
    server_result??;
    poller_result?;
    sweeper_result?;

    tracing::info!("Shutdown complete.");
    Ok(())
}
