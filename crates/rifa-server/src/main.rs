mod config;
mod sweeper;

use std::sync::Arc;

use axum::http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use rifa_api::payments::card::StripeClient;
use rifa_api::{AppState, AppStateInner, build_router};
use rifa_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rifa=debug,rifa_api=debug,rifa_db=info,tower_http=debug".into()
            }),
        )
        .init();

    // Config
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}.", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = Database::open(&config.db_path)?;

    if config.stripe_secret_key.is_none() {
        warn!("STRIPE_SECRET_KEY is unset; card payments will be refused");
    }
    let card = StripeClient::new(config.stripe_api_base.clone(), config.stripe_secret_key.clone());

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        admin_email: config.admin_email.clone(),
        card: Arc::new(card),
        payments: config.payments.clone(),
    });

    // Background hold sweeper
    tokio::spawn(sweeper::run_sweep_loop(state.clone(), config.sweep_interval_secs));

    // CORS: the storefront is served from its own origin
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(false);

    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("Rifa server listening on {}", config.addr);
    info!("Hold sweep every {}s", config.sweep_interval_secs);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
