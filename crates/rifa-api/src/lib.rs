pub mod auth;
pub mod error;
pub mod middleware;
pub mod numbers;
pub mod payments;
pub mod policy;
pub mod raffles;
pub mod stats;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tracing::error;

use rifa_db::Database;

use crate::error::ApiError;
use crate::middleware::require_auth;
use crate::payments::PaymentSettings;
use crate::payments::card::CardProcessor;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Profiles created for this email get the admin role.
    pub admin_email: Option<String>,
    pub card: Arc<dyn CardProcessor>,
    pub payments: PaymentSettings,
}

/// All `/api` routes plus `/health`. CORS and tracing layers are added by the binary.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/raffles", get(raffles::list_raffles))
        .route("/api/raffles/{id}", get(raffles::get_raffle))
        .route(
            "/api/raffles/{id}/numbers",
            get(numbers::get_numbers).post(numbers::reserve_numbers),
        )
        // {id} is the provider slug here and the payment id on PATCH.
        .route("/api/payments/{id}", post(payments::initiate_payment))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me).patch(auth::update_me))
        .route("/api/raffles", post(raffles::create_raffle))
        .route("/api/raffles/{id}", patch(raffles::update_raffle))
        .route("/api/payments/{id}", patch(payments::settle_payment))
        .route("/api/admin/stats", get(stats::get_stats))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> &'static str {
    "ok"
}

/// Run a store call off the async runtime.
pub(crate) async fn blocking<T, E, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    let st = state.clone();
    tokio::task::spawn_blocking(move || f(&st.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(Into::into)
}
