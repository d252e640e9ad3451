//! Diabetes Risk Assessment
//!
//! Web service that estimates diabetes risk from eight clinical measurements
//! and explains each estimate with per-feature Shapley contributions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DIABETES RISK                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌─────────────────────────┐ │
//! │  │  Pages &  │  │  Session  │  │  RiskService            │ │
//! │  │  API      │  │  (JWT     │  │  forest + explainer     │ │
//! │  │  (Axum)   │  │  cookie)  │  │  (spawn_blocking)       │ │
//! │  └─────┬─────┘  └─────┬─────┘  └────────────┬────────────┘ │
//! │        └──────────────┼──────────────────────┘              │
//! │                       ▼                                     │
//! │          ┌─────────────┐     ┌──────────────┐              │
//! │          │   SQLite    │     │  model.json  │              │
//! │          │   (users)   │     │  (artifact)  │              │
//! │          └─────────────┘     └──────────────┘              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ml;
pub mod models;
pub mod risk;
pub mod views;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::{
    trace::TraceLayer,
    compression::CompressionLayer,
};

pub use error::{AppError, AppResult};

use risk::RiskService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub config: config::Config,
    pub risk: Arc<RiskService>,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/login", get(handlers::auth::login_page).post(handlers::auth::login))
        .route("/register", get(handlers::auth::register_page).post(handlers::auth::register));

    // Gated routes (session cookie)
    let session_routes = Router::new()
        .route("/", get(handlers::pages::home))
        .route("/about", get(handlers::pages::about))
        .route("/services", get(handlers::pages::services))
        .route("/dashboard", get(handlers::pages::dashboard))
        .route("/contact", get(handlers::pages::contact_page).post(handlers::pages::contact_submit))
        .route("/logout", get(handlers::auth::logout))

        // Prediction
        .route("/predict", post(handlers::predict::predict_form))
        .route("/api/v1/predict", post(handlers::predict::predict_api))

        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_session
        ));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
