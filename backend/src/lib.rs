//! Tendero backend
//!
//! Multi-tenant ledger for small shops: stock, point-of-sale, client and
//! supplier credit, cash sessions and waste.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};

use config::AuditSink;
use services::{AuditRecorder, AuditTrail, LedgerEnv, PgAuditRecorder, TracingAuditRecorder};
use store::PgLedgerStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub ledger: LedgerEnv,
}

impl AppState {
    /// PostgreSQL-backed state: ledger store and audit log share the pool
    pub fn new(db: sqlx::PgPool, config: Config) -> Self {
        let recorder: Arc<dyn AuditRecorder> = match config.audit.sink {
            AuditSink::Database => Arc::new(PgAuditRecorder::new(db.clone())),
            AuditSink::Log => Arc::new(TracingAuditRecorder),
        };
        let ledger = LedgerEnv::new(
            Arc::new(PgLedgerStore::new(db.clone())),
            AuditTrail::new(recorder),
            config.ledger,
        );
        Self {
            db,
            config: Arc::new(config),
            ledger,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Tendero API v1"
}
