use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod config;
mod database;
mod error;
mod handlers;
mod models;
mod services;
mod utils;

use config::Config;
use database::DatabasePool;

// AppState is defined here and mirrored in lib.rs so integration tests can
// build the same state the binary runs with.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabasePool,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jewel_billing_api=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting Jewellery Billing API server...");

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    info!("Configuration loaded");

    // Initialize database pool and schema
    let db_pool = database::new_pool(&config.database_url).await?;
    info!("Database connection pool created");

    // Build application state
    let app_state = AppState {
        db_pool: db_pool.clone(),
        config: config.clone(),
    };

    // Build API routes
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/parties", post(handlers::create_party))
        .route("/api/parties", get(handlers::list_parties))
        .route("/api/parties/:id", get(handlers::get_party))
        .route("/api/parties/:id", put(handlers::update_party))
        .route(
            "/api/parties/:id/pending-receivables",
            get(handlers::pending_receivables),
        )
        .route(
            "/api/parties/:id/pending-payables",
            get(handlers::pending_payables),
        )
        .route("/api/sales", post(handlers::create_sale))
        .route("/api/sales/:invoice_no", put(handlers::update_sale))
        .route("/api/purchases", post(handlers::create_purchase))
        .route("/api/purchases/:invoice_no", put(handlers::update_purchase))
        .route("/api/deposits", post(handlers::create_deposit))
        .route("/api/deposits/:deposit_no", put(handlers::update_deposit))
        .route("/api/bills/:invoice_no", get(handlers::get_bill))
        .route("/api/bills/:invoice_no", delete(handlers::delete_bill))
        .route(
            "/api/bills/:invoice_no/reprint",
            post(handlers::reprint_bill),
        )
        .route("/api/reports/daily", get(handlers::daily_report))
        .route("/api/reports/monthly", get(handlers::monthly_report))
        .route("/api/reports/outstanding", get(handlers::outstanding_report))
        .route("/api/reports/top-parties", get(handlers::top_parties_report))
        .route(
            "/api/reports/inventory-value",
            get(handlers::inventory_value_report),
        )
        .route("/api/settings", get(handlers::get_settings))
        .route("/api/settings/:key", put(handlers::update_setting))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    // Graceful shutdown
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutting down gracefully...");
        }
    }

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
