//! biblio-api library interface
//!
//! Exposes the application state, router construction and the service layer
//! for integration testing.

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use biblio_common::config::ServiceConfig;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::services::google_books::GoogleBooksClient;
use crate::services::resolver::MetadataResolver;
use crate::services::upload::ImageFetcher;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Runtime configuration
    pub config: Arc<ServiceConfig>,
    /// ISBN metadata fallback chain
    pub resolver: Arc<MetadataResolver>,
    /// Keyword-search backend (external search and import matching)
    pub search: Arc<GoogleBooksClient>,
    /// Remote cover downloads
    pub image_fetcher: Arc<ImageFetcher>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: ServiceConfig) -> anyhow::Result<Self> {
        let resolver = MetadataResolver::from_config(config.scrape_enabled)?;
        Ok(Self {
            db,
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            search: Arc::new(GoogleBooksClient::new()?),
            image_fetcher: Arc::new(ImageFetcher::new()?),
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let uploads_dir = state.config.uploads_dir.clone();

    Router::new()
        .merge(api::books::book_routes())
        .merge(api::categories::category_routes())
        .merge(api::stats::stats_routes())
        .merge(api::auth::auth_routes())
        .merge(api::import::import_routes())
        .merge(api::upload::upload_routes())
        .merge(api::health::health_routes())
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
