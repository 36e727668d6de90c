//! biblio-api - Book catalog REST service
//!
//! Backs the single-page client with book/category CRUD, ISBN metadata
//! resolution, spreadsheet import/export, cover/avatar uploads, statistics
//! and multi-user authentication.

use anyhow::Result;
use biblio_common::config::ServiceConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use biblio_api::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting biblio-api");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load()?;
    info!("Database: {}", config.database_path.display());
    info!("Uploads: {}", config.uploads_dir.display());

    std::fs::create_dir_all(config.uploads_dir.join("covers"))?;

    let db_pool = biblio_common::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(db_pool, config)?;
    let app = biblio_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
