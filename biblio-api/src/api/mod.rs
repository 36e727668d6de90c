//! HTTP API handlers

pub mod auth;
pub mod books;
pub mod categories;
pub mod health;
pub mod import;
pub mod stats;
pub mod upload;

pub use auth::auth_routes;
pub use books::book_routes;
pub use categories::category_routes;
pub use health::health_routes;
pub use import::import_routes;
pub use stats::stats_routes;
pub use upload::upload_routes;
