//! Shared library for the biblio services
//!
//! Holds the canonical data models, the common error type, configuration
//! loading and database initialization used by the API binary.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
