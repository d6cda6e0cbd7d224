//! Shelfcrawl: a storefront listing crawler
//!
//! This crate discovers record identifiers from infinite-scroll storefront
//! listings through a remote-controlled browser session, then enriches each
//! identifier from per-source detail pages and persists the results
//! incrementally, so an interrupted crawl can be re-run without duplication
//! or loss.

pub mod config;
pub mod crawler;
pub mod render;
pub mod sources;
pub mod store;

use thiserror::Error;

/// Main error type for shelfcrawl operations
#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render service error: {0}")]
    Render(#[from] render::RenderError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Configuration-specific errors
///
/// These are the only errors allowed to terminate the process; everything
/// downstream of startup is contained at its unit of work.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for shelfcrawl operations
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use render::{ElementHandle, RenderError, RenderSession};
pub use store::{FieldBag, FieldValue, RecordStore, SqliteStore};
