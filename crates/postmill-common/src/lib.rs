//! postmill-common: Shared error type and configuration used across all postmill crates.

pub mod error;
pub mod config;

// Re-export commonly used types
pub use config::{Config, ContentMode, FetchConfig, IngestionConfig};
pub use error::{PostmillError, Result};
