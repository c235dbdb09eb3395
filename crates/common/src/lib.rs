//! Shared types, ports, config, and error definitions for beachcast.

pub mod config;
pub mod error;
pub mod ports;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, ProviderError, ProviderErrorKind};
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
