//! Parkchat Common - Shared types and utilities for the Parkchat assistant backend.
//!
//! This crate provides:
//! - Configuration types and environment loading
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AgentCacheConfig, CacheConfig, Config, LoggingConfig, SessionConfig};
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{AgentCacheConfig, CacheConfig, Config, SessionConfig};
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
}
