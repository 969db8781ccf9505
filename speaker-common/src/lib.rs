//! # Speaker Common Library
//!
//! Shared code for the speaker receiver binaries:
//! - Configuration file discovery and TOML loading
//! - Logging initialisation
//! - Common error type

pub mod config;
pub mod error;
pub mod logging;

pub use config::LoggingConfig;
pub use error::{Error, Result};
