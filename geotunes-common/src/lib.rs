//! # GeoTunes Common Library
//!
//! Shared code for GeoTunes services:
//! - Common error type
//! - TOML configuration loading, writing and path resolution
//! - Credential resolution (environment → TOML)

pub mod config;
pub mod error;

pub use error::{Error, Result};
