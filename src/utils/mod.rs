// src/utils/mod.rs
//! Shared utilities: configuration loading and error types

pub mod config;
pub mod errors;

pub use config::RedirectorConfig;
pub use errors::{RedirectorError, Result, ValidationError};
