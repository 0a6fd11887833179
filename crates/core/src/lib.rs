//! SmartFind Core Library
//!
//! This crate provides the foundational utilities shared by the SmartFind
//! engine and CLI:
//! - Error handling (`AppError`, `AppResult`, `LoadError`)
//! - Logging infrastructure
//! - Application configuration

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult, LoadError};
