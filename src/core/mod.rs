//! Core module - shared infrastructure for Atelier
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the application.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, Strategy};
pub use error::{AtelierError, Result};
pub use types::*;
