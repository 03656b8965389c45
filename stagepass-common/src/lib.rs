//! # Stagepass Common Library
//!
//! Shared code for the Stagepass services:
//! - Error and result types
//! - Configuration loading (CLI > ENV > TOML > compiled defaults)
//! - Database initialization, migrations and the settings table
//! - API token hashing
//! - Timestamp utilities

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
