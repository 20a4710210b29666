//! # SongVault Common Library
//!
//! Shared code for the SongVault content library:
//! - Common error type
//! - Content root resolution and canonical folder layout
//! - Database initialization and schema

pub mod config;
pub mod db;
pub mod error;

pub use config::{AssetType, ContentLayout};
pub use error::{Error, Result};
