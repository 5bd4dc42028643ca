//! # Lens Config
//!
//! Where metrics-lens keeps its files and how it is configured.
//!
//! This crate provides:
//! - The data directory layout (`~/.metrics-lens`, logs, settings file)
//! - [`LensSettings`], persisted as JSON, with defaults for anything missing

pub mod data_directory;
pub mod errors;
pub mod settings;

pub use data_directory::DataDirectory;
pub use errors::{ConfigError, Result};
pub use settings::{LensSettings, get_or_create_settings, read_settings};
