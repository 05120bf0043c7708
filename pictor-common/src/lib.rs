//! # Pictor Common Library
//!
//! Shared code for Pictor asset management services including:
//! - Common error types
//! - Event types (TaggingEvent enum) and the broadcast event bus
//! - Configuration loading and root folder resolution

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
