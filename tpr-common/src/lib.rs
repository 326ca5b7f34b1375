//! # TPR Common Library
//!
//! Shared code for the session replay tools:
//! - Common error type
//! - Configuration file discovery and recording directory resolution
//! - Human-readable playback position formatting

pub mod config;
pub mod error;
pub mod human_time;

pub use error::{Error, Result};
