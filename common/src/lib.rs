//! Common utilities shared across the address risk workspace
//!
//! This crate provides functionality used by both the engine and the domain
//! crate:
//!
//! - Layered YAML configuration with `!include` composition
//! - Shared test utilities and assertion helpers

pub mod config;
pub mod yaml_include;

// Test helpers module - available for both development and test builds
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

#[cfg(any(test, feature = "test-helpers"))]
pub use test_helpers::{generate_unique_id, write_temp_file};
