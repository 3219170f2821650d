//! Common test utilities and helpers
//!
//! This module provides shared test infrastructure including:
//! - Temporary project directories with a ready-made configuration
//! - Mock network probes and resolvers

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
