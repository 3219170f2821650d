//! Shared utilities

pub mod error;
pub mod fs;
pub mod validation;

pub use error::{InstallerError, InstallerResult};
