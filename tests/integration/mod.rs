//! Integration tests for the stack installer
//!
//! Reconciliation runs against temporary project directories; readiness
//! passes run against mock probes, and the HTTP status probe against a local
//! mock server.

mod binary_tests;
mod installer_tests;
mod probe_tests;
