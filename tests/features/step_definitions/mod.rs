//! Step definitions for Cucumber scenarios

pub mod secrets_steps;
