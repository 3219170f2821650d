//! Cucumber support code


pub use world::*;
