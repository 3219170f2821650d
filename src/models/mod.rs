//! Data models

mod hostname;
mod mode;
mod secret;
mod verdict;

pub use hostname::*;
pub use mode::*;
pub use secret::*;
pub use verdict::*;
