#[macro_use]
pub mod errors;
pub mod config;

pub use config::*;
pub use errors::{LaunchpadError, LaunchpadErrorExt, LaunchpadResult};
