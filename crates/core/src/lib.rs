pub mod config;
pub mod error;

pub use config::{Config, HttpConfig, RunConfig};
pub use error::*;
