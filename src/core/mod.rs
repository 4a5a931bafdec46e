pub mod config;
pub mod error;

pub use config::{CheckConfig, MapConfig, OverlapConfig, OverlapIndex};
pub use error::{CheckError, Result};
