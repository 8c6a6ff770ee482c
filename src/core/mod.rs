pub mod config;
pub mod data;
pub mod errors;

pub use config::EngineConfig;
pub use data::*; // Re-export common data types
pub use errors::*;
