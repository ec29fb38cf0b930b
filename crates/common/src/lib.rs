pub mod config;
pub mod error;
pub mod persist;
pub mod types;
