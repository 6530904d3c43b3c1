pub mod config;
pub mod error;
pub mod insertion;
pub mod telemetry;
