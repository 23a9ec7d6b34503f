pub mod config;
pub mod domain;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod runner;
pub mod server;
pub mod telemetry;

pub use error::LoadError;
