pub mod backoffice;
pub mod config;
pub mod error;
pub mod extraction;
pub mod flows;
pub mod mapping;
pub mod telemetry;
