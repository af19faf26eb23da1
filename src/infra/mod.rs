//! Infrastructure adapters: telemetry and the HTTP surface.

pub mod error;
pub mod http;
pub mod telemetry;
