//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod http_backend;
pub mod memory;
pub mod telemetry;
pub mod wire;
