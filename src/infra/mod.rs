//! Adapters to the outside world: filesystem stores, HTTP, telemetry.

pub mod error;
pub mod http;
pub mod storage;
pub mod telemetry;
