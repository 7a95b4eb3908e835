//! Farol API - Domain and wire models
//!
//! Shared between the server-side orchestrator and the device update
//! client. JSON field names are compatibility-sensitive: devices in the
//! field parse them, so everything on the wire is snake_case with
//! lowercase enum values.

pub mod model;

pub use model::ota::*;
