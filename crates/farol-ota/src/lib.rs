//! Farol OTA - Firmware deployment core
//!
//! This crate implements the server side of the OTA subsystem:
//! - the deployment orchestrator (cohort selection per rollout strategy)
//! - the rollout health monitor (per-device status ingestion, automatic
//!   rollback of failing releases)
//! - the release lifecycle (signing, storage, verification)
//! - the HTTP API consumed by operators and by devices in the field
//!
//! The device registry and the binary storage backend are collaborator
//! traits; local implementations are provided for standalone
//! deployments and tests.

pub mod api;
pub mod registry;
pub mod service;
pub mod storage;

pub use registry::{DeviceRegistry, StaticDeviceRegistry};
pub use service::OtaService;
pub use storage::{LocalStorageBackend, StorageBackend};
