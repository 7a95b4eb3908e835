//! OTA service layer
//!
//! `OtaService` owns the release lifecycle, the deployment orchestrator,
//! and the rollout health monitor. All methods execute synchronously
//! within the handling request; there is no background scan over active
//! deployments, so a deployment whose devices stop reporting never
//! reaches a terminal state on its own.

pub mod deployment;
pub mod monitor;
pub mod release;

use std::sync::Arc;

use dashmap::DashMap;
use rand::{SeedableRng, rngs::StdRng};

use farol_common::ReleaseSigner;
use farol_persistence::OtaPersistence;

use crate::registry::DeviceRegistry;
use crate::storage::StorageBackend;

pub struct OtaService {
    persistence: Arc<dyn OtaPersistence>,
    registry: Arc<dyn DeviceRegistry>,
    storage: Arc<dyn StorageBackend>,
    signer: Arc<ReleaseSigner>,
    /// Randomness source for canary sampling; seedable so tests can
    /// assert exact cohort membership
    canary_rng: parking_lot::Mutex<StdRng>,
    /// Serialises status-report processing per deployment so concurrent
    /// device reports cannot lose counter updates
    deployment_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl OtaService {
    pub fn new(
        persistence: Arc<dyn OtaPersistence>,
        registry: Arc<dyn DeviceRegistry>,
        storage: Arc<dyn StorageBackend>,
        signer: Arc<ReleaseSigner>,
    ) -> Self {
        Self {
            persistence,
            registry,
            storage,
            signer,
            canary_rng: parking_lot::Mutex::new(StdRng::from_entropy()),
            deployment_locks: DashMap::new(),
        }
    }

    /// Like [`OtaService::new`] but with deterministic canary sampling
    pub fn with_canary_seed(
        persistence: Arc<dyn OtaPersistence>,
        registry: Arc<dyn DeviceRegistry>,
        storage: Arc<dyn StorageBackend>,
        signer: Arc<ReleaseSigner>,
        seed: u64,
    ) -> Self {
        Self {
            canary_rng: parking_lot::Mutex::new(StdRng::seed_from_u64(seed)),
            ..Self::new(persistence, registry, storage, signer)
        }
    }

    fn deployment_lock(&self, deployment_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.deployment_locks
            .entry(deployment_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
