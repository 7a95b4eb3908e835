//! OTA persistence trait
//!
//! Defines the storage interface for firmware releases, deployments, and
//! per-device update records. Deployment counters are derived data: they
//! are recomputed from the DeviceUpdate set via `deployment_stats`, never
//! trusted from the deployment row itself.

use async_trait::async_trait;

use farol_api::{DeviceUpdate, FirmwareRelease, OtaDeployment, ReleaseChannel};

/// Derived per-deployment counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentStats {
    /// Device updates that completed successfully
    pub success: i32,
    /// Device updates that failed
    pub failure: i32,
    /// Device updates still in flight (pending, downloading, installing)
    pub pending: i32,
}

/// Storage operations for the OTA deployment domain
#[async_trait]
pub trait OtaPersistence: Send + Sync {
    // Firmware release operations

    /// Persist a new release; fails if the release_id already exists
    async fn create_release(&self, release: &FirmwareRelease) -> anyhow::Result<()>;

    async fn get_release(&self, release_id: &str) -> anyhow::Result<Option<FirmwareRelease>>;

    /// List releases for a template and channel, newest first
    async fn list_releases(
        &self,
        template_id: &str,
        channel: ReleaseChannel,
    ) -> anyhow::Result<Vec<FirmwareRelease>>;

    async fn delete_release(&self, release_id: &str) -> anyhow::Result<()>;

    // Deployment operations

    /// Persist a new deployment; fails if the deployment_id already exists
    async fn create_deployment(&self, deployment: &OtaDeployment) -> anyhow::Result<()>;

    async fn get_deployment(&self, deployment_id: &str) -> anyhow::Result<Option<OtaDeployment>>;

    async fn update_deployment(&self, deployment: &OtaDeployment) -> anyhow::Result<()>;

    /// List deployments for a release, newest first
    async fn list_deployments(&self, release_id: &str) -> anyhow::Result<Vec<OtaDeployment>>;

    // Device update operations

    async fn create_device_update(&self, update: &DeviceUpdate) -> anyhow::Result<()>;

    /// Most recent update record for (device, release)
    async fn get_device_update(
        &self,
        device_id: &str,
        release_id: &str,
    ) -> anyhow::Result<Option<DeviceUpdate>>;

    async fn update_device_update(&self, update: &DeviceUpdate) -> anyhow::Result<()>;

    async fn list_device_updates(&self, deployment_id: &str) -> anyhow::Result<Vec<DeviceUpdate>>;

    /// Most recently started update record for a device, across
    /// deployments. This is the query a polling device resolves against.
    async fn latest_update_for_device(
        &self,
        device_id: &str,
    ) -> anyhow::Result<Option<DeviceUpdate>>;

    /// Recompute success/failure/pending counters from the deployment's
    /// full DeviceUpdate set
    async fn deployment_stats(&self, deployment_id: &str) -> anyhow::Result<DeploymentStats>;
}
