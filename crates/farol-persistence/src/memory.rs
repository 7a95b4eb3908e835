//! In-memory persistence implementation
//!
//! Dashmap-backed storage for standalone deployments and tests. Device
//! updates are keyed by (device_id, deployment_id): exactly one live
//! record per device per deployment.

use async_trait::async_trait;
use dashmap::DashMap;

use farol_api::{DeviceUpdate, FirmwareRelease, OtaDeployment, ReleaseChannel, UpdateStatus};

use crate::traits::{DeploymentStats, OtaPersistence};

/// `OtaPersistence` held entirely in process memory
#[derive(Default)]
pub struct InMemoryOtaPersistence {
    releases: DashMap<String, FirmwareRelease>,
    deployments: DashMap<String, OtaDeployment>,
    device_updates: DashMap<(String, String), DeviceUpdate>,
}

impl InMemoryOtaPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtaPersistence for InMemoryOtaPersistence {
    async fn create_release(&self, release: &FirmwareRelease) -> anyhow::Result<()> {
        if self.releases.contains_key(&release.release_id) {
            anyhow::bail!("release {} already exists", release.release_id);
        }
        self.releases
            .insert(release.release_id.clone(), release.clone());
        Ok(())
    }

    async fn get_release(&self, release_id: &str) -> anyhow::Result<Option<FirmwareRelease>> {
        Ok(self.releases.get(release_id).map(|r| r.clone()))
    }

    async fn list_releases(
        &self,
        template_id: &str,
        channel: ReleaseChannel,
    ) -> anyhow::Result<Vec<FirmwareRelease>> {
        let mut releases: Vec<FirmwareRelease> = self
            .releases
            .iter()
            .filter(|r| r.template_id == template_id && r.channel == channel)
            .map(|r| r.clone())
            .collect();
        releases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(releases)
    }

    async fn delete_release(&self, release_id: &str) -> anyhow::Result<()> {
        self.releases.remove(release_id);
        Ok(())
    }

    async fn create_deployment(&self, deployment: &OtaDeployment) -> anyhow::Result<()> {
        if self.deployments.contains_key(&deployment.deployment_id) {
            anyhow::bail!("deployment {} already exists", deployment.deployment_id);
        }
        self.deployments
            .insert(deployment.deployment_id.clone(), deployment.clone());
        Ok(())
    }

    async fn get_deployment(&self, deployment_id: &str) -> anyhow::Result<Option<OtaDeployment>> {
        Ok(self.deployments.get(deployment_id).map(|d| d.clone()))
    }

    async fn update_deployment(&self, deployment: &OtaDeployment) -> anyhow::Result<()> {
        if !self.deployments.contains_key(&deployment.deployment_id) {
            anyhow::bail!("deployment {} not found", deployment.deployment_id);
        }
        self.deployments
            .insert(deployment.deployment_id.clone(), deployment.clone());
        Ok(())
    }

    async fn list_deployments(&self, release_id: &str) -> anyhow::Result<Vec<OtaDeployment>> {
        let mut deployments: Vec<OtaDeployment> = self
            .deployments
            .iter()
            .filter(|d| d.release_id == release_id)
            .map(|d| d.clone())
            .collect();
        deployments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(deployments)
    }

    async fn create_device_update(&self, update: &DeviceUpdate) -> anyhow::Result<()> {
        let key = (update.device_id.clone(), update.deployment_id.clone());
        if self.device_updates.contains_key(&key) {
            anyhow::bail!(
                "device update for device {} in deployment {} already exists",
                update.device_id,
                update.deployment_id
            );
        }
        self.device_updates.insert(key, update.clone());
        Ok(())
    }

    async fn get_device_update(
        &self,
        device_id: &str,
        release_id: &str,
    ) -> anyhow::Result<Option<DeviceUpdate>> {
        Ok(self
            .device_updates
            .iter()
            .filter(|u| u.device_id == device_id && u.release_id == release_id)
            .max_by_key(|u| u.started_at)
            .map(|u| u.clone()))
    }

    async fn update_device_update(&self, update: &DeviceUpdate) -> anyhow::Result<()> {
        let key = (update.device_id.clone(), update.deployment_id.clone());
        if !self.device_updates.contains_key(&key) {
            anyhow::bail!(
                "device update for device {} in deployment {} not found",
                update.device_id,
                update.deployment_id
            );
        }
        self.device_updates.insert(key, update.clone());
        Ok(())
    }

    async fn list_device_updates(&self, deployment_id: &str) -> anyhow::Result<Vec<DeviceUpdate>> {
        Ok(self
            .device_updates
            .iter()
            .filter(|u| u.deployment_id == deployment_id)
            .map(|u| u.clone())
            .collect())
    }

    async fn latest_update_for_device(
        &self,
        device_id: &str,
    ) -> anyhow::Result<Option<DeviceUpdate>> {
        Ok(self
            .device_updates
            .iter()
            .filter(|u| u.device_id == device_id)
            .max_by_key(|u| u.started_at)
            .map(|u| u.clone()))
    }

    async fn deployment_stats(&self, deployment_id: &str) -> anyhow::Result<DeploymentStats> {
        let mut stats = DeploymentStats {
            success: 0,
            failure: 0,
            pending: 0,
        };
        for update in self
            .device_updates
            .iter()
            .filter(|u| u.deployment_id == deployment_id)
        {
            match update.status {
                UpdateStatus::Completed => stats.success += 1,
                UpdateStatus::Failed => stats.failure += 1,
                _ => stats.pending += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn test_release(release_id: &str, channel: ReleaseChannel) -> FirmwareRelease {
        FirmwareRelease {
            release_id: release_id.to_string(),
            template_id: "tmpl-1".to_string(),
            version: "1.0.0".to_string(),
            channel,
            binary_hash: "ab".repeat(32),
            binary_path: format!("{}/firmware.bin", release_id),
            binary_size: 1024,
            signature: "c2ln".to_string(),
            release_notes: String::new(),
            created_at: Utc::now(),
            created_by: "tester".to_string(),
        }
    }

    fn test_update(device_id: &str, deployment_id: &str, status: UpdateStatus) -> DeviceUpdate {
        DeviceUpdate {
            device_id: device_id.to_string(),
            release_id: "rel-1".to_string(),
            deployment_id: deployment_id.to_string(),
            status,
            progress: 0,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_release_create_is_unique() {
        let store = InMemoryOtaPersistence::new();
        let release = test_release("rel-1", ReleaseChannel::Stable);

        store.create_release(&release).await.unwrap();
        assert!(store.create_release(&release).await.is_err());
        assert!(store.get_release("rel-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_releases_newest_first() {
        let store = InMemoryOtaPersistence::new();
        let mut old = test_release("rel-old", ReleaseChannel::Stable);
        old.created_at = Utc::now() - Duration::hours(2);
        let new = test_release("rel-new", ReleaseChannel::Stable);
        let beta = test_release("rel-beta", ReleaseChannel::Beta);

        store.create_release(&old).await.unwrap();
        store.create_release(&new).await.unwrap();
        store.create_release(&beta).await.unwrap();

        let stable = store
            .list_releases("tmpl-1", ReleaseChannel::Stable)
            .await
            .unwrap();
        assert_eq!(stable.len(), 2);
        assert_eq!(stable[0].release_id, "rel-new");
        assert_eq!(stable[1].release_id, "rel-old");
    }

    #[tokio::test]
    async fn test_deployment_stats_counts_in_flight_as_pending() {
        let store = InMemoryOtaPersistence::new();
        for (device, status) in [
            ("dev-1", UpdateStatus::Completed),
            ("dev-2", UpdateStatus::Completed),
            ("dev-3", UpdateStatus::Failed),
            ("dev-4", UpdateStatus::Downloading),
            ("dev-5", UpdateStatus::Pending),
        ] {
            store
                .create_device_update(&test_update(device, "dep-1", status))
                .await
                .unwrap();
        }

        let stats = store.deployment_stats("dep-1").await.unwrap();
        assert_eq!(
            stats,
            DeploymentStats {
                success: 2,
                failure: 1,
                pending: 2
            }
        );
    }

    #[tokio::test]
    async fn test_latest_update_for_device_across_deployments() {
        let store = InMemoryOtaPersistence::new();
        let mut first = test_update("dev-1", "dep-1", UpdateStatus::Failed);
        first.started_at = Utc::now() - Duration::minutes(5);
        let second = test_update("dev-1", "dep-2", UpdateStatus::Pending);

        store.create_device_update(&first).await.unwrap();
        store.create_device_update(&second).await.unwrap();

        let latest = store
            .latest_update_for_device("dev-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.deployment_id, "dep-2");
        assert_eq!(latest.status, UpdateStatus::Pending);
    }

    #[tokio::test]
    async fn test_one_live_update_per_device_per_deployment() {
        let store = InMemoryOtaPersistence::new();
        let update = test_update("dev-1", "dep-1", UpdateStatus::Pending);

        store.create_device_update(&update).await.unwrap();
        assert!(store.create_device_update(&update).await.is_err());

        let mut progressed = update.clone();
        progressed.status = UpdateStatus::Downloading;
        progressed.progress = 40;
        store.update_device_update(&progressed).await.unwrap();

        let stored = store
            .get_device_update("dev-1", "rel-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, UpdateStatus::Downloading);
        assert_eq!(stored.progress, 40);
    }
}
