//! Deployment orchestrator
//!
//! Creates deployments for a release, selects the initial device cohort
//! per rollout strategy, and owns the explicit lifecycle operations
//! (start, pause, resume, rollback).

use chrono::Utc;
use rand::seq::index::sample;
use tracing::{info, warn};
use uuid::Uuid;

use farol_api::{
    DEFAULT_FAILURE_THRESHOLD, DeploymentConfig, DeploymentStatus, DeploymentStatusReport,
    DeploymentStrategy, DeviceUpdate, FirmwareRelease, FirmwareUpdate, OtaDeployment,
    ReleaseChannel, UpdateStatus,
};
use farol_common::FarolError;

use super::OtaService;
use crate::storage::DEFAULT_BINARY_URL_TTL;

impl OtaService {
    /// Create a deployment for a release and initialise its cohort.
    ///
    /// Immediate deployments activate at creation; staged and canary
    /// deployments stay pending until an explicit
    /// [`start_deployment`](OtaService::start_deployment).
    pub async fn deploy_release(
        &self,
        release_id: &str,
        config: &DeploymentConfig,
    ) -> anyhow::Result<OtaDeployment> {
        let release = self.get_release(release_id).await?;

        let failure_threshold = validate_deployment_config(config)?;

        let target_devices = self.determine_target_devices(&release, config).await?;
        if target_devices.is_empty() {
            return Err(FarolError::NoTargetDevices.into());
        }

        let now = Utc::now();
        let mut deployment = OtaDeployment {
            deployment_id: Uuid::new_v4().to_string(),
            release_id: release_id.to_string(),
            strategy: config.strategy,
            target_devices,
            rollout_percentage: config.rollout_percentage,
            status: DeploymentStatus::Pending,
            failure_threshold,
            success_count: 0,
            failure_count: 0,
            created_at: now,
            updated_at: now,
        };

        self.persistence.create_deployment(&deployment).await?;

        let cohort = self.select_cohort(&deployment);
        for device_id in &cohort {
            let update = DeviceUpdate {
                device_id: device_id.clone(),
                release_id: deployment.release_id.clone(),
                deployment_id: deployment.deployment_id.clone(),
                status: UpdateStatus::Pending,
                progress: 0,
                error_message: None,
                started_at: Utc::now(),
                completed_at: None,
            };
            if let Err(e) = self.persistence.create_device_update(&update).await {
                warn!(device_id = %device_id, error = %e, "Failed to create device update");
            }
        }

        if deployment.strategy == DeploymentStrategy::Immediate {
            deployment.status = DeploymentStatus::Active;
            deployment.updated_at = Utc::now();
            self.persistence.update_deployment(&deployment).await?;
        }

        info!(
            deployment_id = %deployment.deployment_id,
            release_id,
            strategy = %deployment.strategy,
            target_devices = deployment.target_devices.len(),
            cohort = cohort.len(),
            "Created deployment"
        );

        Ok(deployment)
    }

    async fn determine_target_devices(
        &self,
        release: &FirmwareRelease,
        config: &DeploymentConfig,
    ) -> anyhow::Result<Vec<String>> {
        if !config.target_devices.is_empty() {
            return Ok(config.target_devices.clone());
        }
        self.registry
            .list_devices(&release.template_id, release.channel)
            .await
    }

    /// Select the devices that receive the update in the initial rollout
    /// step. Staged rollouts take a stable-order prefix; canary rollouts
    /// draw a random sample of the same size, without replacement.
    fn select_cohort(&self, deployment: &OtaDeployment) -> Vec<String> {
        let targets = &deployment.target_devices;
        match deployment.strategy {
            DeploymentStrategy::Immediate => targets.clone(),
            DeploymentStrategy::Staged => {
                let n = cohort_size(targets.len(), deployment.rollout_percentage.unwrap_or(100));
                targets[..n].to_vec()
            }
            DeploymentStrategy::Canary => {
                let n = cohort_size(targets.len(), deployment.rollout_percentage.unwrap_or(100));
                let mut rng = self.canary_rng.lock();
                sample(&mut *rng, targets.len(), n)
                    .into_iter()
                    .map(|i| targets[i].clone())
                    .collect()
            }
        }
    }

    pub async fn get_deployment(&self, deployment_id: &str) -> anyhow::Result<OtaDeployment> {
        self.persistence
            .get_deployment(deployment_id)
            .await?
            .ok_or_else(|| FarolError::NotFound("deployment", deployment_id.to_string()).into())
    }

    /// Activate a pending staged or canary deployment
    pub async fn start_deployment(&self, deployment_id: &str) -> anyhow::Result<()> {
        self.transition(
            deployment_id,
            "start",
            DeploymentStatus::Pending,
            DeploymentStatus::Active,
        )
        .await
    }

    /// Pause an active deployment
    pub async fn pause_deployment(&self, deployment_id: &str) -> anyhow::Result<()> {
        self.transition(
            deployment_id,
            "pause",
            DeploymentStatus::Active,
            DeploymentStatus::Paused,
        )
        .await
    }

    /// Resume a paused deployment
    pub async fn resume_deployment(&self, deployment_id: &str) -> anyhow::Result<()> {
        self.transition(
            deployment_id,
            "resume",
            DeploymentStatus::Paused,
            DeploymentStatus::Active,
        )
        .await
    }

    async fn transition(
        &self,
        deployment_id: &str,
        action: &'static str,
        from: DeploymentStatus,
        to: DeploymentStatus,
    ) -> anyhow::Result<()> {
        let mut deployment = self.get_deployment(deployment_id).await?;

        if deployment.status != from {
            return Err(FarolError::InvalidStateTransition {
                action,
                status: deployment.status.to_string(),
            }
            .into());
        }

        deployment.status = to;
        deployment.updated_at = Utc::now();
        self.persistence.update_deployment(&deployment).await?;

        info!(deployment_id, status = %to, "Deployment transitioned");
        Ok(())
    }

    /// Roll a failing deployment back to the previous stable release.
    ///
    /// The current deployment is marked failed first; only then is the
    /// rollback deployment attempted, so a failure in the second step
    /// still leaves the original correctly marked. The rollback targets
    /// the original full target list, not just the cohort that was
    /// reached.
    pub async fn rollback_deployment(&self, deployment_id: &str) -> anyhow::Result<OtaDeployment> {
        let mut deployment = self.get_deployment(deployment_id).await?;
        let release = self.get_release(&deployment.release_id).await?;

        // Stable-channel releases are listed newest first, so the first
        // one strictly older than the failing release is the rollback
        // candidate.
        let previous = self
            .persistence
            .list_releases(&release.template_id, ReleaseChannel::Stable)
            .await?
            .into_iter()
            .find(|r| r.release_id != release.release_id && r.created_at < release.created_at)
            .ok_or(FarolError::NoPreviousRelease)?;

        deployment.status = DeploymentStatus::Failed;
        deployment.updated_at = Utc::now();
        self.persistence.update_deployment(&deployment).await?;

        let rollback_config = DeploymentConfig {
            strategy: DeploymentStrategy::Immediate,
            target_devices: deployment.target_devices.clone(),
            rollout_percentage: Some(100),
            failure_threshold: Some(deployment.failure_threshold),
        };

        let rollback = self
            .deploy_release(&previous.release_id, &rollback_config)
            .await?;

        info!(
            original_deployment_id = deployment_id,
            rollback_deployment_id = %rollback.deployment_id,
            previous_release_id = %previous.release_id,
            "Rolled back deployment"
        );

        Ok(rollback)
    }

    /// Resolve the pending update for a polling device, if any.
    ///
    /// Returns `None` when the device has no update record or its latest
    /// record is past pending; the HTTP layer maps that onto 404.
    pub async fn update_for_device(
        &self,
        device_id: &str,
    ) -> anyhow::Result<Option<FirmwareUpdate>> {
        let Some(update) = self.persistence.latest_update_for_device(device_id).await? else {
            return Ok(None);
        };
        if update.status != UpdateStatus::Pending {
            return Ok(None);
        }

        let release = self.get_release(&update.release_id).await?;

        let binary_url = self
            .storage
            .binary_url(&release.binary_path, DEFAULT_BINARY_URL_TTL)
            .await
            .map_err(|e| FarolError::Storage(e.to_string()))?;

        Ok(Some(FirmwareUpdate {
            release_id: release.release_id,
            version: release.version,
            binary_url,
            binary_hash: release.binary_hash,
            binary_size: release.binary_size,
            signature: release.signature,
            release_notes: release.release_notes,
            created_at: release.created_at,
        }))
    }

    /// Aggregate per-device update counts for a deployment
    pub async fn get_deployment_status(
        &self,
        deployment_id: &str,
    ) -> anyhow::Result<DeploymentStatusReport> {
        let deployment = self.get_deployment(deployment_id).await?;
        let updates = self.persistence.list_device_updates(deployment_id).await?;

        let mut pending = 0;
        let mut downloading = 0;
        let mut installing = 0;
        let mut completed = 0;
        let mut failed = 0;
        for update in &updates {
            match update.status {
                UpdateStatus::Pending => pending += 1,
                UpdateStatus::Downloading => downloading += 1,
                UpdateStatus::Installing => installing += 1,
                UpdateStatus::Completed => completed += 1,
                UpdateStatus::Failed => failed += 1,
            }
        }

        let total_devices = deployment.target_devices.len() as i32;
        let progress_percentage = if total_devices > 0 {
            completed * 100 / total_devices
        } else {
            0
        };

        Ok(DeploymentStatusReport {
            deployment_id: deployment.deployment_id,
            release_id: deployment.release_id,
            status: deployment.status,
            strategy: deployment.strategy,
            total_devices,
            pending_count: pending,
            downloading_count: downloading,
            installing_count: installing,
            completed_count: completed,
            failed_count: failed,
            progress_percentage,
            created_at: deployment.created_at,
            updated_at: deployment.updated_at,
        })
    }
}

/// Validate a deployment config, returning the effective failure
/// threshold
fn validate_deployment_config(config: &DeploymentConfig) -> anyhow::Result<i32> {
    if matches!(
        config.strategy,
        DeploymentStrategy::Staged | DeploymentStrategy::Canary
    ) {
        match config.rollout_percentage {
            Some(p) if (1..=100).contains(&p) => {}
            _ => {
                return Err(FarolError::Configuration(
                    "rollout percentage must be between 1 and 100".to_string(),
                )
                .into());
            }
        }
    }

    Ok(config.failure_threshold.unwrap_or(DEFAULT_FAILURE_THRESHOLD))
}

/// Cohort size for a percentage rollout: never zero, never larger than
/// the target set
fn cohort_size(total: usize, percentage: i32) -> usize {
    std::cmp::max(1, total * percentage as usize / 100)
}
