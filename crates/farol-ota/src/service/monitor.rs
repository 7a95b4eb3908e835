//! Rollout health monitor
//!
//! Ingests per-device status reports, recomputes deployment-level
//! counters from the full DeviceUpdate set, decides terminal deployment
//! state, and triggers automatic rollback the moment a failing release
//! crosses its failure threshold. The reaction is mid-rollout, not a
//! wait-until-done check: that is what contains a bad release before it
//! reaches every device.

use chrono::Utc;
use tracing::{info, warn};

use farol_api::{DeploymentStatus, UpdateStatus, UpdateStatusReport};
use farol_common::FarolError;

use super::OtaService;

impl OtaService {
    /// Apply a device's status report and react to the deployment-level
    /// consequences.
    ///
    /// Reports for the same deployment are serialised through a
    /// per-deployment lock held across the read-modify-write, so
    /// concurrent device reports cannot lose counter updates. Re-sending
    /// the same report is safe: the recomputation converges to the same
    /// state.
    pub async fn report_update_status(&self, report: &UpdateStatusReport) -> anyhow::Result<()> {
        let update = self
            .persistence
            .get_device_update(&report.device_id, &report.release_id)
            .await?
            .ok_or_else(|| {
                FarolError::NotFound(
                    "device update",
                    format!("{}/{}", report.device_id, report.release_id),
                )
            })?;

        let lock = self.deployment_lock(&update.deployment_id);
        let _guard = lock.lock().await;

        let mut update = update;
        update.status = report.status;
        update.progress = report.progress;
        update.error_message = report.error_message.clone();
        if report.status.is_terminal() {
            update.completed_at = Some(Utc::now());
        }
        self.persistence.update_device_update(&update).await?;

        let deployment_status = self.recompute_deployment(&update.deployment_id).await?;

        info!(
            device_id = %report.device_id,
            release_id = %report.release_id,
            status = %report.status,
            "Updated device update status"
        );

        // A failure report against a still-active deployment may breach
        // the failure threshold and trigger containment.
        if report.status == UpdateStatus::Failed
            && deployment_status == Some(DeploymentStatus::Active)
        {
            if let Err(e) = self.check_failure_threshold(&update.deployment_id).await {
                warn!(
                    deployment_id = %update.deployment_id,
                    error = %e,
                    "Failed to handle deployment failures"
                );
            }
        }

        Ok(())
    }

    /// Recompute deployment counters from the DeviceUpdate set and
    /// settle terminal state once no device remains in flight. Returns
    /// the deployment status after the write, or `None` if the
    /// deployment row is gone.
    async fn recompute_deployment(
        &self,
        deployment_id: &str,
    ) -> anyhow::Result<Option<DeploymentStatus>> {
        let Some(mut deployment) = self.persistence.get_deployment(deployment_id).await? else {
            warn!(deployment_id, "Deployment missing while updating stats");
            return Ok(None);
        };

        let stats = self.persistence.deployment_stats(deployment_id).await?;
        deployment.success_count = stats.success;
        deployment.failure_count = stats.failure;
        deployment.updated_at = Utc::now();

        if stats.pending == 0 {
            // A mixed result still counts as completed; only a fully
            // failed cohort fails the deployment.
            deployment.status = if stats.failure > 0 && stats.success == 0 {
                DeploymentStatus::Failed
            } else {
                DeploymentStatus::Completed
            };
        }

        self.persistence.update_deployment(&deployment).await?;
        Ok(Some(deployment.status))
    }

    /// Trigger automatic rollback when the failure rate of an active
    /// deployment reaches its threshold
    async fn check_failure_threshold(&self, deployment_id: &str) -> anyhow::Result<()> {
        let deployment = self.get_deployment(deployment_id).await?;

        if deployment.status != DeploymentStatus::Active {
            return Ok(());
        }

        let total_attempts = deployment.success_count + deployment.failure_count;
        if total_attempts == 0 {
            return Ok(());
        }

        let failure_rate = deployment.failure_count * 100 / total_attempts;
        if failure_rate >= deployment.failure_threshold {
            warn!(
                deployment_id,
                failure_rate,
                threshold = deployment.failure_threshold,
                "Failure threshold exceeded, triggering automatic rollback"
            );
            self.rollback_deployment(deployment_id).await?;
        }

        Ok(())
    }
}
