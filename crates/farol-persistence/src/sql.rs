//! SQL persistence implementation
//!
//! Implements `OtaPersistence` on top of sea-orm for MySQL/PostgreSQL
//! deployments.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use farol_api::{DeviceUpdate, FirmwareRelease, OtaDeployment, ReleaseChannel, UpdateStatus};

use crate::entity::{device_update, firmware_release, ota_deployment};
use crate::traits::{DeploymentStats, OtaPersistence};

/// `OtaPersistence` backed by an external SQL database
pub struct ExternalDbOtaPersistence {
    db: DatabaseConnection,
}

impl ExternalDbOtaPersistence {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OtaPersistence for ExternalDbOtaPersistence {
    async fn create_release(&self, release: &FirmwareRelease) -> anyhow::Result<()> {
        let existing = firmware_release::Entity::find()
            .filter(firmware_release::Column::ReleaseId.eq(&release.release_id))
            .count(&self.db)
            .await?;
        if existing > 0 {
            anyhow::bail!("release {} already exists", release.release_id);
        }

        firmware_release::ActiveModel {
            release_id: Set(release.release_id.clone()),
            template_id: Set(release.template_id.clone()),
            version: Set(release.version.clone()),
            channel: Set(release.channel.as_str().to_string()),
            binary_hash: Set(release.binary_hash.clone()),
            binary_path: Set(release.binary_path.clone()),
            binary_size: Set(release.binary_size),
            signature: Set(release.signature.clone()),
            release_notes: Set(release.release_notes.clone()),
            created_at: Set(release.created_at),
            created_by: Set(release.created_by.clone()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(())
    }

    async fn get_release(&self, release_id: &str) -> anyhow::Result<Option<FirmwareRelease>> {
        firmware_release::Entity::find()
            .filter(firmware_release::Column::ReleaseId.eq(release_id))
            .one(&self.db)
            .await?
            .map(release_from_model)
            .transpose()
    }

    async fn list_releases(
        &self,
        template_id: &str,
        channel: ReleaseChannel,
    ) -> anyhow::Result<Vec<FirmwareRelease>> {
        firmware_release::Entity::find()
            .filter(firmware_release::Column::TemplateId.eq(template_id))
            .filter(firmware_release::Column::Channel.eq(channel.as_str()))
            .order_by_desc(firmware_release::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(release_from_model)
            .collect()
    }

    async fn delete_release(&self, release_id: &str) -> anyhow::Result<()> {
        firmware_release::Entity::delete_many()
            .filter(firmware_release::Column::ReleaseId.eq(release_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn create_deployment(&self, deployment: &OtaDeployment) -> anyhow::Result<()> {
        ota_deployment::ActiveModel {
            deployment_id: Set(deployment.deployment_id.clone()),
            release_id: Set(deployment.release_id.clone()),
            strategy: Set(deployment.strategy.as_str().to_string()),
            target_devices: Set(serde_json::to_string(&deployment.target_devices)?),
            rollout_percentage: Set(deployment.rollout_percentage),
            status: Set(deployment.status.as_str().to_string()),
            failure_threshold: Set(deployment.failure_threshold),
            success_count: Set(deployment.success_count),
            failure_count: Set(deployment.failure_count),
            created_at: Set(deployment.created_at),
            updated_at: Set(deployment.updated_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(())
    }

    async fn get_deployment(&self, deployment_id: &str) -> anyhow::Result<Option<OtaDeployment>> {
        ota_deployment::Entity::find()
            .filter(ota_deployment::Column::DeploymentId.eq(deployment_id))
            .one(&self.db)
            .await?
            .map(deployment_from_model)
            .transpose()
    }

    async fn update_deployment(&self, deployment: &OtaDeployment) -> anyhow::Result<()> {
        let model = ota_deployment::Entity::find()
            .filter(ota_deployment::Column::DeploymentId.eq(&deployment.deployment_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("deployment {} not found", deployment.deployment_id))?;

        let mut active = model.into_active_model();
        active.status = Set(deployment.status.as_str().to_string());
        active.success_count = Set(deployment.success_count);
        active.failure_count = Set(deployment.failure_count);
        active.updated_at = Set(deployment.updated_at);
        active.update(&self.db).await?;

        Ok(())
    }

    async fn list_deployments(&self, release_id: &str) -> anyhow::Result<Vec<OtaDeployment>> {
        ota_deployment::Entity::find()
            .filter(ota_deployment::Column::ReleaseId.eq(release_id))
            .order_by_desc(ota_deployment::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(deployment_from_model)
            .collect()
    }

    async fn create_device_update(&self, update: &DeviceUpdate) -> anyhow::Result<()> {
        device_update::ActiveModel {
            device_id: Set(update.device_id.clone()),
            release_id: Set(update.release_id.clone()),
            deployment_id: Set(update.deployment_id.clone()),
            status: Set(update.status.as_str().to_string()),
            progress: Set(update.progress),
            error_message: Set(update.error_message.clone()),
            started_at: Set(update.started_at),
            completed_at: Set(update.completed_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(())
    }

    async fn get_device_update(
        &self,
        device_id: &str,
        release_id: &str,
    ) -> anyhow::Result<Option<DeviceUpdate>> {
        device_update::Entity::find()
            .filter(device_update::Column::DeviceId.eq(device_id))
            .filter(device_update::Column::ReleaseId.eq(release_id))
            .order_by_desc(device_update::Column::StartedAt)
            .one(&self.db)
            .await?
            .map(device_update_from_model)
            .transpose()
    }

    async fn update_device_update(&self, update: &DeviceUpdate) -> anyhow::Result<()> {
        let model = device_update::Entity::find()
            .filter(device_update::Column::DeviceId.eq(&update.device_id))
            .filter(device_update::Column::DeploymentId.eq(&update.deployment_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "device update for device {} in deployment {} not found",
                    update.device_id,
                    update.deployment_id
                )
            })?;

        let mut active = model.into_active_model();
        active.status = Set(update.status.as_str().to_string());
        active.progress = Set(update.progress);
        active.error_message = Set(update.error_message.clone());
        active.completed_at = Set(update.completed_at);
        active.update(&self.db).await?;

        Ok(())
    }

    async fn list_device_updates(&self, deployment_id: &str) -> anyhow::Result<Vec<DeviceUpdate>> {
        device_update::Entity::find()
            .filter(device_update::Column::DeploymentId.eq(deployment_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(device_update_from_model)
            .collect()
    }

    async fn latest_update_for_device(
        &self,
        device_id: &str,
    ) -> anyhow::Result<Option<DeviceUpdate>> {
        device_update::Entity::find()
            .filter(device_update::Column::DeviceId.eq(device_id))
            .order_by_desc(device_update::Column::StartedAt)
            .one(&self.db)
            .await?
            .map(device_update_from_model)
            .transpose()
    }

    async fn deployment_stats(&self, deployment_id: &str) -> anyhow::Result<DeploymentStats> {
        // Execute the three counts concurrently to reduce latency
        let (success, failure, pending) = tokio::join!(
            device_update::Entity::find()
                .filter(device_update::Column::DeploymentId.eq(deployment_id))
                .filter(device_update::Column::Status.eq(UpdateStatus::Completed.as_str()))
                .count(&self.db),
            device_update::Entity::find()
                .filter(device_update::Column::DeploymentId.eq(deployment_id))
                .filter(device_update::Column::Status.eq(UpdateStatus::Failed.as_str()))
                .count(&self.db),
            device_update::Entity::find()
                .filter(device_update::Column::DeploymentId.eq(deployment_id))
                .filter(device_update::Column::Status.is_not_in([
                    UpdateStatus::Completed.as_str(),
                    UpdateStatus::Failed.as_str(),
                ]))
                .count(&self.db),
        );

        Ok(DeploymentStats {
            success: success? as i32,
            failure: failure? as i32,
            pending: pending? as i32,
        })
    }
}

fn release_from_model(model: firmware_release::Model) -> anyhow::Result<FirmwareRelease> {
    Ok(FirmwareRelease {
        release_id: model.release_id,
        template_id: model.template_id,
        version: model.version,
        channel: model.channel.parse().map_err(anyhow::Error::msg)?,
        binary_hash: model.binary_hash,
        binary_path: model.binary_path,
        binary_size: model.binary_size,
        signature: model.signature,
        release_notes: model.release_notes,
        created_at: model.created_at,
        created_by: model.created_by,
    })
}

fn deployment_from_model(model: ota_deployment::Model) -> anyhow::Result<OtaDeployment> {
    Ok(OtaDeployment {
        deployment_id: model.deployment_id,
        release_id: model.release_id,
        strategy: model.strategy.parse().map_err(anyhow::Error::msg)?,
        target_devices: serde_json::from_str(&model.target_devices)?,
        rollout_percentage: model.rollout_percentage,
        status: model.status.parse().map_err(anyhow::Error::msg)?,
        failure_threshold: model.failure_threshold,
        success_count: model.success_count,
        failure_count: model.failure_count,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn device_update_from_model(model: device_update::Model) -> anyhow::Result<DeviceUpdate> {
    Ok(DeviceUpdate {
        device_id: model.device_id,
        release_id: model.release_id,
        deployment_id: model.deployment_id,
        status: model.status.parse().map_err(anyhow::Error::msg)?,
        progress: model.progress,
        error_message: model.error_message,
        started_at: model.started_at,
        completed_at: model.completed_at,
    })
}
