//! Firmware release lifecycle
//!
//! Releases are immutable once created: the binary is hashed and signed
//! before anything is persisted, and the stored bytes are cleaned up if
//! metadata persistence fails so no half-created release remains.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use farol_api::{CreateReleaseRequest, FirmwareRelease, ReleaseChannel};
use farol_common::{FarolError, SigningError, compute_hash};

use super::OtaService;

impl OtaService {
    /// Create a signed firmware release from raw binary bytes
    pub async fn create_release(
        &self,
        req: CreateReleaseRequest,
    ) -> anyhow::Result<FirmwareRelease> {
        if req.template_id.is_empty() || req.version.is_empty() || req.binary.is_empty() {
            return Err(FarolError::Configuration(
                "template id, version, and binary data are required".to_string(),
            )
            .into());
        }

        let release_id = Uuid::new_v4().to_string();
        let binary_hash = compute_hash(&req.binary);
        let signature = self.signer.sign_binary(&req.binary).map_err(|e| match e {
            SigningError::KeyNotConfigured(which) => {
                anyhow::Error::from(FarolError::KeyNotConfigured(which.to_string()))
            }
            other => anyhow::Error::from(other).context("failed to sign binary"),
        })?;

        let binary_path = self
            .storage
            .store_binary(&release_id, &req.binary)
            .await
            .map_err(|e| FarolError::Storage(e.to_string()))?;

        let release = FirmwareRelease {
            release_id: release_id.clone(),
            template_id: req.template_id,
            version: req.version,
            channel: req.channel,
            binary_hash,
            binary_path: binary_path.clone(),
            binary_size: req.binary.len() as i64,
            signature,
            release_notes: req.release_notes,
            created_at: Utc::now(),
            created_by: req.created_by,
        };

        if let Err(e) = self.persistence.create_release(&release).await {
            // Don't leave orphaned bytes behind a failed metadata write
            let _ = self.storage.delete_binary(&binary_path).await;
            return Err(e.context("failed to create release"));
        }

        info!(
            release_id = %release.release_id,
            template_id = %release.template_id,
            version = %release.version,
            "Created firmware release"
        );

        Ok(release)
    }

    pub async fn get_release(&self, release_id: &str) -> anyhow::Result<FirmwareRelease> {
        self.persistence
            .get_release(release_id)
            .await?
            .ok_or_else(|| FarolError::NotFound("release", release_id.to_string()).into())
    }

    pub async fn list_releases(
        &self,
        template_id: &str,
        channel: ReleaseChannel,
    ) -> anyhow::Result<Vec<FirmwareRelease>> {
        self.persistence.list_releases(template_id, channel).await
    }

    /// Delete a release and its stored binary
    pub async fn delete_release(&self, release_id: &str) -> anyhow::Result<()> {
        let release = self.get_release(release_id).await?;

        if let Err(e) = self.storage.delete_binary(&release.binary_path).await {
            warn!(release_id, error = %e, "Failed to delete binary from storage");
        }

        self.persistence.delete_release(release_id).await?;
        info!(release_id, "Deleted firmware release");

        Ok(())
    }

    /// Re-verify a stored release: hash the stored bytes and check the
    /// detached signature against the published key
    pub async fn verify_release(&self, release_id: &str) -> anyhow::Result<()> {
        let release = self.get_release(release_id).await?;

        let binary = self
            .storage
            .get_binary(&release.binary_path)
            .await
            .map_err(|e| FarolError::Storage(e.to_string()))?;

        let computed = compute_hash(&binary);
        if computed != release.binary_hash {
            return Err(FarolError::Verification(format!(
                "binary hash mismatch: expected {}, got {}",
                release.binary_hash, computed
            ))
            .into());
        }

        self.signer
            .verify_signature(&binary, &release.signature)
            .map_err(|e| match e {
                SigningError::KeyNotConfigured(which) => {
                    FarolError::KeyNotConfigured(which.to_string())
                }
                other => FarolError::Verification(other.to_string()),
            })?;

        Ok(())
    }
}
