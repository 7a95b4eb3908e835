//! OTA update client state machine
//!
//! Idle → CheckingForUpdate → {NoUpdate | UpdateAvailable} →
//! Downloading → VerifyingHash → VerifyingSignature → Installing →
//! {Completed | Failed}
//!
//! Status is reported to the server at Downloading, Installing,
//! Completed, and Failed. A device runs one update attempt at a time;
//! an attempt either completes or fails, it is never interrupted
//! mid-flash.

use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, warn};

use farol_api::{FirmwareUpdate, UpdateStatus, UpdateStatusReport};
use farol_common::{ReleaseSigner, compute_hash};

use crate::config::UpdateClientConfig;
use crate::error::ClientError;
use crate::installer::FirmwareInstaller;

/// Progress callback: (bytes downloaded, total bytes)
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Client-side update lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    CheckingForUpdate,
    NoUpdate,
    UpdateAvailable,
    Downloading,
    VerifyingHash,
    VerifyingSignature,
    Installing,
    Completed,
    Failed,
}

/// Device-side OTA update client
pub struct OtaUpdateClient {
    client: reqwest::Client,
    config: UpdateClientConfig,
    verifier: Option<ReleaseSigner>,
    state: parking_lot::Mutex<UpdateState>,
    on_progress: parking_lot::Mutex<Option<ProgressCallback>>,
}

impl std::fmt::Debug for OtaUpdateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtaUpdateClient")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("verifier", &self.verifier)
            .field("state", &self.state)
            .field("on_progress", &self.on_progress.lock().is_some())
            .finish()
    }
}

impl OtaUpdateClient {
    pub fn new(config: UpdateClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        // Fail closed at construction: verification enabled without a
        // key would otherwise only surface mid-update.
        let verifier = if config.verify_signature {
            let pem = config.public_key_pem.as_deref().ok_or_else(|| {
                ClientError::InvalidKey(
                    "public key required when signature verification is enabled".to_string(),
                )
            })?;
            Some(
                ReleaseSigner::verify_only(pem)
                    .map_err(|e| ClientError::InvalidKey(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(Self {
            client,
            config,
            verifier,
            state: parking_lot::Mutex::new(UpdateState::Idle),
            on_progress: parking_lot::Mutex::new(None),
        })
    }

    /// Current state of the update lifecycle
    pub fn state(&self) -> UpdateState {
        *self.state.lock()
    }

    /// Register a download progress callback
    pub fn set_progress_callback(&self, callback: ProgressCallback) {
        *self.on_progress.lock() = Some(callback);
    }

    fn set_state(&self, state: UpdateState) {
        *self.state.lock() = state;
    }

    /// Poll the server for a pending update.
    ///
    /// HTTP 404 means no update is pending and surfaces as the signaled
    /// `NoUpdateAvailable`; any other non-success status is a network
    /// error the caller may retry.
    pub async fn check_for_update(&self) -> Result<FirmwareUpdate, ClientError> {
        self.set_state(UpdateState::CheckingForUpdate);

        let url = format!(
            "{}/api/v1/ota/updates/{}",
            self.config.server_url, self.config.device_id
        );
        let response = self.client.get(&url).send().await.map_err(|e| {
            self.set_state(UpdateState::Idle);
            ClientError::Network(e.to_string())
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            self.set_state(UpdateState::NoUpdate);
            return Err(ClientError::NoUpdateAvailable);
        }
        if !response.status().is_success() {
            self.set_state(UpdateState::Idle);
            return Err(ClientError::Network(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }

        let update: FirmwareUpdate = response.json().await.map_err(|e| {
            self.set_state(UpdateState::Idle);
            ClientError::InvalidResponse(e.to_string())
        })?;

        if update.release_id.is_empty()
            || update.binary_url.is_empty()
            || update.binary_hash.is_empty()
        {
            self.set_state(UpdateState::Idle);
            return Err(ClientError::InvalidResponse(
                "missing required fields in update response".to_string(),
            ));
        }

        debug!(
            release_id = %update.release_id,
            version = %update.version,
            "Update available"
        );
        self.set_state(UpdateState::UpdateAvailable);
        Ok(update)
    }

    /// Download, verify, and install an update, reporting progress to
    /// the server.
    ///
    /// Verify-before-install is non-negotiable: the installer is only
    /// reached after the hash check and (when enabled) the signature
    /// check have both passed. Any verification failure ends the
    /// attempt; there is no fallback to an unsigned install path.
    pub async fn perform_update(
        &self,
        update: &FirmwareUpdate,
        installer: &mut dyn FirmwareInstaller,
    ) -> Result<(), ClientError> {
        self.set_state(UpdateState::Downloading);
        self.try_report(update, UpdateStatus::Downloading, 0, None).await;

        let binary = match self.download(&update.binary_url, update.binary_size).await {
            Ok(binary) => binary,
            Err(e) => return self.fail(update, 0, e).await,
        };

        self.set_state(UpdateState::VerifyingHash);
        if !compute_hash(&binary).eq_ignore_ascii_case(&update.binary_hash) {
            let e = ClientError::Verification("hash verification failed".to_string());
            return self.fail(update, 0, e).await;
        }

        if let Some(verifier) = &self.verifier {
            if !update.signature.is_empty() {
                self.set_state(UpdateState::VerifyingSignature);
                if verifier
                    .verify_signature(&binary, &update.signature)
                    .is_err()
                {
                    let e = ClientError::Verification("signature verification failed".to_string());
                    return self.fail(update, 0, e).await;
                }
            }
        }

        self.set_state(UpdateState::Installing);
        self.try_report(update, UpdateStatus::Installing, 50, None).await;

        if let Err(e) = installer.install(&binary) {
            let e = ClientError::Install(e.to_string());
            return self.fail(update, 50, e).await;
        }

        self.set_state(UpdateState::Completed);
        self.try_report(update, UpdateStatus::Completed, 100, None).await;
        Ok(())
    }

    /// Convenience wrapper: poll and, if an update is pending, apply it
    pub async fn check_and_update(
        &self,
        installer: &mut dyn FirmwareInstaller,
    ) -> Result<(), ClientError> {
        let update = self.check_for_update().await?;
        self.perform_update(&update, installer).await
    }

    async fn fail(
        &self,
        update: &FirmwareUpdate,
        progress: i32,
        error: ClientError,
    ) -> Result<(), ClientError> {
        self.set_state(UpdateState::Failed);
        let message = error.to_string();
        self.try_report(update, UpdateStatus::Failed, progress, Some(message.as_str()))
            .await;
        Err(error)
    }

    async fn download(&self, url: &str, expected_size: i64) -> Result<Vec<u8>, ClientError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Download(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }

        let content_length = response
            .content_length()
            .ok_or_else(|| ClientError::Download("missing content length".to_string()))?;

        let mut binary = Vec::with_capacity(content_length as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ClientError::Download(e.to_string()))?;
            binary.extend_from_slice(&chunk);
            if let Some(callback) = self.on_progress.lock().as_ref() {
                callback(binary.len() as u64, content_length);
            }
        }

        if binary.len() as i64 != expected_size {
            return Err(ClientError::Download(format!(
                "downloaded size mismatch: expected {}, got {}",
                expected_size,
                binary.len()
            )));
        }

        Ok(binary)
    }

    /// Status reporting is best effort during an attempt; a failed POST
    /// must not abort the update itself.
    async fn try_report(
        &self,
        update: &FirmwareUpdate,
        status: UpdateStatus,
        progress: i32,
        error_message: Option<&str>,
    ) {
        if let Err(e) = self
            .report_status(&update.release_id, status, progress, error_message)
            .await
        {
            warn!(status = %status, error = %e, "Failed to report update status");
        }
    }

    async fn report_status(
        &self,
        release_id: &str,
        status: UpdateStatus,
        progress: i32,
        error_message: Option<&str>,
    ) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/ota/updates/status", self.config.server_url);
        let report = UpdateStatusReport {
            device_id: self.config.device_id.clone(),
            release_id: release_id.to_string(),
            status,
            progress,
            error_message: error_message.map(|m| m.to_string()),
        };

        let response = self
            .client
            .post(&url)
            .json(&report)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Network(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}
