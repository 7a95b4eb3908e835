//! OTA domain model: releases, deployments, device updates
//!
//! These types appear both in persistence and on the device wire
//! protocol, so field names and enum values must stay stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default deployment failure threshold, in percent
pub const DEFAULT_FAILURE_THRESHOLD: i32 = 10;

/// Release track a device is enrolled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseChannel {
    Stable,
    Beta,
    Alpha,
}

impl ReleaseChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseChannel::Stable => "stable",
            ReleaseChannel::Beta => "beta",
            ReleaseChannel::Alpha => "alpha",
        }
    }
}

impl std::fmt::Display for ReleaseChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReleaseChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(ReleaseChannel::Stable),
            "beta" => Ok(ReleaseChannel::Beta),
            "alpha" => Ok(ReleaseChannel::Alpha),
            _ => Err(format!("Invalid release channel: {}", s)),
        }
    }
}

/// Deployment rollout strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStrategy {
    /// All target devices at once
    Immediate,
    /// A fixed percentage of targets, in stable order
    Staged,
    /// A randomly sampled percentage of targets
    Canary,
}

impl DeploymentStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStrategy::Immediate => "immediate",
            DeploymentStrategy::Staged => "staged",
            DeploymentStrategy::Canary => "canary",
        }
    }
}

impl std::fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DeploymentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(DeploymentStrategy::Immediate),
            "staged" => Ok(DeploymentStrategy::Staged),
            "canary" => Ok(DeploymentStrategy::Canary),
            _ => Err(format!("Invalid deployment strategy: {}", s)),
        }
    }
}

/// Deployment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Active => "active",
            DeploymentStatus::Paused => "paused",
            DeploymentStatus::Completed => "completed",
            DeploymentStatus::Failed => "failed",
        }
    }

    /// Completed and failed deployments accept no further mutation
    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentStatus::Completed | DeploymentStatus::Failed)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeploymentStatus::Pending),
            "active" => Ok(DeploymentStatus::Active),
            "paused" => Ok(DeploymentStatus::Paused),
            "completed" => Ok(DeploymentStatus::Completed),
            "failed" => Ok(DeploymentStatus::Failed),
            _ => Err(format!("Invalid deployment status: {}", s)),
        }
    }
}

/// Per-device update lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Pending,
    Downloading,
    Installing,
    Completed,
    Failed,
}

impl UpdateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateStatus::Pending => "pending",
            UpdateStatus::Downloading => "downloading",
            UpdateStatus::Installing => "installing",
            UpdateStatus::Completed => "completed",
            UpdateStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UpdateStatus::Completed | UpdateStatus::Failed)
    }
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UpdateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UpdateStatus::Pending),
            "downloading" => Ok(UpdateStatus::Downloading),
            "installing" => Ok(UpdateStatus::Installing),
            "completed" => Ok(UpdateStatus::Completed),
            "failed" => Ok(UpdateStatus::Failed),
            _ => Err(format!("Invalid update status: {}", s)),
        }
    }
}

/// A signed firmware build, immutable once created.
///
/// `binary_hash` is the SHA-256 of the bytes at `binary_path`;
/// `signature` is the base64 RSA-PSS signature over the same bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareRelease {
    pub release_id: String,
    pub template_id: String,
    pub version: String,
    pub channel: ReleaseChannel,
    pub binary_hash: String,
    pub binary_path: String,
    pub binary_size: i64,
    pub signature: String,
    pub release_notes: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// A rollout of one release to a fixed set of target devices.
///
/// `success_count`/`failure_count` are derived from the deployment's
/// DeviceUpdate set and recomputable at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtaDeployment {
    pub deployment_id: String,
    pub release_id: String,
    pub strategy: DeploymentStrategy,
    pub target_devices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollout_percentage: Option<i32>,
    pub status: DeploymentStatus,
    pub failure_threshold: i32,
    pub success_count: i32,
    pub failure_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Update state of a single device within a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceUpdate {
    pub device_id: String,
    pub release_id: String,
    pub deployment_id: String,
    pub status: UpdateStatus,
    pub progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Configuration for creating a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub strategy: DeploymentStrategy,
    /// Explicit target list; empty means "query the device registry"
    #[serde(default)]
    pub target_devices: Vec<String>,
    /// Required for staged and canary strategies
    #[serde(default)]
    pub rollout_percentage: Option<i32>,
    /// Defaults to [`DEFAULT_FAILURE_THRESHOLD`]
    #[serde(default)]
    pub failure_threshold: Option<i32>,
}

/// Request to create a new firmware release
#[derive(Debug, Clone)]
pub struct CreateReleaseRequest {
    pub template_id: String,
    pub version: String,
    pub channel: ReleaseChannel,
    pub binary: Vec<u8>,
    pub release_notes: String,
    pub created_by: String,
}

/// Status report POSTed by a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusReport {
    pub device_id: String,
    pub release_id: String,
    pub status: UpdateStatus,
    #[serde(default)]
    pub progress: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Update manifest served to a polling device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareUpdate {
    pub release_id: String,
    pub version: String,
    pub binary_url: String,
    pub binary_hash: String,
    pub binary_size: i64,
    pub signature: String,
    pub release_notes: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregated status of a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStatusReport {
    pub deployment_id: String,
    pub release_id: String,
    pub status: DeploymentStatus,
    pub strategy: DeploymentStrategy,
    pub total_devices: i32,
    pub pending_count: i32,
    pub downloading_count: i32,
    pub installing_count: i32,
    pub completed_count: i32,
    pub failed_count: i32,
    pub progress_percentage: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_values() {
        assert_eq!(
            serde_json::to_string(&ReleaseChannel::Stable).unwrap(),
            "\"stable\""
        );
        assert_eq!(
            serde_json::to_string(&DeploymentStrategy::Canary).unwrap(),
            "\"canary\""
        );
        assert_eq!(
            serde_json::to_string(&UpdateStatus::Downloading).unwrap(),
            "\"downloading\""
        );

        assert_eq!(
            "paused".parse::<DeploymentStatus>().unwrap(),
            DeploymentStatus::Paused
        );
        assert!("rolling".parse::<DeploymentStrategy>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(UpdateStatus::Completed.is_terminal());
        assert!(UpdateStatus::Failed.is_terminal());
        assert!(!UpdateStatus::Downloading.is_terminal());
        assert!(DeploymentStatus::Failed.is_terminal());
        assert!(!DeploymentStatus::Paused.is_terminal());
    }

    #[test]
    fn test_status_report_wire_format() {
        let report: UpdateStatusReport = serde_json::from_str(
            r#"{"device_id":"dev-1","release_id":"rel-1","status":"installing","progress":50}"#,
        )
        .unwrap();
        assert_eq!(report.status, UpdateStatus::Installing);
        assert_eq!(report.progress, 50);
        assert!(report.error_message.is_none());
    }

    #[test]
    fn test_manifest_field_names() {
        let update = FirmwareUpdate {
            release_id: "rel-1".into(),
            version: "1.2.0".into(),
            binary_url: "https://example.com/rel-1/firmware.bin".into(),
            binary_hash: "ab".repeat(32),
            binary_size: 1024,
            signature: "c2ln".into(),
            release_notes: String::new(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&update).unwrap();
        for field in [
            "release_id",
            "version",
            "binary_url",
            "binary_hash",
            "binary_size",
            "signature",
            "release_notes",
        ] {
            assert!(json.get(field).is_some(), "missing wire field {}", field);
        }
    }
}
