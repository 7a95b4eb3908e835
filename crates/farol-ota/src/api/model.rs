//! Request and response models for the OTA API

use serde::{Deserialize, Serialize};

use farol_api::{DeploymentConfig, FirmwareRelease, ReleaseChannel};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeploymentRequest {
    pub release_id: String,
    pub config: DeploymentConfig,
}

#[derive(Debug, Deserialize)]
pub struct ListReleasesQuery {
    pub template_id: String,
    pub channel: ReleaseChannel,
}

#[derive(Debug, Deserialize)]
pub struct GetDeploymentQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseListResponse {
    pub releases: Vec<FirmwareRelease>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct BinaryDownloadQuery {
    pub expires: i64,
    pub token: String,
}
