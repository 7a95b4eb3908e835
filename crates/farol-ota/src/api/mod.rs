//! OTA HTTP API
//!
//! Routes under `/api/v1/ota`:
//! - GET  /health - Service health check
//! - POST /releases - Create a signed release (multipart)
//! - GET  /releases - List releases for a template/channel
//! - GET  /releases/{release_id} - Get release
//! - DELETE /releases/{release_id} - Delete release
//! - POST /releases/{release_id}/verify - Re-verify stored binary
//! - POST /deployments - Create deployment
//! - GET  /deployments/{deployment_id} - Get deployment (?status=true for the aggregated report)
//! - PUT  /deployments/{deployment_id}/start - Activate a staged/canary deployment
//! - PUT  /deployments/{deployment_id}/pause - Pause deployment
//! - PUT  /deployments/{deployment_id}/resume - Resume deployment
//! - POST /deployments/{deployment_id}/rollback - Roll back to previous stable release
//! - GET  /updates/{device_id} - Pending update manifest for a device
//! - POST /updates/status - Device status report
//! - GET  /binaries/{path} - Binary download (signed URL)

pub mod deployment;
pub mod device;
pub mod model;
pub mod release;

use std::sync::Arc;

use actix_web::{HttpResponse, Scope, http::StatusCode, web};

use farol_common::FarolError;

use crate::service::OtaService;
use crate::storage::LocalStorageBackend;

use model::ErrorBody;

/// Shared state for the OTA API handlers
pub struct OtaState {
    pub service: Arc<OtaService>,
    /// Present when binaries are stored locally and served by this
    /// process; absent when an external backend issues download URLs
    pub local_storage: Option<Arc<LocalStorageBackend>>,
}

/// Create the OTA service routes
pub fn routes() -> Scope {
    web::scope("/api/v1/ota")
        .service(device::health_check)
        .service(release::create_release)
        .service(release::list_releases)
        .service(release::get_release)
        .service(release::delete_release)
        .service(release::verify_release)
        .service(deployment::create_deployment)
        .service(deployment::get_deployment)
        .service(deployment::start_deployment)
        .service(deployment::pause_deployment)
        .service(deployment::resume_deployment)
        .service(deployment::rollback_deployment)
        .service(device::get_update_for_device)
        .service(device::report_update_status)
        .service(device::download_binary)
}

/// Map a service error onto an HTTP response
pub(crate) fn error_response(err: anyhow::Error) -> HttpResponse {
    let status = match err.downcast_ref::<FarolError>() {
        Some(FarolError::NotFound(..)) => StatusCode::NOT_FOUND,
        Some(
            FarolError::Configuration(_)
            | FarolError::NoTargetDevices
            | FarolError::InvalidStateTransition { .. }
            | FarolError::Verification(_),
        ) => StatusCode::BAD_REQUEST,
        Some(FarolError::NoPreviousRelease) => StatusCode::CONFLICT,
        Some(FarolError::Network(_)) => StatusCode::BAD_GATEWAY,
        Some(FarolError::Storage(_) | FarolError::KeyNotConfigured(_)) | None => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    HttpResponse::build(status).json(ErrorBody {
        error: err.to_string(),
    })
}
