//! Device-facing endpoints: update polling, status reports, binary
//! download
//!
//! Field names here are compatibility-sensitive; devices in the field
//! parse them.

use actix_web::{HttpResponse, get, post, web};
use serde_json::json;
use tracing::error;

use farol_api::UpdateStatusReport;

use super::model::{BinaryDownloadQuery, ErrorBody, MessageResponse};
use super::{OtaState, error_response};
use crate::storage::StorageBackend;

/// GET /api/v1/ota/health
#[get("/health")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "farol-ota",
    }))
}

/// GET /api/v1/ota/updates/{device_id}
///
/// 404 means "no pending update"; devices treat it as a normal outcome,
/// not an error.
#[get("/updates/{device_id}")]
pub async fn get_update_for_device(
    data: web::Data<OtaState>,
    path: web::Path<String>,
) -> HttpResponse {
    match data.service.update_for_device(&path.into_inner()).await {
        Ok(Some(update)) => HttpResponse::Ok().json(update),
        Ok(None) => HttpResponse::NotFound().json(ErrorBody {
            error: "no pending update for device".to_string(),
        }),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/ota/updates/status
#[post("/updates/status")]
pub async fn report_update_status(
    data: web::Data<OtaState>,
    report: web::Json<UpdateStatusReport>,
) -> HttpResponse {
    match data.service.report_update_status(&report).await {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            message: "update status reported successfully".to_string(),
            deployment_id: None,
        }),
        Err(e) => {
            error!(error = %e, "Failed to report update status");
            error_response(e)
        }
    }
}

/// GET /api/v1/ota/binaries/{path}?expires=..&token=..
///
/// Serves locally stored binaries; the expiry/token pair must validate
/// against the storage backend's URL secret.
#[get("/binaries/{path:.*}")]
pub async fn download_binary(
    data: web::Data<OtaState>,
    path: web::Path<String>,
    query: web::Query<BinaryDownloadQuery>,
) -> HttpResponse {
    let Some(storage) = &data.local_storage else {
        return HttpResponse::NotFound().json(ErrorBody {
            error: "binary serving is not enabled".to_string(),
        });
    };

    let path = path.into_inner();
    if !storage.verify_url(&path, query.expires, &query.token) {
        return HttpResponse::Forbidden().json(ErrorBody {
            error: "invalid or expired download token".to_string(),
        });
    }

    match storage.get_binary(&path).await {
        Ok(bytes) => HttpResponse::Ok()
            .content_type("application/octet-stream")
            .body(bytes),
        Err(_) => HttpResponse::NotFound().json(ErrorBody {
            error: "binary not found".to_string(),
        }),
    }
}
