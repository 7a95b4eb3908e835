//! Deployment management endpoints

use actix_web::{HttpResponse, get, post, put, web};
use tracing::error;

use super::model::{CreateDeploymentRequest, GetDeploymentQuery, MessageResponse};
use super::{OtaState, error_response};

/// POST /api/v1/ota/deployments
#[post("/deployments")]
pub async fn create_deployment(
    data: web::Data<OtaState>,
    req: web::Json<CreateDeploymentRequest>,
) -> HttpResponse {
    match data
        .service
        .deploy_release(&req.release_id, &req.config)
        .await
    {
        Ok(deployment) => HttpResponse::Created().json(deployment),
        Err(e) => {
            error!(error = %e, "Failed to create deployment");
            error_response(e)
        }
    }
}

/// GET /api/v1/ota/deployments/{deployment_id}
///
/// With `?status=true`, returns the aggregated per-device status report
/// instead of the basic deployment record.
#[get("/deployments/{deployment_id}")]
pub async fn get_deployment(
    data: web::Data<OtaState>,
    path: web::Path<String>,
    query: web::Query<GetDeploymentQuery>,
) -> HttpResponse {
    let deployment_id = path.into_inner();

    if query.status.as_deref() == Some("true") {
        return match data.service.get_deployment_status(&deployment_id).await {
            Ok(report) => HttpResponse::Ok().json(report),
            Err(e) => error_response(e),
        };
    }

    match data.service.get_deployment(&deployment_id).await {
        Ok(deployment) => HttpResponse::Ok().json(deployment),
        Err(e) => error_response(e),
    }
}

/// PUT /api/v1/ota/deployments/{deployment_id}/start
#[put("/deployments/{deployment_id}/start")]
pub async fn start_deployment(data: web::Data<OtaState>, path: web::Path<String>) -> HttpResponse {
    let deployment_id = path.into_inner();
    match data.service.start_deployment(&deployment_id).await {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            message: "deployment started successfully".to_string(),
            deployment_id: Some(deployment_id),
        }),
        Err(e) => error_response(e),
    }
}

/// PUT /api/v1/ota/deployments/{deployment_id}/pause
#[put("/deployments/{deployment_id}/pause")]
pub async fn pause_deployment(data: web::Data<OtaState>, path: web::Path<String>) -> HttpResponse {
    let deployment_id = path.into_inner();
    match data.service.pause_deployment(&deployment_id).await {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            message: "deployment paused successfully".to_string(),
            deployment_id: Some(deployment_id),
        }),
        Err(e) => error_response(e),
    }
}

/// PUT /api/v1/ota/deployments/{deployment_id}/resume
#[put("/deployments/{deployment_id}/resume")]
pub async fn resume_deployment(data: web::Data<OtaState>, path: web::Path<String>) -> HttpResponse {
    let deployment_id = path.into_inner();
    match data.service.resume_deployment(&deployment_id).await {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            message: "deployment resumed successfully".to_string(),
            deployment_id: Some(deployment_id),
        }),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/ota/deployments/{deployment_id}/rollback
#[post("/deployments/{deployment_id}/rollback")]
pub async fn rollback_deployment(
    data: web::Data<OtaState>,
    path: web::Path<String>,
) -> HttpResponse {
    let deployment_id = path.into_inner();
    match data.service.rollback_deployment(&deployment_id).await {
        Ok(_) => HttpResponse::Ok().json(MessageResponse {
            message: "deployment rolled back successfully".to_string(),
            deployment_id: Some(deployment_id),
        }),
        Err(e) => {
            error!(error = %e, "Failed to roll back deployment");
            error_response(e)
        }
    }
}
