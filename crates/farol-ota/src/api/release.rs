//! Release management endpoints

use actix_multipart::Multipart;
use actix_web::{HttpResponse, delete, get, post, web};
use futures::TryStreamExt;
use tracing::error;

use farol_api::{CreateReleaseRequest, ReleaseChannel};
use farol_common::FarolError;

use super::model::{ErrorBody, ListReleasesQuery, MessageResponse, ReleaseListResponse, VerifyResponse};
use super::{OtaState, error_response};

/// POST /api/v1/ota/releases
#[post("/releases")]
pub async fn create_release(data: web::Data<OtaState>, payload: Multipart) -> HttpResponse {
    let req = match read_release_form(payload).await {
        Ok(req) => req,
        Err(e) => return error_response(e),
    };

    match data.service.create_release(req).await {
        Ok(release) => HttpResponse::Created().json(release),
        Err(e) => {
            error!(error = %e, "Failed to create release");
            error_response(e)
        }
    }
}

/// GET /api/v1/ota/releases/{release_id}
#[get("/releases/{release_id}")]
pub async fn get_release(data: web::Data<OtaState>, path: web::Path<String>) -> HttpResponse {
    match data.service.get_release(&path.into_inner()).await {
        Ok(release) => HttpResponse::Ok().json(release),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/ota/releases?template_id=..&channel=..
#[get("/releases")]
pub async fn list_releases(
    data: web::Data<OtaState>,
    query: web::Query<ListReleasesQuery>,
) -> HttpResponse {
    match data
        .service
        .list_releases(&query.template_id, query.channel)
        .await
    {
        Ok(releases) => HttpResponse::Ok().json(ReleaseListResponse { releases }),
        Err(e) => {
            error!(error = %e, "Failed to list releases");
            error_response(e)
        }
    }
}

/// DELETE /api/v1/ota/releases/{release_id}
#[delete("/releases/{release_id}")]
pub async fn delete_release(data: web::Data<OtaState>, path: web::Path<String>) -> HttpResponse {
    match data.service.delete_release(&path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            message: "release deleted successfully".to_string(),
            deployment_id: None,
        }),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/ota/releases/{release_id}/verify
#[post("/releases/{release_id}/verify")]
pub async fn verify_release(data: web::Data<OtaState>, path: web::Path<String>) -> HttpResponse {
    match data.service.verify_release(&path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(VerifyResponse {
            verified: true,
            message: "release signature verified successfully".to_string(),
        }),
        Err(e) => match e.downcast_ref::<FarolError>() {
            Some(FarolError::Verification(_)) => HttpResponse::BadRequest().json(ErrorBody {
                error: e.to_string(),
            }),
            _ => error_response(e),
        },
    }
}

/// Collect the multipart release form: text fields plus the binary part
async fn read_release_form(mut payload: Multipart) -> anyhow::Result<CreateReleaseRequest> {
    let mut template_id = String::new();
    let mut version = String::new();
    let mut channel: Option<ReleaseChannel> = None;
    let mut release_notes = String::new();
    let mut created_by = String::new();
    let mut binary: Vec<u8> = Vec::new();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| FarolError::Configuration(format!("invalid multipart payload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        let mut value: Vec<u8> = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| FarolError::Configuration(format!("invalid multipart payload: {}", e)))?
        {
            value.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "template_id" => template_id = String::from_utf8_lossy(&value).into_owned(),
            "version" => version = String::from_utf8_lossy(&value).into_owned(),
            "channel" => {
                let raw = String::from_utf8_lossy(&value).trim().to_string();
                channel = Some(
                    raw.parse()
                        .map_err(|e: String| FarolError::Configuration(e))?,
                );
            }
            "release_notes" => release_notes = String::from_utf8_lossy(&value).into_owned(),
            "created_by" => created_by = String::from_utf8_lossy(&value).into_owned(),
            "binary" => binary = value,
            _ => {}
        }
    }

    let channel = channel
        .ok_or_else(|| FarolError::Configuration("release channel is required".to_string()))?;

    Ok(CreateReleaseRequest {
        template_id,
        version,
        channel,
        binary,
        release_notes,
        created_by,
    })
}
