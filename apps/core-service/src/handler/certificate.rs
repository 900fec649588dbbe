//! # 修了証明書 API ハンドラ

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use trainflow_domain::{
    certificate::{Certificate, CertificateId, CertificateStatus},
    user::UserId,
};
use trainflow_shared::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::CoreError,
    middleware::CurrentUser,
    usecase::{CertificateUseCaseImpl, certificate::IssueCertificateInput},
};

pub struct CertificateState {
    pub usecase: CertificateUseCaseImpl,
}

#[derive(Debug, Serialize)]
pub struct CertificateDto {
    pub id:                 String,
    pub user_id:            String,
    pub certificate_number: String,
    pub training_title:     String,
    pub completion_date:    NaiveDate,
    pub issued_date:        NaiveDate,
    pub expiration_date:    Option<NaiveDate>,
    pub credits:            f64,
    pub instructor:         Option<String>,
    pub status:             CertificateStatus,
}

impl From<&Certificate> for CertificateDto {
    fn from(c: &Certificate) -> Self {
        Self {
            id:                 c.id().to_string(),
            user_id:            c.user_id().to_string(),
            certificate_number: c.certificate_number().to_string(),
            training_title:     c.training_title().to_string(),
            completion_date:    c.completion_date(),
            issued_date:        c.issued_date(),
            expiration_date:    c.expiration_date(),
            credits:            c.credits(),
            instructor:         c.instructor().map(str::to_string),
            status:             c.status(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CertificateQuery {
    /// 他の職員の証明書を見る（管理系ロールのみ）
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IssueCertificateRequest {
    pub user_id:            Uuid,
    #[validate(length(min = 1, max = 50))]
    pub certificate_number: String,
    #[validate(length(min = 1, max = 200))]
    pub training_title:     String,
    pub completion_date:    NaiveDate,
    pub expiration_date:    Option<NaiveDate>,
    #[validate(range(min = 0.0))]
    pub credits:            f64,
    #[validate(length(max = 100))]
    pub instructor:         Option<String>,
}

/// GET /api/certificates
pub async fn list_certificates(
    State(state): State<Arc<CertificateState>>,
    user: CurrentUser,
    Query(query): Query<CertificateQuery>,
) -> Result<Response, CoreError> {
    let target = match query.user_id.map(UserId::from_uuid) {
        Some(id) if id != user.user_id => {
            user.require_administrative()?;
            id
        }
        _ => user.user_id.clone(),
    };

    let certificates = state.usecase.list_for_user(&target).await?;
    let response =
        ApiResponse::new(certificates.iter().map(CertificateDto::from).collect::<Vec<_>>());
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// POST /api/certificates
#[tracing::instrument(skip_all)]
pub async fn issue_certificate(
    State(state): State<Arc<CertificateState>>,
    user: CurrentUser,
    Json(req): Json<IssueCertificateRequest>,
) -> Result<Response, CoreError> {
    user.require_administrative()?;
    req.validate()?;

    let input = IssueCertificateInput {
        user_id:            UserId::from_uuid(req.user_id),
        certificate_number: req.certificate_number,
        training_title:     req.training_title,
        completion_date:    req.completion_date,
        expiration_date:    req.expiration_date,
        credits:            req.credits,
        instructor:         req.instructor,
    };
    let certificate = state.usecase.issue(&user.user_id, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(CertificateDto::from(&certificate))),
    )
        .into_response())
}

/// POST /api/certificates/{id}/revoke
pub async fn revoke_certificate(
    State(state): State<Arc<CertificateState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, CoreError> {
    user.require_administrative()?;
    let certificate = state
        .usecase
        .revoke(&CertificateId::from_uuid(id), &user.user_id)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(CertificateDto::from(&certificate)))).into_response())
}
