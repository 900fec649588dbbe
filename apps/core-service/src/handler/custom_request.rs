//! # カスタム研修申請 API ハンドラ
//!
//! 申請者が指定した階級チェーンを 1 段ずつ承認する。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trainflow_domain::{
    custom_request::{
        ChainApproval,
        CustomRequestDetails,
        CustomRequestStatus,
        CustomTrainingRequest,
        CustomTrainingRequestId,
    },
    rank::ApprovalRank,
    request::{Decision, DenialReason},
};
use trainflow_shared::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::CoreError,
    handler::request::{ApproveRequest, DenyRequest, ListQuery, ListScope},
    middleware::CurrentUser,
    usecase::{CustomRequestUseCaseImpl, custom_request::SubmitCustomRequestInput},
};

pub struct CustomRequestState {
    pub usecase: CustomRequestUseCaseImpl,
}

#[derive(Debug, Serialize)]
pub struct ChainDenialDto {
    pub level:     usize,
    pub denied_by: String,
    pub denied_at: DateTime<Utc>,
    pub reason:    String,
}

#[derive(Debug, Serialize)]
pub struct CustomRequestDto {
    pub id:            String,
    pub requester_id:  String,
    pub details:       CustomRequestDetails,
    pub chain:         Vec<ApprovalRank>,
    pub current_level: usize,
    pub pending_rank:  Option<ApprovalRank>,
    pub status:        CustomRequestStatus,
    pub approvals:     Vec<ChainApproval>,
    pub denial:        Option<ChainDenialDto>,
    pub notes:         Option<String>,
    pub created_at:    DateTime<Utc>,
    pub updated_at:    DateTime<Utc>,
}

impl From<&CustomTrainingRequest> for CustomRequestDto {
    fn from(r: &CustomTrainingRequest) -> Self {
        Self {
            id:            r.id().to_string(),
            requester_id:  r.requester_id().to_string(),
            details:       r.details().clone(),
            chain:         r.chain().ranks().to_vec(),
            current_level: r.current_level(),
            pending_rank:  r.pending_rank(),
            status:        r.status(),
            approvals:     r.approvals().to_vec(),
            denial:        r.denial().map(|d| ChainDenialDto {
                level:     d.level,
                denied_by: d.denied_by.to_string(),
                denied_at: d.denied_at,
                reason:    d.reason.as_str().to_string(),
            }),
            notes:         r.notes().map(str::to_string),
            created_at:    r.created_at(),
            updated_at:    r.updated_at(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitCustomRequestRequest {
    pub details: CustomRequestDetails,
    /// 承認する階級の順序
    #[validate(length(min = 1, message = "承認チェーンを 1 段以上指定してください"))]
    pub chain:   Vec<ApprovalRank>,
    #[validate(length(max = 2000))]
    pub notes:   Option<String>,
}

/// GET /api/custom-requests
pub async fn list_custom_requests(
    State(state): State<Arc<CustomRequestState>>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Response, CoreError> {
    let requests = match query.scope {
        ListScope::Own => state.usecase.list_own(&user.user_id).await?,
        ListScope::Pending => state.usecase.list_pending(&user.user_id).await?,
    };
    let response =
        ApiResponse::new(requests.iter().map(CustomRequestDto::from).collect::<Vec<_>>());
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// POST /api/custom-requests
#[tracing::instrument(skip_all, fields(requester_id = %user.user_id))]
pub async fn submit_custom_request(
    State(state): State<Arc<CustomRequestState>>,
    user: CurrentUser,
    Json(req): Json<SubmitCustomRequestRequest>,
) -> Result<Response, CoreError> {
    req.validate()?;

    let input = SubmitCustomRequestInput {
        details: req.details,
        chain:   req.chain,
        notes:   req.notes,
    };
    let request = state.usecase.submit(&user.user_id, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(CustomRequestDto::from(&request))),
    )
        .into_response())
}

/// GET /api/custom-requests/{id}
pub async fn get_custom_request(
    State(state): State<Arc<CustomRequestState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, CoreError> {
    let request = state
        .usecase
        .get(&CustomTrainingRequestId::from_uuid(id), &user.user_id)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(CustomRequestDto::from(&request)))).into_response())
}

/// POST /api/custom-requests/{id}/approve
#[tracing::instrument(skip_all, fields(request_id = %id))]
pub async fn approve_custom_request(
    State(state): State<Arc<CustomRequestState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Response, CoreError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    req.validate()?;

    let request = state
        .usecase
        .advance(
            &CustomTrainingRequestId::from_uuid(id),
            &user.user_id,
            Decision::Approve { notes: req.notes },
        )
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(CustomRequestDto::from(&request)))).into_response())
}

/// POST /api/custom-requests/{id}/deny
#[tracing::instrument(skip_all, fields(request_id = %id))]
pub async fn deny_custom_request(
    State(state): State<Arc<CustomRequestState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DenyRequest>,
) -> Result<Response, CoreError> {
    req.validate()?;
    let reason = DenialReason::new(req.reason)?;

    let request = state
        .usecase
        .advance(
            &CustomTrainingRequestId::from_uuid(id),
            &user.user_id,
            Decision::Deny { reason },
        )
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(CustomRequestDto::from(&request)))).into_response())
}
