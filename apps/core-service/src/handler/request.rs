//! # 研修申請 API ハンドラ
//!
//! ## エンドポイント
//!
//! - `GET /api/requests` - 自分の申請一覧（`?scope=pending` で判断待ちの一覧）
//! - `POST /api/requests` - 申請を提出
//! - `GET /api/requests/{id}` - 申請の詳細
//! - `POST /api/requests/{id}/approve` - 承認（1 段進める）
//! - `POST /api/requests/{id}/deny` - 却下

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
    request::{
        ApproverStamp,
        Decision,
        DenialReason,
        RequestDetails,
        RequestStatus,
        TrainingRequest,
        TrainingRequestId,
    },
    training::TrainingId,
};
use trainflow_shared::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::CoreError,
    middleware::CurrentUser,
    usecase::{
        RequestUseCaseImpl,
        request::{RequestSubject, SubmitRequestInput},
    },
};

pub struct RequestState {
    pub usecase: RequestUseCaseImpl,
}

/// 一覧の絞り込み
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListScope {
    /// 自分が提出した申請
    #[default]
    Own,
    /// 自分の判断待ち
    Pending,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub scope: ListScope,
}

#[derive(Debug, Serialize)]
pub struct RequestDto {
    pub id:                       String,
    pub requester_id:             String,
    pub title:                    String,
    pub details:                  RequestDetails,
    pub status:                   RequestStatus,
    pub notes:                    Option<String>,
    pub review_notes:             Option<String>,
    pub submitted_within_30_days: bool,
    pub supervisor_approval:      Option<ApproverStamp>,
    pub admin_approval:           Option<ApproverStamp>,
    pub denial_reason:            Option<String>,
    pub submitted_at:             DateTime<Utc>,
    pub updated_at:               DateTime<Utc>,
}

impl From<&TrainingRequest> for RequestDto {
    fn from(r: &TrainingRequest) -> Self {
        Self {
            id:                       r.id().to_string(),
            requester_id:             r.requester_id().to_string(),
            title:                    r.title().to_string(),
            details:                  r.details().clone(),
            status:                   r.status(),
            notes:                    r.notes().map(str::to_string),
            review_notes:             r.review_notes().map(str::to_string),
            submitted_within_30_days: r.submitted_within_30_days(),
            supervisor_approval:      r.supervisor_stamp().cloned(),
            admin_approval:           r.admin_stamp().cloned(),
            denial_reason:            r.denial_reason().map(|d| d.as_str().to_string()),
            submitted_at:             r.submitted_at(),
            updated_at:               r.updated_at(),
        }
    }
}

/// 申請の提出
///
/// カタログの研修なら `training_id`、署内・外部研修なら `details` を指定する。
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequestRequest {
    pub training_id: Option<Uuid>,
    pub details:     Option<RequestDetails>,
    #[validate(length(max = 2000))]
    pub notes:       Option<String>,
}

impl SubmitRequestRequest {
    fn subject(self) -> Result<(RequestSubject, Option<String>), CoreError> {
        let subject = match (self.training_id, self.details) {
            (Some(id), None) => RequestSubject::Catalog(TrainingId::from_uuid(id)),
            (None, Some(details)) => RequestSubject::Described(details),
            _ => {
                return Err(CoreError::BadRequest(
                    "training_id と details のどちらか一方を指定してください".to_string(),
                ));
            }
        };
        Ok((subject, self.notes))
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ApproveRequest {
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DenyRequest {
    #[validate(length(min = 1, max = 2000, message = "却下理由は必須です"))]
    pub reason: String,
}

/// GET /api/requests
pub async fn list_requests(
    State(state): State<Arc<RequestState>>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Response, CoreError> {
    let requests = match query.scope {
        ListScope::Own => state.usecase.list_own(&user.user_id).await?,
        ListScope::Pending => state.usecase.list_pending(&user.user_id, user.role).await?,
    };
    let response = ApiResponse::new(requests.iter().map(RequestDto::from).collect::<Vec<_>>());
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// POST /api/requests
#[tracing::instrument(skip_all, fields(requester_id = %user.user_id))]
pub async fn submit_request(
    State(state): State<Arc<RequestState>>,
    user: CurrentUser,
    Json(req): Json<SubmitRequestRequest>,
) -> Result<Response, CoreError> {
    req.validate()?;
    let (subject, notes) = req.subject()?;

    let request = state
        .usecase
        .submit(&user.user_id, SubmitRequestInput { subject, notes })
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(RequestDto::from(&request)))).into_response())
}

/// GET /api/requests/{id}
pub async fn get_request(
    State(state): State<Arc<RequestState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, CoreError> {
    let request = state
        .usecase
        .get(&TrainingRequestId::from_uuid(id), &user.user_id, user.role)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(RequestDto::from(&request)))).into_response())
}

/// POST /api/requests/{id}/approve
#[tracing::instrument(skip_all, fields(request_id = %id))]
pub async fn approve_request(
    State(state): State<Arc<RequestState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Response, CoreError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    req.validate()?;

    let request = state
        .usecase
        .advance(
            &TrainingRequestId::from_uuid(id),
            &user.user_id,
            Decision::Approve { notes: req.notes },
        )
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(RequestDto::from(&request)))).into_response())
}

/// POST /api/requests/{id}/deny
#[tracing::instrument(skip_all, fields(request_id = %id))]
pub async fn deny_request(
    State(state): State<Arc<RequestState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DenyRequest>,
) -> Result<Response, CoreError> {
    req.validate()?;
    let reason = DenialReason::new(req.reason)?;

    let request = state
        .usecase
        .advance(
            &TrainingRequestId::from_uuid(id),
            &user.user_id,
            Decision::Deny { reason },
        )
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(RequestDto::from(&request)))).into_response())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_training_idだけならカタログ申請() {
        let id = Uuid::now_v7();
        let req = SubmitRequestRequest {
            training_id: Some(id),
            details:     None,
            notes:       Some("first aid".to_string()),
        };

        let (subject, notes) = req.subject().unwrap();

        assert!(matches!(subject, RequestSubject::Catalog(t) if t == TrainingId::from_uuid(id)));
        assert_eq!(notes.as_deref(), Some("first aid"));
    }

    #[test]
    fn test_申請対象の指定がなければ400() {
        let req = SubmitRequestRequest {
            training_id: None,
            details:     None,
            notes:       None,
        };

        assert!(matches!(req.subject(), Err(CoreError::BadRequest(_))));
    }

    #[test]
    fn test_scope省略時は自分の申請() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();

        assert_eq!(query.scope, ListScope::Own);
    }
}
