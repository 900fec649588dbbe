//! # アプリ内通知 API ハンドラ
//!
//! 一覧と未読件数は通知ミラーから返す。ミラーは DB の変更通知で更新される。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use trainflow_domain::notification::{Notification, NotificationId, NotificationKind};
use trainflow_shared::ApiResponse;
use uuid::Uuid;

use crate::{
    error::CoreError,
    middleware::CurrentUser,
    usecase::notification::NotificationInboxUseCaseImpl,
};

pub struct NotificationState {
    pub usecase: Arc<NotificationInboxUseCaseImpl>,
}

#[derive(Debug, Serialize)]
pub struct NotificationDto {
    pub id:         String,
    pub title:      String,
    pub message:    String,
    pub kind:       NotificationKind,
    pub is_read:    bool,
    pub link:       Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationDto {
    fn from(n: &Notification) -> Self {
        Self {
            id:         n.id().to_string(),
            title:      n.title().to_string(),
            message:    n.message().to_string(),
            kind:       n.kind(),
            is_read:    n.is_read(),
            link:       n.link().map(str::to_string),
            created_at: n.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadCountDto {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadDto {
    pub updated: usize,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<Arc<NotificationState>>,
    user: CurrentUser,
) -> Result<Response, CoreError> {
    let notifications = state.usecase.list(&user.user_id).await?;
    let response = ApiResponse::new(
        notifications
            .iter()
            .map(NotificationDto::from)
            .collect::<Vec<_>>(),
    );
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<Arc<NotificationState>>,
    user: CurrentUser,
) -> Result<Response, CoreError> {
    let count = state.usecase.unread_count(&user.user_id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(UnreadCountDto { count }))).into_response())
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<Arc<NotificationState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, CoreError> {
    state
        .usecase
        .mark_read(&user.user_id, &NotificationId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<Arc<NotificationState>>,
    user: CurrentUser,
) -> Result<Response, CoreError> {
    let updated = state.usecase.mark_all_read(&user.user_id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(MarkAllReadDto { updated }))).into_response())
}
