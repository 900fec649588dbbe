//! # 定期処理の手動実行

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use trainflow_shared::ApiResponse;

use crate::{error::CoreError, middleware::CurrentUser, usecase::NotificationGenerator};

pub struct JobState {
    pub generator: Arc<NotificationGenerator>,
}

/// POST /api/jobs/notifications
///
/// 定期通知の生成と既読通知の掃除をその場で 1 回実行し、結果を返す。
#[tracing::instrument(skip_all, fields(actor_id = %user.user_id))]
pub async fn run_notification_jobs(
    State(state): State<Arc<JobState>>,
    user: CurrentUser,
) -> Result<Response, CoreError> {
    user.require_administrative()?;

    let report = state.generator.run_all().await;
    let total = report.total();
    tracing::info!(
        created = total.created,
        errors = total.errors.len(),
        cleaned = report.cleaned,
        "定期通知を手動実行しました"
    );
    Ok((StatusCode::OK, Json(ApiResponse::new(report))).into_response())
}
