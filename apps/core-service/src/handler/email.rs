//! # メール API ハンドラ
//!
//! ## エンドポイント
//!
//! - `GET /api/email-preferences` / `PUT /api/email-preferences` - 自分の受信設定
//! - `POST /api/emails` - テンプレートを指定して 1 通送る（管理系ロールのみ）
//! - `POST /api/emails/mass` - 選択した職員へ一斉送信（管理系ロールのみ）
//!
//! 直接送信の失敗は HTTP エラーにせず、`success: false` と理由を返す。

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use trainflow_domain::{
    notification::{EmailFields, EmailTemplateKind},
    preferences::EmailPreferences,
    user::UserId,
};
use trainflow_shared::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::CoreError,
    middleware::CurrentUser,
    usecase::{EmailUseCaseImpl, email::MassEmailInput},
};

pub struct EmailState {
    pub usecase: EmailUseCaseImpl,
}

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub kind:   EmailTemplateKind,
    #[serde(flatten)]
    pub fields: EmailFields,
}

#[derive(Debug, Serialize)]
pub struct SendEmailDto {
    pub success: bool,
    pub error:   Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MassEmailRequest {
    #[validate(length(min = 1, message = "宛先を 1 人以上指定してください"))]
    pub recipient_ids: Vec<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub subject:       String,
    #[validate(length(min = 1))]
    pub body:          String,
}

#[derive(Debug, Serialize)]
pub struct MassEmailDto {
    pub sent:   usize,
    pub failed: usize,
}

/// 受信設定の更新内容（対象は常にログイン中の職員）
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePreferencesRequest {
    pub notify_on_approval:          bool,
    pub notify_on_denial:            bool,
    pub notify_on_submission:        bool,
    pub notify_on_cert_expiry:       bool,
    pub notify_on_training_reminder: bool,
    pub reminder_days_before:        i32,
    pub cert_expiry_days_before:     i32,
    #[validate(length(min = 1, max = 100))]
    pub from_name:                   String,
    #[validate(email)]
    pub reply_to_email:              Option<String>,
    #[validate(length(max = 2000))]
    pub email_signature:             Option<String>,
}

impl UpdatePreferencesRequest {
    fn into_preferences(self, user_id: UserId) -> EmailPreferences {
        EmailPreferences {
            user_id,
            notify_on_approval: self.notify_on_approval,
            notify_on_denial: self.notify_on_denial,
            notify_on_submission: self.notify_on_submission,
            notify_on_cert_expiry: self.notify_on_cert_expiry,
            notify_on_training_reminder: self.notify_on_training_reminder,
            reminder_days_before: self.reminder_days_before,
            cert_expiry_days_before: self.cert_expiry_days_before,
            from_name: self.from_name,
            reply_to_email: self.reply_to_email,
            email_signature: self.email_signature,
        }
    }
}

/// GET /api/email-preferences
pub async fn get_preferences(
    State(state): State<Arc<EmailState>>,
    user: CurrentUser,
) -> Result<Response, CoreError> {
    let preferences = state.usecase.get_preferences(&user.user_id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(preferences))).into_response())
}

/// PUT /api/email-preferences
pub async fn update_preferences(
    State(state): State<Arc<EmailState>>,
    user: CurrentUser,
    Json(req): Json<UpdatePreferencesRequest>,
) -> Result<Response, CoreError> {
    req.validate()?;
    let preferences = req.into_preferences(user.user_id.clone());

    let saved = state
        .usecase
        .update_preferences(&user.user_id, preferences)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(saved))).into_response())
}

/// POST /api/emails
#[tracing::instrument(skip_all, fields(kind = %req.kind))]
pub async fn send_email(
    State(state): State<Arc<EmailState>>,
    user: CurrentUser,
    Json(req): Json<SendEmailRequest>,
) -> Result<Response, CoreError> {
    user.require_administrative()?;

    let result = state.usecase.send(&user.user_id, req.kind, req.fields).await;
    let dto = SendEmailDto {
        success: result.success,
        error:   result.error,
    };
    Ok((StatusCode::OK, Json(ApiResponse::new(dto))).into_response())
}

/// POST /api/emails/mass
#[tracing::instrument(skip_all)]
pub async fn send_mass_email(
    State(state): State<Arc<EmailState>>,
    user: CurrentUser,
    Json(req): Json<MassEmailRequest>,
) -> Result<Response, CoreError> {
    user.require_administrative()?;
    req.validate()?;

    let input = MassEmailInput {
        recipient_ids: req.recipient_ids.into_iter().map(UserId::from_uuid).collect(),
        subject:       req.subject,
        body:          req.body,
    };
    let result = state.usecase.send_mass(&user.user_id, input).await?;
    let dto = MassEmailDto {
        sent:   result.sent,
        failed: result.failed,
    };
    Ok((StatusCode::OK, Json(ApiResponse::new(dto))).into_response())
}
