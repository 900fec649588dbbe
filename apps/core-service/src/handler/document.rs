//! # 職員書類 API ハンドラ
//!
//! ファイル本体は外部ストレージにあり、ここではメタデータだけを扱う。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use trainflow_domain::document::{Document, DocumentId, DocumentType, FileMetadata};
use trainflow_shared::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::CoreError,
    middleware::CurrentUser,
    usecase::{DocumentUseCaseImpl, document::UploadDocumentInput},
};

pub struct DocumentState {
    pub usecase: DocumentUseCaseImpl,
}

#[derive(Debug, Serialize)]
pub struct DocumentDto {
    pub id:                String,
    pub user_id:           String,
    pub document_type:     DocumentType,
    pub title:             String,
    pub file:              FileMetadata,
    pub issue_date:        Option<NaiveDate>,
    pub expiration_date:   Option<NaiveDate>,
    pub issuing_authority: Option<String>,
    pub verified:          bool,
    pub verified_by:       Option<String>,
    pub verified_at:       Option<DateTime<Utc>>,
    pub created_at:        DateTime<Utc>,
}

impl From<&Document> for DocumentDto {
    fn from(d: &Document) -> Self {
        Self {
            id:                d.id().to_string(),
            user_id:           d.user_id().to_string(),
            document_type:     d.document_type(),
            title:             d.title().to_string(),
            file:              d.file().clone(),
            issue_date:        d.issue_date(),
            expiration_date:   d.expiration_date(),
            issuing_authority: d.issuing_authority().map(str::to_string),
            verified:          d.is_verified(),
            verified_by:       d.verification().map(|v| v.verified_by.to_string()),
            verified_at:       d.verification().map(|v| v.verified_at),
            created_at:        d.created_at(),
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentScope {
    #[default]
    Own,
    /// 確認待ちの全職員の書類（管理系ロールのみ）
    Unverified,
}

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    #[serde(default)]
    pub scope: DocumentScope,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UploadDocumentRequest {
    pub document_type:     DocumentType,
    #[validate(length(min = 1, max = 200))]
    pub title:             String,
    pub file:              FileMetadata,
    pub issue_date:        Option<NaiveDate>,
    pub expiration_date:   Option<NaiveDate>,
    #[validate(length(max = 200))]
    pub issuing_authority: Option<String>,
}

/// GET /api/documents
pub async fn list_documents(
    State(state): State<Arc<DocumentState>>,
    user: CurrentUser,
    Query(query): Query<DocumentQuery>,
) -> Result<Response, CoreError> {
    let documents = match query.scope {
        DocumentScope::Own => state.usecase.list_for_user(&user.user_id).await?,
        DocumentScope::Unverified => {
            user.require_administrative()?;
            state.usecase.list_unverified().await?
        }
    };
    let response = ApiResponse::new(documents.iter().map(DocumentDto::from).collect::<Vec<_>>());
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// POST /api/documents
#[tracing::instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn upload_document(
    State(state): State<Arc<DocumentState>>,
    user: CurrentUser,
    Json(req): Json<UploadDocumentRequest>,
) -> Result<Response, CoreError> {
    req.validate()?;

    let input = UploadDocumentInput {
        document_type:     req.document_type,
        title:             req.title,
        file:              req.file,
        issue_date:        req.issue_date,
        expiration_date:   req.expiration_date,
        issuing_authority: req.issuing_authority,
    };
    let document = state.usecase.upload(&user.user_id, input).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(DocumentDto::from(&document)))).into_response())
}

/// POST /api/documents/{id}/verify
pub async fn verify_document(
    State(state): State<Arc<DocumentState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, CoreError> {
    user.require_administrative()?;
    let document = state
        .usecase
        .verify(&DocumentId::from_uuid(id), &user.user_id)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(DocumentDto::from(&document)))).into_response())
}
