//! # Core Service エラー定義
//!
//! ユースケースが返す [`CoreError`] と、RFC 9457 Problem Details への変換を定義する。
//!
//! | バリアント | HTTP |
//! |------------|------|
//! | `BadRequest` | 400 |
//! | `Unauthorized` | 401 |
//! | `Forbidden` | 403 |
//! | `NotFound` | 404 |
//! | `Conflict` | 409 |
//! | `Database` / `Internal` | 500（detail は固定、内容はログのみ） |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use trainflow_domain::DomainError;
use trainflow_infra::{InfraError, error::InfraErrorKind};
use trainflow_shared::{ErrorResponse, event_log::error};

/// Core Service で発生するエラー
#[derive(Debug, Error)]
pub enum CoreError {
    /// 不正なリクエスト（入力検証、終端状態への操作）
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// 未認証（セッションなし、期限切れ、認証失敗）
    #[error("認証が必要です: {0}")]
    Unauthorized(String),

    /// 権限不足
    #[error("権限がありません: {0}")]
    Forbidden(String),

    /// リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 競合（別の承認者が先に状態を進めた等）
    #[error("競合が発生しました: {0}")]
    Conflict(String),

    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(InfraError),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl From<InfraError> for CoreError {
    fn from(err: InfraError) -> Self {
        match err.kind() {
            InfraErrorKind::Conflict { entity, .. } => Self::Conflict(format!(
                "{entity} の状態が他の操作で変更されました。再読み込みしてください"
            )),
            InfraErrorKind::InvalidInput(msg) => Self::BadRequest(msg.clone()),
            _ => Self::Database(err),
        }
    }
}

impl From<DomainError> for CoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::BadRequest(msg),
            DomainError::NotFound { .. } => Self::NotFound(err.to_string()),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::Forbidden(msg) => Self::Forbidden(msg),
        }
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::BadRequest(errors.to_string())
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let body = match &self {
            CoreError::BadRequest(msg) => ErrorResponse::bad_request(msg),
            CoreError::Unauthorized(msg) => ErrorResponse::unauthorized(msg),
            CoreError::Forbidden(msg) => ErrorResponse::forbidden(msg),
            CoreError::NotFound(msg) => ErrorResponse::not_found(msg),
            CoreError::Conflict(msg) => ErrorResponse::conflict(msg),
            CoreError::Database(e) => {
                tracing::error!(
                    error.category = error::category::INFRASTRUCTURE,
                    error.kind = error::kind::DATABASE,
                    "データベースエラー: {}",
                    e
                );
                ErrorResponse::internal_error()
            }
            CoreError::Internal(msg) => {
                tracing::error!(
                    error.category = error::category::INFRASTRUCTURE,
                    error.kind = error::kind::INTERNAL,
                    "内部エラー: {}",
                    msg
                );
                ErrorResponse::internal_error()
            }
        };

        let status =
            StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[rstest]
    #[case(CoreError::BadRequest("x".into()), StatusCode::BAD_REQUEST)]
    #[case(CoreError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED)]
    #[case(CoreError::Forbidden("x".into()), StatusCode::FORBIDDEN)]
    #[case(CoreError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(CoreError::Conflict("x".into()), StatusCode::CONFLICT)]
    #[case(CoreError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_エラー種別ごとのステータスコード(
        #[case] error: CoreError,
        #[case] expected: StatusCode,
    ) {
        assert_eq!(error.into_response().status(), expected);
    }

    #[tokio::test]
    async fn test_内部エラーの詳細はレスポンスに含めない() {
        let response = CoreError::Internal("connection refused".into()).into_response();

        let json = body_json(response).await;
        assert_eq!(json["detail"], "内部エラーが発生しました");
        assert_eq!(
            json["type"],
            "https://trainflow.shpd.example.com/errors/internal-error"
        );
    }

    #[test]
    fn test_インフラの競合は409に変換される() {
        let err: CoreError = InfraError::conflict("TrainingRequest", "42").into();

        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn test_インフラの入力エラーは400に変換される() {
        let err: CoreError = InfraError::invalid_input("検証情報のないドキュメントです").into();

        assert!(matches!(err, CoreError::BadRequest(msg) if msg == "検証情報のないドキュメントです"));
    }

    #[test]
    fn test_ドメインエラーの変換() {
        let validation: CoreError = DomainError::Validation("却下理由は必須です".into()).into();
        let forbidden: CoreError = DomainError::Forbidden("x".into()).into();
        let not_found: CoreError = DomainError::NotFound {
            entity_type: "TrainingRequest",
            id:          "1".into(),
        }
        .into();

        assert!(matches!(validation, CoreError::BadRequest(msg) if msg == "却下理由は必須です"));
        assert!(matches!(forbidden, CoreError::Forbidden(_)));
        assert!(matches!(not_found, CoreError::NotFound(_)));
    }
}
