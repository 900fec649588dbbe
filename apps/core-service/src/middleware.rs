//! # 認証ミドルウェア
//!
//! `session_id` Cookie から Redis セッションを引き、[`CurrentUser`] をリクエストの
//! extensions に入れる。ハンドラは `CurrentUser` を引数に取るだけで呼び出し元を知れる。
//!
//! ```rust,ignore
//! use axum::middleware::from_fn_with_state;
//!
//! Router::new()
//!     .route("/api/requests", get(list_requests))
//!     .layer(from_fn_with_state(session_state, require_session))
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use trainflow_domain::{
    clock::Clock,
    user::{UserId, UserRole},
};
use trainflow_infra::{SessionData, SessionManager};
use trainflow_shared::event_log::error;

use crate::error::CoreError;

/// セッション Cookie 名
pub const SESSION_COOKIE_NAME: &str = "session_id";

/// 認証ミドルウェアの状態
#[derive(Clone)]
pub struct SessionState {
    pub session_manager: Arc<dyn SessionManager>,
    pub clock:           Arc<dyn Clock>,
}

/// ログイン中のユーザー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id:      UserId,
    pub badge_number: String,
    pub name:         String,
    pub role:         UserRole,
}

impl From<&SessionData> for CurrentUser {
    fn from(session: &SessionData) -> Self {
        Self {
            user_id:      session.user_id().clone(),
            badge_number: session.badge_number().to_string(),
            name:         session.name().to_string(),
            role:         session.role(),
        }
    }
}

impl CurrentUser {
    /// administrator / training_coordinator 以外は 403
    pub fn require_administrative(&self) -> Result<(), CoreError> {
        if self.role.is_administrative() {
            Ok(())
        } else {
            Err(CoreError::Forbidden("管理者権限が必要です".to_string()))
        }
    }

    /// accounting / administrator 以外は 403
    pub fn require_accounting(&self) -> Result<(), CoreError> {
        if self.role.can_manage_accounting() {
            Ok(())
        } else {
            Err(CoreError::Forbidden("経理権限が必要です".to_string()))
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| CoreError::Unauthorized("ログインしてください".to_string()))
    }
}

/// セッションを検証するミドルウェア
///
/// Cookie がない、またはセッションが期限切れなら 401 を返す。
pub async fn require_session(
    State(state): State<SessionState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(session_id) = jar.get(SESSION_COOKIE_NAME).map(|c| c.value().to_string()) else {
        return CoreError::Unauthorized("ログインしてください".to_string()).into_response();
    };

    let session = match state
        .session_manager
        .get(&session_id, state.clock.now())
        .await
    {
        Ok(Some(session)) => session,
        Ok(None) => {
            return CoreError::Unauthorized("セッションの有効期限が切れています".to_string())
                .into_response();
        }
        Err(e) => {
            tracing::error!(
                error.category = error::category::INFRASTRUCTURE,
                error.kind = error::kind::SESSION,
                "セッションの取得に失敗: {}",
                e
            );
            return CoreError::Internal("セッションの取得に失敗しました".to_string())
                .into_response();
        }
    };

    tracing::Span::current().record("user_id", tracing::field::display(session.user_id()));
    request.extensions_mut().insert(CurrentUser::from(&session));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        http::{StatusCode, header},
        middleware::from_fn_with_state,
        routing::get,
    };
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;
    use trainflow_domain::clock::FixedClock;
    use trainflow_infra::mock::MockSessionManager;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    async fn whoami(user: CurrentUser) -> String {
        format!("{}:{}", user.badge_number, user.role)
    }

    fn app(session_manager: MockSessionManager) -> Router {
        let state = SessionState {
            session_manager: Arc::new(session_manager),
            clock:           Arc::new(FixedClock::new(now())),
        };
        Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn_with_state(state, require_session))
    }

    fn request(cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_cookieがなければ401() {
        let response = app(MockSessionManager::new())
            .oneshot(request(None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_存在しないセッションは401() {
        let response = app(MockSessionManager::new())
            .oneshot(request(Some("session_id=unknown")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_有効なセッションならcurrent_userが渡る() {
        let manager = MockSessionManager::new();
        let data = SessionData::new(
            UserId::new(),
            "S2001".to_string(),
            "Dana Brooks".to_string(),
            UserRole::Supervisor,
            now(),
        );
        let session_id = manager.create(&data).await.unwrap();

        let response = app(manager)
            .oneshot(request(Some(&format!("session_id={session_id}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"S2001:supervisor");
    }

    #[test]
    fn test_ロール要件のチェック() {
        let user = CurrentUser {
            user_id:      UserId::new(),
            badge_number: "A1001".to_string(),
            name:         "Jordan Hale".to_string(),
            role:         UserRole::Accounting,
        };

        assert!(user.require_accounting().is_ok());
        assert!(matches!(
            user.require_administrative(),
            Err(CoreError::Forbidden(_))
        ));
    }
}
