//! # 認証ハンドラ
//!
//! ## エンドポイント
//!
//! - `POST /api/auth/login` - バッジ番号とパスワードでログインし、セッション Cookie を発行
//! - `POST /api/auth/logout` - セッションを破棄し、Cookie をクリア
//! - `GET /api/auth/me` - ログイン中の職員

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::Deserialize;
use trainflow_shared::ApiResponse;
use validator::Validate;

use crate::{
    error::CoreError,
    handler::user::UserDto,
    middleware::{CurrentUser, SESSION_COOKIE_NAME},
    usecase::AuthUseCaseImpl,
};

/// セッション Cookie の有効期限（秒）
const SESSION_MAX_AGE: i64 = 8 * 60 * 60;

pub struct AuthState {
    pub usecase: AuthUseCaseImpl,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "バッジ番号は必須です"))]
    pub badge_number: String,
    #[validate(length(min = 1, message = "パスワードは必須です"))]
    pub password:     String,
}

/// POST /api/auth/login
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<Response, CoreError> {
    req.validate()?;

    let outcome = state
        .usecase
        .login(&req.badge_number, &req.password)
        .await?;

    let jar = jar.add(build_session_cookie(&outcome.session_id));
    let response = ApiResponse::new(UserDto::from(&outcome.user));
    Ok((StatusCode::OK, jar, Json(response)).into_response())
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AuthState>>,
    user: CurrentUser,
    jar: CookieJar,
) -> Result<Response, CoreError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        state.usecase.logout(cookie.value(), &user.user_id).await?;
    }

    let jar = jar.add(build_clear_cookie());
    Ok((StatusCode::NO_CONTENT, jar).into_response())
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AuthState>>,
    user: CurrentUser,
) -> Result<Response, CoreError> {
    let user = state.usecase.me(&user.user_id).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(UserDto::from(&user)))).into_response())
}

/// `ENV=production` のときだけ Secure を付ける
fn build_session_cookie(session_id: &str) -> Cookie<'static> {
    let is_production = std::env::var("ENV").unwrap_or_default() == "production";

    let mut builder = Cookie::build((SESSION_COOKIE_NAME, session_id.to_string()))
        .path("/")
        .max_age(time::Duration::seconds(SESSION_MAX_AGE))
        .http_only(true)
        .same_site(SameSite::Lax);

    if is_production {
        builder = builder.secure(true);
    }

    builder.build()
}

fn build_clear_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
