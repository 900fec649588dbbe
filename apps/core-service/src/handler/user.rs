//! # 職員 API ハンドラ

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use trainflow_domain::{
    user::{BadgeNumber, Email, Platoon, ProfileUpdate, User, UserId, UserRole},
    value_objects::PersonName,
};
use trainflow_shared::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::CoreError,
    middleware::CurrentUser,
    usecase::{UserUseCaseImpl, user::CreateUserInput},
};

pub struct UserState {
    pub usecase: UserUseCaseImpl,
}

/// 職員 DTO（パスワードハッシュは含まない）
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id:            String,
    pub badge_number:  String,
    pub first_name:    String,
    pub last_name:     String,
    pub full_name:     String,
    pub email:         String,
    pub role:          UserRole,
    pub rank:          String,
    pub supervisor_id: Option<String>,
    pub platoon:       Option<Platoon>,
    pub created_at:    String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id:            user.id().to_string(),
            badge_number:  user.badge_number().as_str().to_string(),
            first_name:    user.first_name().as_str().to_string(),
            last_name:     user.last_name().as_str().to_string(),
            full_name:     user.full_name(),
            email:         user.email().as_str().to_string(),
            role:          user.role(),
            rank:          user.rank().to_string(),
            supervisor_id: user.supervisor_id().map(ToString::to_string),
            platoon:       user.platoon(),
            created_at:    user.created_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 20))]
    pub badge_number:  String,
    #[validate(length(min = 1, max = 100))]
    pub first_name:    String,
    #[validate(length(min = 1, max = 100))]
    pub last_name:     String,
    #[validate(email)]
    pub email:         String,
    pub role:          UserRole,
    #[serde(default)]
    pub rank:          String,
    pub supervisor_id: Option<Uuid>,
    pub platoon:       Option<Platoon>,
    pub password:      String,
}

/// 省略した項目は変更しない。`platoon: null` は勤務班を外す
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name:  Option<String>,
    #[validate(email)]
    pub email:      Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub platoon:    Option<Option<Platoon>>,
}

/// `Option<Option<T>>` で「未指定」と「null」を区別する
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<UserState>>,
    _user: CurrentUser,
) -> Result<Response, CoreError> {
    let users = state.usecase.list().await?;
    let response = ApiResponse::new(users.iter().map(UserDto::from).collect::<Vec<_>>());
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<Arc<UserState>>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, CoreError> {
    let user = state.usecase.get(&UserId::from_uuid(id)).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(UserDto::from(&user)))).into_response())
}

/// POST /api/users（管理系ロールのみ）
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<Arc<UserState>>,
    user: CurrentUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<Response, CoreError> {
    user.require_administrative()?;
    req.validate()?;

    let input = CreateUserInput {
        badge_number:  BadgeNumber::new(req.badge_number)?,
        first_name:    PersonName::new(req.first_name)?,
        last_name:     PersonName::new(req.last_name)?,
        email:         Email::new(req.email)?,
        role:          req.role,
        rank:          req.rank,
        supervisor_id: req.supervisor_id.map(UserId::from_uuid),
        platoon:       req.platoon,
        password:      req.password,
    };
    let created = state.usecase.create(input).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(UserDto::from(&created)))).into_response())
}

/// PATCH /api/users/{id}
pub async fn update_profile(
    State(state): State<Arc<UserState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Response, CoreError> {
    req.validate()?;

    let update = ProfileUpdate {
        first_name: req.first_name.map(PersonName::new).transpose()?,
        last_name:  req.last_name.map(PersonName::new).transpose()?,
        email:      req.email.map(Email::new).transpose()?,
        platoon:    req.platoon,
    };
    let updated = state
        .usecase
        .update_profile(&UserId::from_uuid(id), &user.user_id, user.role, update)
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(UserDto::from(&updated)))).into_response())
}
