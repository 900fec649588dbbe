//! # 研修カタログ API ハンドラ

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Serialize;
use trainflow_domain::training::{TrainingId, TrainingOpportunity};
use trainflow_shared::ApiResponse;
use uuid::Uuid;

use crate::{error::CoreError, middleware::CurrentUser, usecase::TrainingUseCaseImpl};

pub struct TrainingState {
    pub usecase: TrainingUseCaseImpl,
}

#[derive(Debug, Serialize)]
pub struct TrainingDto {
    pub id:          String,
    pub title:       String,
    pub description: String,
    pub category:    String,
    pub date:        NaiveDate,
    pub location:    String,
    pub instructor:  String,
    pub capacity:    i32,
    pub enrolled:    i32,
    pub seats_left:  i32,
    pub credits:     i32,
    pub mandatory:   bool,
    pub cpt_hours:   Option<f64>,
}

impl From<&TrainingOpportunity> for TrainingDto {
    fn from(t: &TrainingOpportunity) -> Self {
        Self {
            id:          t.id.to_string(),
            title:       t.title.clone(),
            description: t.description.clone(),
            category:    t.category.clone(),
            date:        t.date,
            location:    t.location.clone(),
            instructor:  t.instructor.clone(),
            capacity:    t.capacity,
            enrolled:    t.enrolled,
            seats_left:  t.seats_left(),
            credits:     t.credits,
            mandatory:   t.mandatory,
            cpt_hours:   t.cpt_hours,
        }
    }
}

/// GET /api/trainings
pub async fn list_trainings(
    State(state): State<Arc<TrainingState>>,
    _user: CurrentUser,
) -> Result<Response, CoreError> {
    let trainings = state.usecase.list().await?;
    let response = ApiResponse::new(trainings.iter().map(TrainingDto::from).collect::<Vec<_>>());
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// GET /api/trainings/{id}
pub async fn get_training(
    State(state): State<Arc<TrainingState>>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, CoreError> {
    let training = state.usecase.get(&TrainingId::from_uuid(id)).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(TrainingDto::from(&training)))).into_response())
}
