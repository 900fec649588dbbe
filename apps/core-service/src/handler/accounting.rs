//! # 会計 API ハンドラ
//!
//! すべて accounting / administrator ロールのみ。
//!
//! ## エンドポイント
//!
//! - `GET|POST /api/costs`、`GET /api/costs/summary/{user_id}`、
//!   `POST /api/costs/{id}/payment-status`
//! - `GET|PUT /api/budgets/{fiscal_year}`、`GET /api/budgets/{fiscal_year}/status`
//! - `GET|POST /api/invoices`、`POST /api/invoices/{id}/status`
//! - `GET|POST /api/payment-batches`、`POST /api/payment-batches/{id}/status`
//!
//! ドメインの会計エンティティはそのまま JSON にする。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;
use trainflow_domain::{
    accounting::{
        CostId,
        CostType,
        InvoiceId,
        InvoiceStatus,
        PaymentBatchId,
        PaymentBatchStatus,
        PaymentStatus,
    },
    request::TrainingRequestId,
    user::UserId,
    value_objects::{FiscalYear, Money},
};
use trainflow_shared::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::CoreError,
    middleware::CurrentUser,
    usecase::{
        AccountingUseCaseImpl,
        accounting::{CreateInvoiceInput, CreatePaymentBatchInput, RecordCostInput},
    },
};

pub struct AccountingState {
    pub usecase: AccountingUseCaseImpl,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordCostRequest {
    pub user_id:             Uuid,
    pub training_request_id: Option<Uuid>,
    /// セント単位
    pub amount:              Money,
    pub cost_type:           CostType,
    #[validate(length(min = 1, max = 500))]
    pub description:         String,
    #[validate(length(max = 50))]
    pub budget_code:         Option<String>,
    pub fiscal_year:         FiscalYear,
}

#[derive(Debug, Deserialize)]
pub struct PaymentStatusRequest {
    pub status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetBudgetRequest {
    pub total_budget: Money,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, max = 50))]
    pub invoice_number: String,
    #[validate(length(min = 1, max = 200))]
    pub vendor:         String,
    pub amount:         Money,
    pub invoice_date:   NaiveDate,
    pub due_date:       Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceStatusRequest {
    pub status: InvoiceStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentBatchRequest {
    #[validate(length(min = 1, max = 50))]
    pub batch_number: String,
    pub batch_date:   NaiveDate,
    #[validate(length(min = 1, message = "請求書を 1 件以上指定してください"))]
    pub invoice_ids:  Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentBatchStatusRequest {
    pub status: PaymentBatchStatus,
}

// ===== 費用 =====

/// GET /api/costs
pub async fn list_costs(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    let costs = state.usecase.list_costs().await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(costs))).into_response())
}

/// POST /api/costs
#[tracing::instrument(skip_all)]
pub async fn record_cost(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
    Json(req): Json<RecordCostRequest>,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    req.validate()?;

    let input = RecordCostInput {
        user_id:             UserId::from_uuid(req.user_id),
        training_request_id: req.training_request_id.map(TrainingRequestId::from_uuid),
        amount:              req.amount,
        cost_type:           req.cost_type,
        description:         req.description,
        budget_code:         req.budget_code,
        fiscal_year:         req.fiscal_year,
    };
    let cost = state.usecase.record_cost(&user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(cost))).into_response())
}

/// GET /api/costs/summary/{user_id}
pub async fn cost_summary(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    let summary = state.usecase.cost_summary(&UserId::from_uuid(user_id)).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(summary))).into_response())
}

/// POST /api/costs/{id}/payment-status
pub async fn change_payment_status(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentStatusRequest>,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    let cost = state
        .usecase
        .change_payment_status(&CostId::from_uuid(id), req.status, &user.user_id)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(cost))).into_response())
}

// ===== 予算 =====

/// GET /api/budgets/{fiscal_year}
pub async fn get_budget(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
    Path(fiscal_year): Path<String>,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    let settings = state.usecase.get_budget(&FiscalYear::new(fiscal_year)?).await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(settings))).into_response())
}

/// PUT /api/budgets/{fiscal_year}
#[tracing::instrument(skip_all, fields(%fiscal_year))]
pub async fn set_budget(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
    Path(fiscal_year): Path<String>,
    Json(req): Json<SetBudgetRequest>,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    let settings = state
        .usecase
        .set_budget(FiscalYear::new(fiscal_year)?, req.total_budget, &user.user_id)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(settings))).into_response())
}

/// GET /api/budgets/{fiscal_year}/status
pub async fn budget_status(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
    Path(fiscal_year): Path<String>,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    let status = state
        .usecase
        .budget_status(&FiscalYear::new(fiscal_year)?)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(status))).into_response())
}

// ===== 請求書 =====

/// GET /api/invoices
pub async fn list_invoices(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    let invoices = state.usecase.list_invoices().await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(invoices))).into_response())
}

/// POST /api/invoices
#[tracing::instrument(skip_all)]
pub async fn create_invoice(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    req.validate()?;

    let input = CreateInvoiceInput {
        invoice_number: req.invoice_number,
        vendor:         req.vendor,
        amount:         req.amount,
        invoice_date:   req.invoice_date,
        due_date:       req.due_date,
    };
    let invoice = state.usecase.create_invoice(&user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(invoice))).into_response())
}

/// POST /api/invoices/{id}/status
pub async fn change_invoice_status(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<InvoiceStatusRequest>,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    let invoice = state
        .usecase
        .change_invoice_status(&InvoiceId::from_uuid(id), req.status, &user.user_id)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(invoice))).into_response())
}

// ===== 支払バッチ =====

/// GET /api/payment-batches
pub async fn list_payment_batches(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    let batches = state.usecase.list_payment_batches().await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(batches))).into_response())
}

/// POST /api/payment-batches
#[tracing::instrument(skip_all)]
pub async fn create_payment_batch(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
    Json(req): Json<CreatePaymentBatchRequest>,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    req.validate()?;

    let input = CreatePaymentBatchInput {
        batch_number: req.batch_number,
        batch_date:   req.batch_date,
        invoice_ids:  req.invoice_ids.into_iter().map(InvoiceId::from_uuid).collect(),
    };
    let batch = state.usecase.create_payment_batch(&user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(batch))).into_response())
}

/// POST /api/payment-batches/{id}/status
pub async fn change_payment_batch_status(
    State(state): State<Arc<AccountingState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentBatchStatusRequest>,
) -> Result<Response, CoreError> {
    user.require_accounting()?;
    let batch = state
        .usecase
        .change_payment_batch_status(&PaymentBatchId::from_uuid(id), req.status, &user.user_id)
        .await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(batch))).into_response())
}
