//! # 会計
//!
//! 研修費用・予算・請求書・支払バッチを扱う。
//!
//! ## 状態遷移
//!
//! - 費用の支払状況: `pending → approved | rejected`、`approved → paid`
//! - 請求書: 前進のみ。`paid` 以外からは `rejected` にできる
//! - 支払バッチ: `draft → pending → submitted → approved → processed → completed` の前進のみ

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    notification::{NotificationDraft, NotificationKind},
    request::TrainingRequestId,
    user::UserId,
    value_objects::{FiscalYear, Money},
};

/// 予算未設定時の年間予算
pub const DEFAULT_TOTAL_BUDGET: Money = Money::from_dollars(150_000);

// ============================================================================
// 研修費用
// ============================================================================

define_uuid_id! {
    /// 研修費用 ID
    pub struct CostId;
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CostType {
    Training,
    Travel,
    Materials,
    Overtime,
    Other,
}

impl std::str::FromStr for CostType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "training" => Ok(Self::Training),
            "travel" => Ok(Self::Travel),
            "materials" => Ok(Self::Materials),
            "overtime" => Ok(Self::Overtime),
            "other" => Ok(Self::Other),
            _ => Err(DomainError::Validation(format!("不正な費用種別: {s}"))),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Paid,
    Rejected,
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "paid" => Ok(Self::Paid),
            "rejected" => Ok(Self::Rejected),
            _ => Err(DomainError::Validation(format!("不正な支払状況: {s}"))),
        }
    }
}

impl PaymentStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Paid)
        )
    }
}

/// 職員ごとの研修費用
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfficerTrainingCost {
    pub id: CostId,
    pub user_id: UserId,
    pub training_request_id: Option<TrainingRequestId>,
    pub amount: Money,
    pub cost_type: CostType,
    pub description: String,
    pub budget_code: Option<String>,
    pub fiscal_year: FiscalYear,
    pub payment_status: PaymentStatus,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewCost {
    pub id: CostId,
    pub user_id: UserId,
    pub training_request_id: Option<TrainingRequestId>,
    pub amount: Money,
    pub cost_type: CostType,
    pub description: String,
    pub budget_code: Option<String>,
    pub fiscal_year: FiscalYear,
    pub now: DateTime<Utc>,
}

impl OfficerTrainingCost {
    pub fn record(params: NewCost) -> Result<Self, DomainError> {
        params.amount.positive_amount("金額")?;
        if params.description.trim().is_empty() {
            return Err(DomainError::Validation("費用の説明は必須です".to_string()));
        }
        Ok(Self {
            id: params.id,
            user_id: params.user_id,
            training_request_id: params.training_request_id,
            amount: params.amount,
            cost_type: params.cost_type,
            description: params.description.trim().to_string(),
            budget_code: params.budget_code,
            fiscal_year: params.fiscal_year,
            payment_status: PaymentStatus::Pending,
            approved_by: None,
            approved_at: None,
            created_at: params.now,
            updated_at: params.now,
        })
    }

    /// 支払状況を変更する。承認・却下では操作者を記録する
    pub fn change_payment_status(
        self,
        next: PaymentStatus,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if !self.payment_status.can_transition_to(next) {
            return Err(DomainError::Validation(format!(
                "支払状況を {} から {} に変更できません",
                self.payment_status, next
            )));
        }
        let (approved_by, approved_at) = match next {
            PaymentStatus::Approved | PaymentStatus::Rejected => (Some(actor), Some(now)),
            _ => (self.approved_by.clone(), self.approved_at),
        };
        Ok(Self {
            payment_status: next,
            approved_by,
            approved_at,
            updated_at: now,
            ..self
        })
    }
}

/// 職員ごとの費用集計
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CostSummary {
    pub total: Money,
    /// 未払い分（pending と approved）
    pub pending: Money,
    pub paid: Money,
}

impl CostSummary {
    pub fn from_costs<'a>(costs: impl IntoIterator<Item = &'a OfficerTrainingCost>) -> Self {
        costs.into_iter().fold(
            Self {
                total: Money::ZERO,
                pending: Money::ZERO,
                paid: Money::ZERO,
            },
            |acc, cost| match cost.payment_status {
                PaymentStatus::Pending | PaymentStatus::Approved => Self {
                    total: acc.total + cost.amount,
                    pending: acc.pending + cost.amount,
                    ..acc
                },
                PaymentStatus::Paid => Self {
                    total: acc.total + cost.amount,
                    paid: acc.paid + cost.amount,
                    ..acc
                },
                PaymentStatus::Rejected => acc,
            },
        )
    }
}

// ============================================================================
// 予算
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetSettings {
    pub fiscal_year: FiscalYear,
    pub total_budget: Money,
    pub updated_by: Option<UserId>,
    pub updated_at: DateTime<Utc>,
}

impl BudgetSettings {
    pub fn new(
        fiscal_year: FiscalYear,
        total_budget: Money,
        updated_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        total_budget.positive_amount("予算")?;
        Ok(Self {
            fiscal_year,
            total_budget,
            updated_by: Some(updated_by),
            updated_at: now,
        })
    }
}

/// 予算消化率のしきい値
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BudgetThreshold {
    /// 75% 以上
    Alert,
    /// 90% 以上
    Warning,
    /// 100% 以上
    Critical,
}

impl BudgetThreshold {
    pub fn for_percent(percent_used: f64) -> Option<Self> {
        if percent_used >= 100.0 {
            Some(Self::Critical)
        } else if percent_used >= 90.0 {
            Some(Self::Warning)
        } else if percent_used >= 75.0 {
            Some(Self::Alert)
        } else {
            None
        }
    }
}

/// 予算の消化状況
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub fiscal_year: FiscalYear,
    pub total_budget: Money,
    pub spent: Money,
    pub remaining: Money,
    pub percent_used: f64,
    pub threshold: Option<BudgetThreshold>,
}

impl BudgetStatus {
    pub fn compute(fiscal_year: FiscalYear, total_budget: Money, spent: Money) -> Self {
        let percent_used = spent.percent_of(total_budget);
        Self {
            fiscal_year,
            total_budget,
            spent,
            remaining: total_budget - spent,
            percent_used,
            threshold: BudgetThreshold::for_percent(percent_used),
        }
    }

    /// しきい値を超えていれば会計担当への警告通知を組み立てる
    pub fn warning_for(&self, user_id: UserId) -> Option<NotificationDraft> {
        let fy = self.fiscal_year.as_str();
        let percent = self.percent_used;
        let (message, kind) = match self.threshold? {
            BudgetThreshold::Critical => (
                format!(
                    "CRITICAL: Training budget for FY{fy} has been exceeded! Current spending: {} of {} ({percent:.1}%)",
                    self.spent, self.total_budget
                ),
                NotificationKind::Error,
            ),
            BudgetThreshold::Warning => (
                format!(
                    "WARNING: Training budget for FY{fy} is at {percent:.1}%. Only {} remaining.",
                    self.remaining
                ),
                NotificationKind::Error,
            ),
            BudgetThreshold::Alert => (
                format!(
                    "Budget Alert: Training budget for FY{fy} is at {percent:.1}%. {} remaining.",
                    self.remaining
                ),
                NotificationKind::Warning,
            ),
        };
        Some(NotificationDraft::new(user_id, "Budget Warning", message, kind).with_link("/accounting"))
    }
}

// ============================================================================
// 請求書
// ============================================================================

define_uuid_id! {
    /// 請求書 ID
    pub struct InvoiceId;
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Received,
    Processing,
    Approved,
    Paid,
    Rejected,
}

impl std::str::FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "received" => Ok(Self::Received),
            "processing" => Ok(Self::Processing),
            "approved" => Ok(Self::Approved),
            "paid" => Ok(Self::Paid),
            "rejected" => Ok(Self::Rejected),
            _ => Err(DomainError::Validation(format!(
                "不正な請求書ステータス: {s}"
            ))),
        }
    }
}

impl InvoiceStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Paid | Self::Rejected, _) => false,
            (_, Self::Rejected) => true,
            (current, next) => next > current,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub vendor: String,
    pub amount: Money,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub batch_id: Option<PaymentBatchId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewInvoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub vendor: String,
    pub amount: Money,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub created_by: UserId,
    pub now: DateTime<Utc>,
}

impl Invoice {
    pub fn new(params: NewInvoice) -> Result<Self, DomainError> {
        if params.invoice_number.trim().is_empty() || params.vendor.trim().is_empty() {
            return Err(DomainError::Validation(
                "請求書番号と取引先は必須です".to_string(),
            ));
        }
        params.amount.positive_amount("請求金額")?;
        if params.due_date.is_some_and(|due| due < params.invoice_date) {
            return Err(DomainError::Validation(
                "支払期日は請求日以降である必要があります".to_string(),
            ));
        }
        Ok(Self {
            id: params.id,
            invoice_number: params.invoice_number.trim().to_string(),
            vendor: params.vendor.trim().to_string(),
            amount: params.amount,
            invoice_date: params.invoice_date,
            due_date: params.due_date,
            status: InvoiceStatus::Pending,
            batch_id: None,
            created_by: params.created_by,
            created_at: params.now,
            updated_at: params.now,
        })
    }

    pub fn change_status(self, next: InvoiceStatus, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::Validation(format!(
                "請求書のステータスを {} から {} に変更できません",
                self.status, next
            )));
        }
        Ok(Self {
            status: next,
            updated_at: now,
            ..self
        })
    }

    /// 支払バッチに組み込める状態か
    pub fn is_batchable(&self) -> bool {
        self.status == InvoiceStatus::Approved && self.batch_id.is_none()
    }
}

// ============================================================================
// 支払バッチ
// ============================================================================

define_uuid_id! {
    /// 支払バッチ ID
    pub struct PaymentBatchId;
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentBatchStatus {
    Draft,
    Pending,
    Submitted,
    Approved,
    Processed,
    Completed,
}

impl std::str::FromStr for PaymentBatchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "submitted" => Ok(Self::Submitted),
            "approved" => Ok(Self::Approved),
            "processed" => Ok(Self::Processed),
            "completed" => Ok(Self::Completed),
            _ => Err(DomainError::Validation(format!(
                "不正な支払バッチステータス: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentBatch {
    pub id: PaymentBatchId,
    pub batch_number: String,
    pub batch_date: NaiveDate,
    pub total_amount: Money,
    pub invoice_count: i32,
    pub status: PaymentBatchStatus,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewPaymentBatch {
    pub id: PaymentBatchId,
    pub batch_number: String,
    pub batch_date: NaiveDate,
    pub created_by: UserId,
    pub now: DateTime<Utc>,
}

impl PaymentBatch {
    /// 承認済みかつ未バッチの請求書からバッチを組み立てる
    ///
    /// 合計金額と件数は請求書から計算する。
    pub fn assemble(params: NewPaymentBatch, invoices: &[Invoice]) -> Result<Self, DomainError> {
        if params.batch_number.trim().is_empty() {
            return Err(DomainError::Validation("バッチ番号は必須です".to_string()));
        }
        if invoices.is_empty() {
            return Err(DomainError::Validation(
                "支払バッチには 1 件以上の請求書が必要です".to_string(),
            ));
        }
        if let Some(invoice) = invoices.iter().find(|invoice| !invoice.is_batchable()) {
            return Err(DomainError::Validation(format!(
                "請求書 {} はバッチに含められません（ステータス: {}）",
                invoice.invoice_number, invoice.status
            )));
        }
        let invoice_count = i32::try_from(invoices.len()).map_err(|_| {
            DomainError::Validation("請求書の件数が多すぎます".to_string())
        })?;

        Ok(Self {
            id: params.id,
            batch_number: params.batch_number.trim().to_string(),
            batch_date: params.batch_date,
            total_amount: invoices.iter().map(|invoice| invoice.amount).sum(),
            invoice_count,
            status: PaymentBatchStatus::Draft,
            created_by: params.created_by,
            created_at: params.now,
            updated_at: params.now,
        })
    }

    pub fn change_status(
        self,
        next: PaymentBatchStatus,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if next <= self.status {
            return Err(DomainError::Validation(format!(
                "支払バッチのステータスを {} から {} に戻せません",
                self.status, next
            )));
        }
        Ok(Self {
            status: next,
            updated_at: now,
            ..self
        })
    }
}
