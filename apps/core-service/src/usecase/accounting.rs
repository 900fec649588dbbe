//! # 会計ユースケース
//!
//! 職員ごとの研修費用、年度予算、請求書、支払バッチを扱う。
//! 権限（accounting / administrator）はハンドラで確認済みの前提。
//!
//! ステータス変更はすべて読み取り時のステータスを条件に保存し、
//! 他の操作と競合した場合は 409 を返す。

use std::sync::Arc;

use chrono::NaiveDate;
use trainflow_domain::{
    accounting::{
        BudgetSettings,
        BudgetStatus,
        CostId,
        CostSummary,
        CostType,
        DEFAULT_TOTAL_BUDGET,
        Invoice,
        InvoiceId,
        InvoiceStatus,
        NewCost,
        NewInvoice,
        NewPaymentBatch,
        OfficerTrainingCost,
        PaymentBatch,
        PaymentBatchId,
        PaymentBatchStatus,
        PaymentStatus,
    },
    clock::Clock,
    request::TrainingRequestId,
    user::UserId,
    value_objects::{FiscalYear, Money},
};
use trainflow_infra::repository::{
    BudgetRepository,
    CostRepository,
    InvoiceRepository,
    PaymentBatchRepository,
};
use trainflow_shared::{event_log::event, log_business_event};

use crate::{error::CoreError, usecase::helpers::FindResultExt};

#[derive(Debug, Clone)]
pub struct RecordCostInput {
    pub user_id: UserId,
    pub training_request_id: Option<TrainingRequestId>,
    pub amount: Money,
    pub cost_type: CostType,
    pub description: String,
    pub budget_code: Option<String>,
    pub fiscal_year: FiscalYear,
}

#[derive(Debug, Clone)]
pub struct CreateInvoiceInput {
    pub invoice_number: String,
    pub vendor: String,
    pub amount: Money,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentBatchInput {
    pub batch_number: String,
    pub batch_date: NaiveDate,
    pub invoice_ids: Vec<InvoiceId>,
}

pub struct AccountingUseCaseImpl {
    cost_repo: Arc<dyn CostRepository>,
    budget_repo: Arc<dyn BudgetRepository>,
    invoice_repo: Arc<dyn InvoiceRepository>,
    batch_repo: Arc<dyn PaymentBatchRepository>,
    clock: Arc<dyn Clock>,
}

impl AccountingUseCaseImpl {
    pub fn new(
        cost_repo: Arc<dyn CostRepository>,
        budget_repo: Arc<dyn BudgetRepository>,
        invoice_repo: Arc<dyn InvoiceRepository>,
        batch_repo: Arc<dyn PaymentBatchRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cost_repo,
            budget_repo,
            invoice_repo,
            batch_repo,
            clock,
        }
    }

    // ===== 費用 =====

    pub async fn record_cost(
        &self,
        actor_id: &UserId,
        input: RecordCostInput,
    ) -> Result<OfficerTrainingCost, CoreError> {
        let cost = OfficerTrainingCost::record(NewCost {
            id: CostId::new(),
            user_id: input.user_id,
            training_request_id: input.training_request_id,
            amount: input.amount,
            cost_type: input.cost_type,
            description: input.description,
            budget_code: input.budget_code,
            fiscal_year: input.fiscal_year,
            now: self.clock.now(),
        })?;
        self.cost_repo.insert(&cost).await?;

        log_business_event!(
            event.category = event::category::ACCOUNTING,
            event.action = event::action::COST_RECORDED,
            event.entity_type = event::entity_type::COST,
            event.entity_id = %cost.id,
            event.actor_id = %actor_id,
            event.result = event::result::SUCCESS,
            cost.amount_cents = cost.amount.cents(),
            "研修費用を記録"
        );
        Ok(cost)
    }

    pub async fn list_costs(&self) -> Result<Vec<OfficerTrainingCost>, CoreError> {
        Ok(self.cost_repo.find_all().await?)
    }

    /// 職員ごとの費用集計（却下分は含めない）
    pub async fn cost_summary(&self, user_id: &UserId) -> Result<CostSummary, CoreError> {
        let costs = self.cost_repo.find_by_user(user_id).await?;
        Ok(CostSummary::from_costs(&costs))
    }

    pub async fn change_payment_status(
        &self,
        id: &CostId,
        next: PaymentStatus,
        actor_id: &UserId,
    ) -> Result<OfficerTrainingCost, CoreError> {
        let cost = self.cost_repo.find_by_id(id).await.or_not_found("研修費用")?;
        let expected = cost.payment_status;
        let updated = cost.change_payment_status(next, actor_id.clone(), self.clock.now())?;
        self.cost_repo.update_payment_status(&updated, expected).await?;

        log_business_event!(
            event.category = event::category::ACCOUNTING,
            event.action = event::action::PAYMENT_STATUS_CHANGED,
            event.entity_type = event::entity_type::COST,
            event.entity_id = %updated.id,
            event.actor_id = %actor_id,
            event.result = event::result::SUCCESS,
            cost.from_status = %expected,
            cost.to_status = %next,
            "支払状況を変更"
        );
        Ok(updated)
    }

    // ===== 予算 =====

    /// 年度の予算設定（未設定なら既定額）
    pub async fn get_budget(&self, fiscal_year: &FiscalYear) -> Result<BudgetSettings, CoreError> {
        Ok(self
            .budget_repo
            .find(fiscal_year)
            .await?
            .unwrap_or_else(|| BudgetSettings {
                fiscal_year: fiscal_year.clone(),
                total_budget: DEFAULT_TOTAL_BUDGET,
                updated_by: None,
                updated_at: self.clock.now(),
            }))
    }

    pub async fn set_budget(
        &self,
        fiscal_year: FiscalYear,
        total_budget: Money,
        actor_id: &UserId,
    ) -> Result<BudgetSettings, CoreError> {
        let settings = BudgetSettings::new(fiscal_year, total_budget, actor_id.clone(), self.clock.now())?;
        self.budget_repo.upsert(&settings).await?;

        log_business_event!(
            event.category = event::category::ACCOUNTING,
            event.action = event::action::BUDGET_UPDATED,
            event.entity_type = event::entity_type::BUDGET,
            event.entity_id = %settings.fiscal_year.as_str(),
            event.actor_id = %actor_id,
            event.result = event::result::SUCCESS,
            budget.total_cents = settings.total_budget.cents(),
            "年度予算を更新"
        );
        Ok(settings)
    }

    pub async fn budget_status(&self, fiscal_year: &FiscalYear) -> Result<BudgetStatus, CoreError> {
        let settings = self.get_budget(fiscal_year).await?;
        let spent = self.cost_repo.total_for_fiscal_year(fiscal_year).await?;
        Ok(BudgetStatus::compute(
            fiscal_year.clone(),
            settings.total_budget,
            spent,
        ))
    }

    // ===== 請求書 =====

    pub async fn create_invoice(
        &self,
        actor_id: &UserId,
        input: CreateInvoiceInput,
    ) -> Result<Invoice, CoreError> {
        let invoice = Invoice::new(NewInvoice {
            id: InvoiceId::new(),
            invoice_number: input.invoice_number,
            vendor: input.vendor,
            amount: input.amount,
            invoice_date: input.invoice_date,
            due_date: input.due_date,
            created_by: actor_id.clone(),
            now: self.clock.now(),
        })?;
        self.invoice_repo.insert(&invoice).await?;

        log_business_event!(
            event.category = event::category::ACCOUNTING,
            event.action = event::action::INVOICE_CREATED,
            event.entity_type = event::entity_type::INVOICE,
            event.entity_id = %invoice.id,
            event.actor_id = %actor_id,
            event.result = event::result::SUCCESS,
            "請求書を登録"
        );
        Ok(invoice)
    }

    pub async fn list_invoices(&self) -> Result<Vec<Invoice>, CoreError> {
        Ok(self.invoice_repo.find_all().await?)
    }

    pub async fn change_invoice_status(
        &self,
        id: &InvoiceId,
        next: InvoiceStatus,
        actor_id: &UserId,
    ) -> Result<Invoice, CoreError> {
        let invoice = self.invoice_repo.find_by_id(id).await.or_not_found("請求書")?;
        let expected = invoice.status;
        let updated = invoice.change_status(next, self.clock.now())?;
        self.invoice_repo.update_status(&updated, expected).await?;

        log_business_event!(
            event.category = event::category::ACCOUNTING,
            event.action = event::action::INVOICE_STATUS_CHANGED,
            event.entity_type = event::entity_type::INVOICE,
            event.entity_id = %updated.id,
            event.actor_id = %actor_id,
            event.result = event::result::SUCCESS,
            invoice.from_status = %expected,
            invoice.to_status = %next,
            "請求書のステータスを変更"
        );
        Ok(updated)
    }

    // ===== 支払バッチ =====

    /// 承認済み・未バッチの請求書から支払バッチを作る
    ///
    /// 合計と件数は請求書から計算する。保存時に請求書が他のバッチに
    /// 取られていた場合は 409。
    pub async fn create_payment_batch(
        &self,
        actor_id: &UserId,
        input: CreatePaymentBatchInput,
    ) -> Result<PaymentBatch, CoreError> {
        let invoices = self.invoice_repo.find_by_ids(&input.invoice_ids).await?;
        if let Some(missing) = input
            .invoice_ids
            .iter()
            .find(|id| !invoices.iter().any(|invoice| &invoice.id == *id))
        {
            return Err(CoreError::NotFound(format!("請求書が見つかりません: {missing}")));
        }

        let batch = PaymentBatch::assemble(
            NewPaymentBatch {
                id: PaymentBatchId::new(),
                batch_number: input.batch_number,
                batch_date: input.batch_date,
                created_by: actor_id.clone(),
                now: self.clock.now(),
            },
            &invoices,
        )?;
        let invoice_ids: Vec<InvoiceId> = invoices.iter().map(|invoice| invoice.id.clone()).collect();
        self.batch_repo.insert_with_invoices(&batch, &invoice_ids).await?;

        log_business_event!(
            event.category = event::category::ACCOUNTING,
            event.action = event::action::PAYMENT_BATCH_CREATED,
            event.entity_type = event::entity_type::PAYMENT_BATCH,
            event.entity_id = %batch.id,
            event.actor_id = %actor_id,
            event.result = event::result::SUCCESS,
            batch.invoice_count = batch.invoice_count,
            batch.total_cents = batch.total_amount.cents(),
            "支払バッチを作成"
        );
        Ok(batch)
    }

    pub async fn list_payment_batches(&self) -> Result<Vec<PaymentBatch>, CoreError> {
        Ok(self.batch_repo.find_all().await?)
    }

    pub async fn change_payment_batch_status(
        &self,
        id: &PaymentBatchId,
        next: PaymentBatchStatus,
        actor_id: &UserId,
    ) -> Result<PaymentBatch, CoreError> {
        let batch = self.batch_repo.find_by_id(id).await.or_not_found("支払バッチ")?;
        let expected = batch.status;
        let updated = batch.change_status(next, self.clock.now())?;
        self.batch_repo.update_status(&updated, expected).await?;

        log_business_event!(
            event.category = event::category::ACCOUNTING,
            event.action = event::action::PAYMENT_BATCH_STATUS_CHANGED,
            event.entity_type = event::entity_type::PAYMENT_BATCH,
            event.entity_id = %updated.id,
            event.actor_id = %actor_id,
            event.result = event::result::SUCCESS,
            batch.from_status = %expected,
            batch.to_status = %next,
            "支払バッチのステータスを変更"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::test_utils::TestFixture;

    fn cost_input(user_id: &UserId, dollars: i64) -> RecordCostInput {
        RecordCostInput {
            user_id: user_id.clone(),
            training_request_id: None,
            amount: Money::from_dollars(dollars),
            cost_type: CostType::Training,
            description: "Tuition".to_string(),
            budget_code: Some("TR-100".to_string()),
            fiscal_year: FiscalYear::of_year(2026),
        }
    }

    fn invoice_input(number: &str, dollars: i64) -> CreateInvoiceInput {
        CreateInvoiceInput {
            invoice_number: number.to_string(),
            vendor: "Ohio Peace Officer Training Academy".to_string(),
            amount: Money::from_dollars(dollars),
            invoice_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 10, 31),
        }
    }

    async fn approved_invoice(
        sut: &AccountingUseCaseImpl,
        actor: &UserId,
        number: &str,
        dollars: i64,
    ) -> Invoice {
        let invoice = sut.create_invoice(actor, invoice_input(number, dollars)).await.unwrap();
        sut.change_invoice_status(&invoice.id, InvoiceStatus::Approved, actor)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_費用集計は却下分を除き未払いと支払済みを分ける() {
        let fx = TestFixture::new();
        let accountant = fx.accountant();
        let officer = fx.officer(None);
        let sut = fx.accounting_usecase();
        let pending = sut.record_cost(accountant.id(), cost_input(officer.id(), 300)).await.unwrap();
        let paid = sut.record_cost(accountant.id(), cost_input(officer.id(), 200)).await.unwrap();
        let rejected = sut.record_cost(accountant.id(), cost_input(officer.id(), 1000)).await.unwrap();
        sut.change_payment_status(&paid.id, PaymentStatus::Approved, accountant.id())
            .await
            .unwrap();
        sut.change_payment_status(&paid.id, PaymentStatus::Paid, accountant.id())
            .await
            .unwrap();
        sut.change_payment_status(&rejected.id, PaymentStatus::Rejected, accountant.id())
            .await
            .unwrap();

        let summary = sut.cost_summary(officer.id()).await.unwrap();

        assert_eq!(summary.total, Money::from_dollars(500));
        assert_eq!(summary.pending, pending.amount);
        assert_eq!(summary.paid, Money::from_dollars(200));
    }

    #[tokio::test]
    async fn test_上限を超える費用は400で集計は壊れない() {
        let fx = TestFixture::new();
        let accountant = fx.accountant();
        let officer = fx.officer(None);
        let sut = fx.accounting_usecase();
        let huge = RecordCostInput {
            amount: Money::from_cents(i64::MAX / 2 + 1),
            ..cost_input(officer.id(), 0)
        };

        let first = sut.record_cost(accountant.id(), huge.clone()).await;
        let second = sut.record_cost(accountant.id(), huge).await;

        assert!(matches!(first, Err(CoreError::BadRequest(_))));
        assert!(matches!(second, Err(CoreError::BadRequest(_))));
        let summary = sut.cost_summary(officer.id()).await.unwrap();
        assert_eq!(summary.total, Money::ZERO);
    }

    #[tokio::test]
    async fn test_承認で承認者が記録される() {
        let fx = TestFixture::new();
        let accountant = fx.accountant();
        let officer = fx.officer(None);
        let sut = fx.accounting_usecase();
        let cost = sut.record_cost(accountant.id(), cost_input(officer.id(), 300)).await.unwrap();

        let approved = sut
            .change_payment_status(&cost.id, PaymentStatus::Approved, accountant.id())
            .await
            .unwrap();

        assert_eq!(approved.approved_by.as_ref(), Some(accountant.id()));
        assert_eq!(approved.approved_at, Some(fx.now));
    }

    #[tokio::test]
    async fn test_pendingから直接paidにはできない() {
        let fx = TestFixture::new();
        let accountant = fx.accountant();
        let sut = fx.accounting_usecase();
        let cost = sut.record_cost(accountant.id(), cost_input(accountant.id(), 300)).await.unwrap();

        let result = sut
            .change_payment_status(&cost.id, PaymentStatus::Paid, accountant.id())
            .await;

        assert!(matches!(result, Err(CoreError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_予算状況は消化率としきい値を返す() {
        let fx = TestFixture::new();
        let accountant = fx.accountant();
        let sut = fx.accounting_usecase();
        let fy = FiscalYear::of_year(2026);
        sut.set_budget(fy.clone(), Money::from_dollars(10_000), accountant.id())
            .await
            .unwrap();
        sut.record_cost(accountant.id(), cost_input(accountant.id(), 9_500)).await.unwrap();

        let status = sut.budget_status(&fy).await.unwrap();

        assert_eq!(status.spent, Money::from_dollars(9_500));
        assert_eq!(status.remaining, Money::from_dollars(500));
        assert_eq!(status.percent_used, 95.0);
        assert_eq!(
            status.threshold,
            Some(trainflow_domain::accounting::BudgetThreshold::Warning)
        );
    }

    #[tokio::test]
    async fn test_予算未設定の年度は既定額() {
        let fx = TestFixture::new();

        let settings = fx
            .accounting_usecase()
            .get_budget(&FiscalYear::of_year(2027))
            .await
            .unwrap();

        assert_eq!(settings.total_budget, DEFAULT_TOTAL_BUDGET);
        assert_eq!(settings.updated_by, None);
    }

    #[rstest]
    #[case::受領(InvoiceStatus::Received, true)]
    #[case::却下(InvoiceStatus::Rejected, true)]
    #[case::未処理へ戻す(InvoiceStatus::Pending, false)]
    #[tokio::test]
    async fn test_請求書のステータスは前進のみ(#[case] next: InvoiceStatus, #[case] allowed: bool) {
        let fx = TestFixture::new();
        let accountant = fx.accountant();
        let sut = fx.accounting_usecase();
        let invoice = sut
            .create_invoice(accountant.id(), invoice_input("INV-1001", 450))
            .await
            .unwrap();

        let result = sut.change_invoice_status(&invoice.id, next, accountant.id()).await;

        assert_eq!(result.is_ok(), allowed);
    }

    #[tokio::test]
    async fn test_支払バッチは承認済み請求書の合計と件数を持つ() {
        let fx = TestFixture::new();
        let accountant = fx.accountant();
        let sut = fx.accounting_usecase();
        let first = approved_invoice(&sut, accountant.id(), "INV-2001", 400).await;
        let second = approved_invoice(&sut, accountant.id(), "INV-2002", 650).await;

        let batch = sut
            .create_payment_batch(
                accountant.id(),
                CreatePaymentBatchInput {
                    batch_number: "PB-2026-10".to_string(),
                    batch_date: fx.today(),
                    invoice_ids: vec![first.id.clone(), second.id.clone()],
                },
            )
            .await
            .unwrap();

        assert_eq!(batch.total_amount, Money::from_dollars(1_050));
        assert_eq!(batch.invoice_count, 2);
        assert_eq!(batch.status, PaymentBatchStatus::Draft);
        assert!(
            fx.invoices
                .invoices()
                .iter()
                .all(|invoice| invoice.batch_id.as_ref() == Some(&batch.id))
        );
    }

    #[tokio::test]
    async fn test_未承認の請求書はバッチに入れられない() {
        let fx = TestFixture::new();
        let accountant = fx.accountant();
        let sut = fx.accounting_usecase();
        let invoice = sut
            .create_invoice(accountant.id(), invoice_input("INV-3001", 120))
            .await
            .unwrap();

        let result = sut
            .create_payment_batch(
                accountant.id(),
                CreatePaymentBatchInput {
                    batch_number: "PB-2026-11".to_string(),
                    batch_date: fx.today(),
                    invoice_ids: vec![invoice.id],
                },
            )
            .await;

        assert!(matches!(result, Err(CoreError::BadRequest(_))));
        assert!(fx.payment_batches.batches().is_empty());
    }

    #[tokio::test]
    async fn test_存在しない請求書を指定すると404() {
        let fx = TestFixture::new();
        let accountant = fx.accountant();

        let result = fx
            .accounting_usecase()
            .create_payment_batch(
                accountant.id(),
                CreatePaymentBatchInput {
                    batch_number: "PB-2026-12".to_string(),
                    batch_date: fx.today(),
                    invoice_ids: vec![InvoiceId::new()],
                },
            )
            .await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_支払バッチのステータスは前進する() {
        let fx = TestFixture::new();
        let accountant = fx.accountant();
        let sut = fx.accounting_usecase();
        let invoice = approved_invoice(&sut, accountant.id(), "INV-4001", 75).await;
        let batch = sut
            .create_payment_batch(
                accountant.id(),
                CreatePaymentBatchInput {
                    batch_number: "PB-2027-01".to_string(),
                    batch_date: fx.today(),
                    invoice_ids: vec![invoice.id],
                },
            )
            .await
            .unwrap();

        let submitted = sut
            .change_payment_batch_status(&batch.id, PaymentBatchStatus::Submitted, accountant.id())
            .await
            .unwrap();
        let back = sut
            .change_payment_batch_status(&batch.id, PaymentBatchStatus::Draft, accountant.id())
            .await;

        assert_eq!(submitted.status, PaymentBatchStatus::Submitted);
        assert!(matches!(back, Err(CoreError::BadRequest(_))));
    }
}
