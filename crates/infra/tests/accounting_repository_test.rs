//! 会計リポジトリ（費用・予算・請求書・支払バッチ）統合テスト
//!
//! 実行方法:
//! ```bash
//! cargo test -p trainflow-infra --test accounting_repository_test -- --ignored
//! ```

mod common;

use chrono::NaiveDate;
use common::{seed_accounting_id, seed_officer_id, test_now};
use pretty_assertions::assert_eq;
use sqlx::PgPool;
use trainflow_domain::{
   accounting::{
      CostId,
      CostType,
      Invoice,
      InvoiceId,
      InvoiceStatus,
      NewCost,
      NewInvoice,
      NewPaymentBatch,
      OfficerTrainingCost,
      PaymentBatch,
      PaymentBatchId,
      PaymentStatus,
   },
   value_objects::{FiscalYear, Money},
};
use trainflow_infra::repository::{
   BudgetRepository,
   CostRepository,
   InvoiceRepository,
   PaymentBatchRepository,
   PostgresBudgetRepository,
   PostgresCostRepository,
   PostgresInvoiceRepository,
   PostgresPaymentBatchRepository,
};

fn cost(dollars: i64, fiscal_year: &str) -> OfficerTrainingCost {
   OfficerTrainingCost::record(NewCost {
      id: CostId::new(),
      user_id: seed_officer_id(),
      training_request_id: None,
      amount: Money::from_dollars(dollars),
      cost_type: CostType::Training,
      description: "Course fee".to_string(),
      budget_code: None,
      fiscal_year: FiscalYear::new(fiscal_year).unwrap(),
      now: test_now(),
   })
   .unwrap()
}

fn approved_invoice(number: &str, dollars: i64) -> Invoice {
   Invoice::new(NewInvoice {
      id: InvoiceId::new(),
      invoice_number: number.to_string(),
      vendor: "Regional Academy".to_string(),
      amount: Money::from_dollars(dollars),
      invoice_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
      due_date: None,
      created_by: seed_accounting_id(),
      now: test_now(),
   })
   .and_then(|i| i.change_status(InvoiceStatus::Approved, test_now()))
   .unwrap()
}

fn batch_for(invoices: &[Invoice], number: &str) -> PaymentBatch {
   PaymentBatch::assemble(
      NewPaymentBatch {
         id: PaymentBatchId::new(),
         batch_number: number.to_string(),
         batch_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
         created_by: seed_accounting_id(),
         now: test_now(),
      },
      invoices,
   )
   .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_年度の費用合計は却下分を除く(pool: PgPool) {
   let repo = PostgresCostRepository::new(pool);
   let kept = cost(1_000, "2026");
   let rejected = cost(500, "2026");
   let other_year = cost(700, "2025");
   for c in [&kept, &rejected, &other_year] {
      repo.insert(c).await.unwrap();
   }
   let rejected_now = rejected
      .clone()
      .change_payment_status(PaymentStatus::Rejected, seed_accounting_id(), test_now())
      .unwrap();
   repo
      .update_payment_status(&rejected_now, PaymentStatus::Pending)
      .await
      .unwrap();

   let total = repo
      .total_for_fiscal_year(&FiscalYear::new("2026").unwrap())
      .await
      .unwrap();

   assert_eq!(total, Money::from_dollars(1_000));
   assert_eq!(
      repo.latest_fiscal_year().await.unwrap(),
      Some(FiscalYear::new("2026").unwrap())
   );
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_支払状況が変わっていると競合になる(pool: PgPool) {
   let repo = PostgresCostRepository::new(pool);
   let c = cost(100, "2026");
   repo.insert(&c).await.unwrap();

   let approved = c
      .change_payment_status(PaymentStatus::Approved, seed_accounting_id(), test_now())
      .unwrap();
   repo
      .update_payment_status(&approved, PaymentStatus::Pending)
      .await
      .unwrap();
   let result = repo
      .update_payment_status(&approved, PaymentStatus::Pending)
      .await;

   assert!(result.unwrap_err().as_conflict().is_some());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_シードの予算を取得し上書きできる(pool: PgPool) {
   let repo = PostgresBudgetRepository::new(pool);
   let fy = FiscalYear::new("2026").unwrap();

   let seeded = repo.find(&fy).await.unwrap().unwrap();
   assert_eq!(seeded.total_budget, Money::from_dollars(150_000));

   let updated = trainflow_domain::accounting::BudgetSettings::new(
      fy.clone(),
      Money::from_dollars(200_000),
      seed_accounting_id(),
      test_now(),
   )
   .unwrap();
   repo.upsert(&updated).await.unwrap();

   assert_eq!(repo.find(&fy).await.unwrap(), Some(updated));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_バッチ作成で請求書が紐付けられる(pool: PgPool) {
   let invoices = PostgresInvoiceRepository::new(pool.clone());
   let batches = PostgresPaymentBatchRepository::new(pool);
   let a = approved_invoice("INV-001", 300);
   let b = approved_invoice("INV-002", 200);
   invoices.insert(&a).await.unwrap();
   invoices.insert(&b).await.unwrap();

   let batch = batch_for(&[a.clone(), b.clone()], "PB-2026-001");
   batches
      .insert_with_invoices(&batch, &[a.id.clone(), b.id.clone()])
      .await
      .unwrap();

   let stored = batches.find_by_id(&batch.id).await.unwrap().unwrap();
   assert_eq!(stored.total_amount, Money::from_dollars(500));
   assert_eq!(stored.invoice_count, 2);
   let linked = invoices.find_by_ids(&[a.id, b.id]).await.unwrap();
   assert!(linked.iter().all(|i| i.batch_id.as_ref() == Some(&batch.id)));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_請求書が別バッチに取られていると何も保存されない(pool: PgPool) {
   let invoices = PostgresInvoiceRepository::new(pool.clone());
   let batches = PostgresPaymentBatchRepository::new(pool);
   let a = approved_invoice("INV-101", 300);
   let b = approved_invoice("INV-102", 200);
   invoices.insert(&a).await.unwrap();
   invoices.insert(&b).await.unwrap();

   let first = batch_for(std::slice::from_ref(&a), "PB-2026-010");
   batches
      .insert_with_invoices(&first, std::slice::from_ref(&a.id))
      .await
      .unwrap();

   let second = batch_for(&[a.clone(), b.clone()], "PB-2026-011");
   let result = batches
      .insert_with_invoices(&second, &[a.id.clone(), b.id.clone()])
      .await;

   assert!(result.unwrap_err().as_conflict().is_some());
   assert!(batches.find_by_id(&second.id).await.unwrap().is_none());
   let b_now = invoices.find_by_id(&b.id).await.unwrap().unwrap();
   assert_eq!(b_now.batch_id, None);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_請求書番号の重複は競合になる(pool: PgPool) {
   let invoices = PostgresInvoiceRepository::new(pool);
   invoices.insert(&approved_invoice("INV-900", 10)).await.unwrap();

   let result = invoices.insert(&approved_invoice("INV-900", 20)).await;

   assert!(result.unwrap_err().as_conflict().is_some());
}
