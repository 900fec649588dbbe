//! # InvoiceRepository / PaymentBatchRepository
//!
//! 請求書と支払バッチ。バッチの作成は請求書への紐付けと同じトランザクションで行い、
//! 対象の請求書が途中で別バッチに取られていた場合は全体を取り消す。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use trainflow_domain::{
   accounting::{
      Invoice,
      InvoiceId,
      InvoiceStatus,
      PaymentBatch,
      PaymentBatchId,
      PaymentBatchStatus,
   },
   user::UserId,
   value_objects::Money,
};
use uuid::Uuid;

use crate::{db::map_unique_violation, error::InfraError};

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
   /// 請求書番号が重複する場合は `Conflict` を返す
   async fn insert(&self, invoice: &Invoice) -> Result<(), InfraError>;

   async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, InfraError>;

   async fn find_by_ids(&self, ids: &[InvoiceId]) -> Result<Vec<Invoice>, InfraError>;

   /// 請求日の新しい順に全件取得する
   async fn find_all(&self) -> Result<Vec<Invoice>, InfraError>;

   /// DB 上のステータスが `expected_status` の場合のみ更新する
   async fn update_status(
      &self,
      invoice: &Invoice,
      expected_status: InvoiceStatus,
   ) -> Result<(), InfraError>;
}

#[async_trait]
pub trait PaymentBatchRepository: Send + Sync {
   /// バッチを作成し、請求書を紐付ける
   ///
   /// いずれかの請求書が承認済みかつ未バッチでなくなっていた場合は
   /// 何も保存せず `InfraError::Conflict` を返す。
   async fn insert_with_invoices(
      &self,
      batch: &PaymentBatch,
      invoice_ids: &[InvoiceId],
   ) -> Result<(), InfraError>;

   async fn find_by_id(&self, id: &PaymentBatchId) -> Result<Option<PaymentBatch>, InfraError>;

   /// バッチ日の新しい順に全件取得する
   async fn find_all(&self) -> Result<Vec<PaymentBatch>, InfraError>;

   /// DB 上のステータスが `expected_status` の場合のみ更新する
   async fn update_status(
      &self,
      batch: &PaymentBatch,
      expected_status: PaymentBatchStatus,
   ) -> Result<(), InfraError>;
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
   id: Uuid,
   invoice_number: String,
   vendor: String,
   amount_cents: i64,
   invoice_date: NaiveDate,
   due_date: Option<NaiveDate>,
   status: String,
   batch_id: Option<Uuid>,
   created_by: Uuid,
   created_at: DateTime<Utc>,
   updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
   type Error = InfraError;

   fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
      Ok(Self {
         id: InvoiceId::from_uuid(row.id),
         invoice_number: row.invoice_number,
         vendor: row.vendor,
         amount: Money::from_cents(row.amount_cents),
         invoice_date: row.invoice_date,
         due_date: row.due_date,
         status: row
            .status
            .parse::<InvoiceStatus>()
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
         batch_id: row.batch_id.map(PaymentBatchId::from_uuid),
         created_by: UserId::from_uuid(row.created_by),
         created_at: row.created_at,
         updated_at: row.updated_at,
      })
   }
}

#[derive(sqlx::FromRow)]
struct PaymentBatchRow {
   id: Uuid,
   batch_number: String,
   batch_date: NaiveDate,
   total_amount_cents: i64,
   invoice_count: i32,
   status: String,
   created_by: Uuid,
   created_at: DateTime<Utc>,
   updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentBatchRow> for PaymentBatch {
   type Error = InfraError;

   fn try_from(row: PaymentBatchRow) -> Result<Self, Self::Error> {
      Ok(Self {
         id: PaymentBatchId::from_uuid(row.id),
         batch_number: row.batch_number,
         batch_date: row.batch_date,
         total_amount: Money::from_cents(row.total_amount_cents),
         invoice_count: row.invoice_count,
         status: row
            .status
            .parse::<PaymentBatchStatus>()
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
         created_by: UserId::from_uuid(row.created_by),
         created_at: row.created_at,
         updated_at: row.updated_at,
      })
   }
}

const INVOICE_COLUMNS: &str = r#"
   SELECT
      id, invoice_number, vendor, amount_cents, invoice_date, due_date,
      status, batch_id, created_by, created_at, updated_at
   FROM invoices
"#;

const BATCH_COLUMNS: &str = r#"
   SELECT
      id, batch_number, batch_date, total_amount_cents, invoice_count,
      status, created_by, created_at, updated_at
   FROM payment_batches
"#;

#[derive(Debug, Clone)]
pub struct PostgresInvoiceRepository {
   pool: PgPool,
}

impl PostgresInvoiceRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl InvoiceRepository for PostgresInvoiceRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(id = %invoice.id))]
   async fn insert(&self, invoice: &Invoice) -> Result<(), InfraError> {
      let status: &str = invoice.status.into();

      sqlx::query(
         r#"
         INSERT INTO invoices (
            id, invoice_number, vendor, amount_cents, invoice_date, due_date,
            status, batch_id, created_by, created_at, updated_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         "#,
      )
      .bind(invoice.id.as_uuid())
      .bind(&invoice.invoice_number)
      .bind(&invoice.vendor)
      .bind(invoice.amount.cents())
      .bind(invoice.invoice_date)
      .bind(invoice.due_date)
      .bind(status)
      .bind(invoice.batch_id.as_ref().map(|id| *id.as_uuid()))
      .bind(invoice.created_by.as_uuid())
      .bind(invoice.created_at)
      .bind(invoice.updated_at)
      .execute(&self.pool)
      .await
      .map_err(|e| map_unique_violation(e, "Invoice", invoice.invoice_number.as_str()))?;

      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%id))]
   async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, InfraError> {
      let row = sqlx::query_as::<_, InvoiceRow>(&format!("{INVOICE_COLUMNS} WHERE id = $1"))
         .bind(id.as_uuid())
         .fetch_optional(&self.pool)
         .await?;

      row.map(Invoice::try_from).transpose()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(count = ids.len()))]
   async fn find_by_ids(&self, ids: &[InvoiceId]) -> Result<Vec<Invoice>, InfraError> {
      if ids.is_empty() {
         return Ok(Vec::new());
      }

      let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
      let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
         "{INVOICE_COLUMNS} WHERE id = ANY($1) ORDER BY invoice_date"
      ))
      .bind(&uuids)
      .fetch_all(&self.pool)
      .await?;

      rows.into_iter().map(Invoice::try_from).collect()
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn find_all(&self) -> Result<Vec<Invoice>, InfraError> {
      let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
         "{INVOICE_COLUMNS} ORDER BY invoice_date DESC, invoice_number"
      ))
      .fetch_all(&self.pool)
      .await?;

      rows.into_iter().map(Invoice::try_from).collect()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(id = %invoice.id, %expected_status))]
   async fn update_status(
      &self,
      invoice: &Invoice,
      expected_status: InvoiceStatus,
   ) -> Result<(), InfraError> {
      let status: &str = invoice.status.into();
      let expected: &str = expected_status.into();

      let result = sqlx::query(
         r#"
         UPDATE invoices SET status = $1, updated_at = $2
         WHERE id = $3 AND status = $4
         "#,
      )
      .bind(status)
      .bind(invoice.updated_at)
      .bind(invoice.id.as_uuid())
      .bind(expected)
      .execute(&self.pool)
      .await?;

      if result.rows_affected() == 0 {
         return Err(InfraError::conflict("Invoice", invoice.id.as_uuid().to_string()));
      }

      Ok(())
   }
}

#[derive(Debug, Clone)]
pub struct PostgresPaymentBatchRepository {
   pool: PgPool,
}

impl PostgresPaymentBatchRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl PaymentBatchRepository for PostgresPaymentBatchRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(id = %batch.id, invoices = invoice_ids.len()))]
   async fn insert_with_invoices(
      &self,
      batch: &PaymentBatch,
      invoice_ids: &[InvoiceId],
   ) -> Result<(), InfraError> {
      let status: &str = batch.status.into();
      let uuids: Vec<Uuid> = invoice_ids.iter().map(|id| *id.as_uuid()).collect();

      let mut tx = self.pool.begin().await?;

      sqlx::query(
         r#"
         INSERT INTO payment_batches (
            id, batch_number, batch_date, total_amount_cents, invoice_count,
            status, created_by, created_at, updated_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         "#,
      )
      .bind(batch.id.as_uuid())
      .bind(&batch.batch_number)
      .bind(batch.batch_date)
      .bind(batch.total_amount.cents())
      .bind(batch.invoice_count)
      .bind(status)
      .bind(batch.created_by.as_uuid())
      .bind(batch.created_at)
      .bind(batch.updated_at)
      .execute(&mut *tx)
      .await
      .map_err(|e| map_unique_violation(e, "PaymentBatch", batch.batch_number.as_str()))?;

      let result = sqlx::query(
         r#"
         UPDATE invoices SET batch_id = $1, updated_at = $2
         WHERE id = ANY($3) AND status = 'approved' AND batch_id IS NULL
         "#,
      )
      .bind(batch.id.as_uuid())
      .bind(batch.updated_at)
      .bind(&uuids)
      .execute(&mut *tx)
      .await?;

      // 1 件でも取り損ねたらロールバック（tx のドロップで取り消される）
      if result.rows_affected() != uuids.len() as u64 {
         return Err(InfraError::conflict("PaymentBatch", batch.id.as_uuid().to_string()));
      }

      tx.commit().await?;
      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%id))]
   async fn find_by_id(&self, id: &PaymentBatchId) -> Result<Option<PaymentBatch>, InfraError> {
      let row = sqlx::query_as::<_, PaymentBatchRow>(&format!("{BATCH_COLUMNS} WHERE id = $1"))
         .bind(id.as_uuid())
         .fetch_optional(&self.pool)
         .await?;

      row.map(PaymentBatch::try_from).transpose()
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn find_all(&self) -> Result<Vec<PaymentBatch>, InfraError> {
      let rows = sqlx::query_as::<_, PaymentBatchRow>(&format!(
         "{BATCH_COLUMNS} ORDER BY batch_date DESC, batch_number"
      ))
      .fetch_all(&self.pool)
      .await?;

      rows.into_iter().map(PaymentBatch::try_from).collect()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(id = %batch.id, %expected_status))]
   async fn update_status(
      &self,
      batch: &PaymentBatch,
      expected_status: PaymentBatchStatus,
   ) -> Result<(), InfraError> {
      let status: &str = batch.status.into();
      let expected: &str = expected_status.into();

      let result = sqlx::query(
         r#"
         UPDATE payment_batches SET status = $1, updated_at = $2
         WHERE id = $3 AND status = $4
         "#,
      )
      .bind(status)
      .bind(batch.updated_at)
      .bind(batch.id.as_uuid())
      .bind(expected)
      .execute(&self.pool)
      .await?;

      if result.rows_affected() == 0 {
         return Err(InfraError::conflict("PaymentBatch", batch.id.as_uuid().to_string()));
      }

      Ok(())
   }
}
