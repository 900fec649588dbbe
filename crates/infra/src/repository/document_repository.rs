//! # DocumentRepository
//!
//! 提出書類のメタデータを永続化する。ファイル本体は外部 URL で参照し、保存しない。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use trainflow_domain::{
   document::{Document, DocumentId, DocumentRecord, DocumentType, FileMetadata},
   user::UserId,
};
use uuid::Uuid;

use crate::error::InfraError;

#[async_trait]
pub trait DocumentRepository: Send + Sync {
   async fn insert(&self, document: &Document) -> Result<(), InfraError>;

   async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, InfraError>;

   /// ユーザーの書類を新しい順に取得する
   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Document>, InfraError>;

   /// 未検証の書類を古い順に取得する（管理者の確認待ち一覧）
   async fn find_unverified(&self) -> Result<Vec<Document>, InfraError>;

   /// 検証情報を記録する
   ///
   /// 既に検証済みの場合は `InfraError::Conflict` を返す。
   async fn mark_verified(&self, document: &Document) -> Result<(), InfraError>;
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
   id: Uuid,
   user_id: Uuid,
   document_type: String,
   title: String,
   file_name: String,
   file_url: String,
   file_size: i64,
   mime_type: String,
   issue_date: Option<NaiveDate>,
   expiration_date: Option<NaiveDate>,
   issuing_authority: Option<String>,
   verified_by: Option<Uuid>,
   verified_at: Option<DateTime<Utc>>,
   created_at: DateTime<Utc>,
   updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
   type Error = InfraError;

   fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
      Ok(Document::from_db(DocumentRecord {
         id: DocumentId::from_uuid(row.id),
         user_id: UserId::from_uuid(row.user_id),
         document_type: row
            .document_type
            .parse::<DocumentType>()
            .map_err(|e| InfraError::unexpected(format!("不正なドキュメント種別: {e}")))?,
         title: row.title,
         file: FileMetadata {
            file_name: row.file_name,
            file_url:  row.file_url,
            file_size: row.file_size,
            mime_type: row.mime_type,
         },
         issue_date: row.issue_date,
         expiration_date: row.expiration_date,
         issuing_authority: row.issuing_authority,
         verified_by: row.verified_by.map(UserId::from_uuid),
         verified_at: row.verified_at,
         created_at: row.created_at,
         updated_at: row.updated_at,
      }))
   }
}

const SELECT_COLUMNS: &str = r#"
   SELECT
      id, user_id, document_type, title, file_name, file_url, file_size, mime_type,
      issue_date, expiration_date, issuing_authority, verified_by, verified_at,
      created_at, updated_at
   FROM documents
"#;

#[derive(Debug, Clone)]
pub struct PostgresDocumentRepository {
   pool: PgPool,
}

impl PostgresDocumentRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl DocumentRepository for PostgresDocumentRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(id = %document.id()))]
   async fn insert(&self, document: &Document) -> Result<(), InfraError> {
      let document_type: &str = document.document_type().into();
      let file = document.file();

      sqlx::query(
         r#"
         INSERT INTO documents (
            id, user_id, document_type, title, file_name, file_url, file_size, mime_type,
            issue_date, expiration_date, issuing_authority, verified_by, verified_at,
            created_at, updated_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
         "#,
      )
      .bind(document.id().as_uuid())
      .bind(document.user_id().as_uuid())
      .bind(document_type)
      .bind(document.title())
      .bind(&file.file_name)
      .bind(&file.file_url)
      .bind(file.file_size)
      .bind(&file.mime_type)
      .bind(document.issue_date())
      .bind(document.expiration_date())
      .bind(document.issuing_authority())
      .bind(document.verification().map(|v| *v.verified_by.as_uuid()))
      .bind(document.verification().map(|v| v.verified_at))
      .bind(document.created_at())
      .bind(document.updated_at())
      .execute(&self.pool)
      .await?;

      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%id))]
   async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, InfraError> {
      let row = sqlx::query_as::<_, DocumentRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
         .bind(id.as_uuid())
         .fetch_optional(&self.pool)
         .await?;

      row.map(Document::try_from).transpose()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%user_id))]
   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Document>, InfraError> {
      let rows = sqlx::query_as::<_, DocumentRow>(&format!(
         "{SELECT_COLUMNS} WHERE user_id = $1 ORDER BY created_at DESC"
      ))
      .bind(user_id.as_uuid())
      .fetch_all(&self.pool)
      .await?;

      rows.into_iter().map(Document::try_from).collect()
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn find_unverified(&self) -> Result<Vec<Document>, InfraError> {
      let rows = sqlx::query_as::<_, DocumentRow>(&format!(
         "{SELECT_COLUMNS} WHERE verified_at IS NULL ORDER BY created_at"
      ))
      .fetch_all(&self.pool)
      .await?;

      rows.into_iter().map(Document::try_from).collect()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(id = %document.id()))]
   async fn mark_verified(&self, document: &Document) -> Result<(), InfraError> {
      let Some(verification) = document.verification() else {
         return Err(InfraError::invalid_input("検証情報のないドキュメントです"));
      };

      let result = sqlx::query(
         r#"
         UPDATE documents SET verified_by = $1, verified_at = $2, updated_at = $3
         WHERE id = $4 AND verified_at IS NULL
         "#,
      )
      .bind(verification.verified_by.as_uuid())
      .bind(verification.verified_at)
      .bind(document.updated_at())
      .bind(document.id().as_uuid())
      .execute(&self.pool)
      .await?;

      if result.rows_affected() == 0 {
         return Err(InfraError::conflict(
            "Document",
            document.id().as_uuid().to_string(),
         ));
      }

      Ok(())
   }
}
