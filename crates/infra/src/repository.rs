//! # リポジトリ実装
//!
//! PostgreSQL を使ったリポジトリトレイトとその実装を提供する。
//!
//! ## 設計方針
//!
//! - **行構造体 + TryFrom**: `sqlx::FromRow` の行構造体で受け、`TryFrom` でドメイン型の
//!   `from_db()` に渡す。変換ロジックは各ファイルに一箇所だけ置く
//! - **条件付き更新**: 状態を進める UPDATE は読み取り時の状態を `WHERE` に含め、
//!   0 行更新を `InfraError::Conflict` として返す
//! - **テスタビリティ**: トレイト経由でモック可能（[`crate::mock`]）

pub mod budget_repository;
pub mod certificate_repository;
pub mod cost_repository;
pub mod custom_request_repository;
pub mod document_repository;
pub mod email_log_repository;
pub mod email_preferences_repository;
pub mod invoice_repository;
pub mod notification_repository;
pub mod training_repository;
pub mod training_request_repository;
pub mod user_repository;

pub use budget_repository::{BudgetRepository, PostgresBudgetRepository};
pub use certificate_repository::{CertificateRepository, PostgresCertificateRepository};
pub use cost_repository::{CostRepository, PostgresCostRepository};
pub use custom_request_repository::{
   CustomTrainingRequestRepository,
   PostgresCustomTrainingRequestRepository,
};
pub use document_repository::{DocumentRepository, PostgresDocumentRepository};
pub use email_log_repository::{EmailLogRepository, PostgresEmailLogRepository};
pub use email_preferences_repository::{
   EmailPreferencesRepository,
   PostgresEmailPreferencesRepository,
};
pub use invoice_repository::{
   InvoiceRepository,
   PaymentBatchRepository,
   PostgresInvoiceRepository,
   PostgresPaymentBatchRepository,
};
pub use notification_repository::{
   NotificationRepository,
   PostgresNotificationRepository,
   RecentNotificationFilter,
};
pub use training_repository::{PostgresTrainingRepository, TrainingRepository};
pub use training_request_repository::{
   PostgresTrainingRequestRepository,
   TrainingRequestRepository,
};
pub use user_repository::{PostgresUserRepository, UserRepository};
