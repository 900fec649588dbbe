//! # TrainFlow インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 設計方針
//!
//! このクレートはリポジトリトレイトとその具体的な実装を提供する。
//! 外部システムの詳細をカプセル化し、ドメイン層をインフラの変更から保護する。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL への接続プールとマイグレーション
//! - **リポジトリ実装**: 申請・通知・会計などの永続化
//! - **変更購読**: 通知テーブルの `LISTEN/NOTIFY`
//! - **セッション**: Redis によるセッション管理
//! - **メール送信**: SendGrid / SMTP / SES / Noop
//!
//! ## 依存関係
//!
//! ```text
//! core-service → infra → domain
//!       ↘                  ↑
//!         ────────────────┘
//! ```
//!
//! ## モジュール構成
//!
//! - [`db`] - PostgreSQL データベース接続管理
//! - [`error`] - インフラ層エラー定義
//! - [`notification`] - メール送信
//! - [`password`] - パスワードハッシュ
//! - [`realtime`] - 通知の変更購読
//! - [`repository`] - リポジトリ実装
//! - [`session`] - セッション管理
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use trainflow_infra::{db, repository::PostgresUserRepository};
//!
//! async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::create_pool("postgres://localhost/trainflow").await?;
//!     db::run_migrations(&pool).await?;
//!
//!     let users = PostgresUserRepository::new(pool.clone());
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod notification;
pub mod password;
pub mod realtime;
pub mod repository;
pub mod session;

pub use error::InfraError;
pub use notification::{
   NoopNotificationSender,
   NotificationSender,
   SendGridNotificationSender,
   SenderIdentity,
   SesNotificationSender,
   SmtpNotificationSender,
};
pub use password::{Argon2PasswordChecker, PasswordChecker};
pub use session::{RedisSessionManager, SessionData, SessionManager};
