//! # ユースケース層
//!
//! 研修申請ワークフローのビジネスロジックを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: リポジトリを `Arc<dyn Trait>` で外部から注入
//! - **薄いハンドラ**: ハンドラは薄く保ち、認可を含むロジックはユースケースに集約
//! - **通知は付随処理**: アプリ内通知とメールの失敗は本処理を失敗させない
//!
//! ## モジュール構成
//!
//! - `request` / `custom_request`: 標準申請と階級チェーン申請の承認フロー
//! - `notification`: アプリ内通知、通知ミラー、メール送信
//! - `generator`: 定期通知の生成と既読通知の掃除
//! - `accounting`: 費用・予算・請求書・支払バッチ

pub(crate) mod helpers;

pub mod accounting;
pub mod auth;
pub mod certificate;
pub mod custom_request;
pub mod document;
pub mod email;
pub mod generator;
pub mod notification;
pub mod request;
pub mod training;
pub mod user;

pub use accounting::AccountingUseCaseImpl;
pub use auth::{AuthUseCaseImpl, LoginOutcome};
pub use certificate::CertificateUseCaseImpl;
pub use custom_request::CustomRequestUseCaseImpl;
pub use document::DocumentUseCaseImpl;
pub use email::EmailUseCaseImpl;
pub use generator::{GeneratorReport, MaintenanceReport, NotificationGenerator};
pub use request::RequestUseCaseImpl;
pub use training::TrainingUseCaseImpl;
pub use user::UserUseCaseImpl;
