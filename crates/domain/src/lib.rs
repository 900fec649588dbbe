//! # TrainFlow ドメイン層
//!
//! 研修申請ワークフローのエンティティ、値オブジェクト、状態遷移、承認ポリシーを
//! 定義する。I/O は持たず、永続化や送信はインフラ層がトレイト越しに行う。
//!
//! ```text
//! core-service → infra → domain
//! ```
//!
//! ## モジュール構成
//!
//! - [`user`] / [`rank`] - 職員、ロール、階級
//! - [`training`] - 研修カタログ
//! - [`request`] - 標準研修申請（supervisor → administrator の 2 段承認）
//! - [`custom_request`] - カスタム研修申請（階級チェーン承認）
//! - [`notification`] / [`preferences`] - アプリ内通知、メール、配信設定
//! - [`certificate`] / [`document`] - 修了証、提出書類
//! - [`accounting`] - 研修費用、予算、請求書、支払バッチ
//!
//! ```rust
//! use trainflow_domain::{DomainError, request::DenialReason};
//!
//! let err = DenialReason::new("   ").unwrap_err();
//! assert!(matches!(err, DomainError::Validation(_)));
//! ```

#[macro_use]
mod macros;

pub mod accounting;
pub mod certificate;
pub mod clock;
pub mod custom_request;
pub mod document;
pub mod error;
pub mod notification;
pub mod password;
pub mod preferences;
pub mod rank;
pub mod request;
pub mod training;
pub mod user;
pub mod value_objects;

pub use error::DomainError;
