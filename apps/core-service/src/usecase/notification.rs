//! # 通知ユースケース
//!
//! アプリ内通知とメール通知の両方をまとめる。
//!
//! ## モジュール構成
//!
//! - [`publisher`] - アプリ内通知の保存
//! - [`mirror`] - ユーザーごとの通知のメモリ上のミラーと変更イベントのコンシューマ
//! - [`inbox`] - 一覧・未読数・既読化
//! - [`template_renderer`] - tera テンプレートエンジンによるメール生成
//! - [`service`] - テンプレートレンダリング + 送信 + ログ記録の統合サービス

pub mod inbox;
pub mod mirror;
pub mod publisher;
pub mod service;
pub mod template_renderer;

pub use inbox::NotificationInboxUseCaseImpl;
pub use mirror::{NotificationMirror, run_consumer};
pub use publisher::NotificationPublisher;
pub use service::NotificationService;
pub use template_renderer::TemplateRenderer;
