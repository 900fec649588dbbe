//! # TrainFlow 共有ユーティリティ
//!
//! 研修申請ワークフローの各クレートから使われる、ビジネスロジックを含まない
//! 共通部品を置く。
//!
//! - [`ApiResponse`]: `{ "data": T }` エンベロープ
//! - [`ErrorResponse`]: RFC 9457 Problem Details
//! - [`health`]: liveness / readiness のレスポンス型
//! - [`observability`]: トレーシング初期化（`observability` feature）
//! - [`event_log`]: ビジネスイベントログのマクロと定数
//! - [`canonical_log`]: リクエスト単位のサマリログ Layer（`observability` feature）

pub mod api_response;
#[cfg(feature = "observability")]
pub mod canonical_log;
pub mod error_response;
pub mod event_log;
pub mod health;
pub mod observability;

pub use api_response::ApiResponse;
pub use error_response::ErrorResponse;
pub use health::{CheckStatus, HealthResponse, ReadinessResponse, ReadinessStatus};
