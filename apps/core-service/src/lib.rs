//! # TrainFlow Core Service ライブラリ
//!
//! 研修申請ワークフローのユースケース、HTTP ハンドラ、ルーター構築を公開する。
//! 結合テストからルーター全体を組み立てられるよう、`main.rs` とは分けている。

pub mod app_builder;
pub mod background;
pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod usecase;

// テストユーティリティ（内部実装、ドキュメントからは隠す）
#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod test_utils;
