//! # インフラ層エラー定義
//!
//! PostgreSQL・Redis・通知チャネルとのやり取りで起きる失敗を 1 つの型にまとめる。
//!
//! 申請・証明書・請求書などの状態遷移は `WHERE id = $1 AND status = $2` の
//! 条件付き UPDATE で書き込む。0 件更新（他の操作が先に状態を変えた）と一意制約違反
//! （バッジ番号・証明書番号・請求書番号の重複）は [`InfraErrorKind::Conflict`] になり、
//! API では 409 として返る。保存済みデータと矛盾する要求は
//! [`InfraErrorKind::InvalidInput`]（400）、それ以外は 500 として扱う。
//!
//! どの生成経路でも生成時点の [`SpanTrace`] を捕捉するので、ログから
//! どのリポジトリ操作で失敗したかを追える。

use std::fmt;

use derive_more::Display;
use thiserror::Error;
use tracing_error::SpanTrace;

/// インフラ層で発生するエラー
///
/// 種別は [`kind()`](InfraError::kind) で参照する。競合だけを拾う場合は
/// [`as_conflict()`](InfraError::as_conflict) が使える。
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
   kind:       InfraErrorKind,
   span_trace: SpanTrace,
}

#[derive(Debug, Error)]
pub enum InfraErrorKind {
   #[error("データベースエラー: {0}")]
   Database(#[source] sqlx::Error),

   /// セッションストアへの接続・コマンドの失敗
   #[error("Redis エラー: {0}")]
   Redis(#[source] redis::RedisError),

   /// 通知チャネルのペイロードや JSON 列を読めなかった
   #[error("シリアライズエラー: {0}")]
   Serialization(#[source] serde_json::Error),

   /// 条件付き更新で対象の状態が変わっていた、または一意キーが重複した
   #[error("競合が発生しました: {entity}(id={id})")]
   Conflict {
      /// 例: `"TrainingRequest"`
      entity: String,
      /// 行 ID または重複したキー
      id:     String,
   },

   /// 保存済みデータと矛盾する要求（検証情報のない文書の検証など）
   #[error("入力エラー: {0}")]
   InvalidInput(String),

   /// DB の値がドメイン型に変換できないなど
   #[error("予期しないエラー: {0}")]
   Unexpected(String),
}

impl InfraError {
   pub fn kind(&self) -> &InfraErrorKind {
      &self.kind
   }

   pub fn span_trace(&self) -> &SpanTrace {
      &self.span_trace
   }

   /// 競合なら `(entity, id)` を返す
   pub fn as_conflict(&self) -> Option<(&str, &str)> {
      match &self.kind {
         InfraErrorKind::Conflict { entity, id } => Some((entity, id)),
         _ => None,
      }
   }

   fn capture(kind: InfraErrorKind) -> Self {
      Self {
         kind,
         span_trace: SpanTrace::capture(),
      }
   }

   /// 条件付き更新の 0 件更新や一意制約違反
   pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
      Self::capture(InfraErrorKind::Conflict {
         entity: entity.into(),
         id:     id.into(),
      })
   }

   pub fn invalid_input(msg: impl Into<String>) -> Self {
      Self::capture(InfraErrorKind::InvalidInput(msg.into()))
   }

   pub fn unexpected(msg: impl Into<String>) -> Self {
      Self::capture(InfraErrorKind::Unexpected(msg.into()))
   }
}

impl fmt::Debug for InfraError {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("InfraError")
         .field("kind", &self.kind)
         .field("span_trace", &self.span_trace)
         .finish()
   }
}

impl std::error::Error for InfraError {
   fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
      self.kind.source()
   }
}

impl From<sqlx::Error> for InfraError {
   fn from(source: sqlx::Error) -> Self {
      Self::capture(InfraErrorKind::Database(source))
   }
}

impl From<redis::RedisError> for InfraError {
   fn from(source: redis::RedisError) -> Self {
      Self::capture(InfraErrorKind::Redis(source))
   }
}

impl From<serde_json::Error> for InfraError {
   fn from(source: serde_json::Error) -> Self {
      Self::capture(InfraErrorKind::Serialization(source))
   }
}
