//! # ドメイン層エラー
//!
//! | 種別 | HTTP | 用途 |
//! |------|------|------|
//! | `Validation` | 400 | 必須項目の欠落、空の却下理由、不正な状態遷移 |
//! | `NotFound` | 404 | 申請・研修・ユーザーが存在しない |
//! | `Conflict` | 409 | 別の承認者が先に状態を進めていた |
//! | `Forbidden` | 403 | 現在の段階の承認者ではない |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// `entity_type` には "TrainingRequest" などの型名を入れる
    #[error("{entity_type} が見つかりません: {id}")]
    NotFound {
        entity_type: &'static str,
        id:          String,
    },

    #[error("競合が発生しました: {0}")]
    Conflict(String),

    /// 認可の失敗（認証の失敗は API 層で 401 にする）
    #[error("権限がありません: {0}")]
    Forbidden(String),
}
