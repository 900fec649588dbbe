//! ユースケース層の共通ヘルパー
//!
//! リポジトリ呼び出し結果の変換やメール差し込み値の整形など、
//! 複数のユースケースで繰り返されるパターンを共通化する。

use chrono::NaiveDate;
use trainflow_infra::InfraError;

use crate::error::CoreError;

/// リポジトリの `Result<Option<T>, InfraError>` を `Result<T, CoreError>` に変換する
///
/// ```ignore
/// let request = self.request_repo.find_by_id(&id).await.or_not_found("申請")?;
/// ```
pub(crate) trait FindResultExt<T> {
    /// `None` の場合は `CoreError::NotFound`、`InfraError` の場合は `CoreError::from` で変換する
    fn or_not_found(self, entity_name: &str) -> Result<T, CoreError>;
}

impl<T> FindResultExt<T> for Result<Option<T>, InfraError> {
    fn or_not_found(self, entity_name: &str) -> Result<T, CoreError> {
        self?.ok_or_else(|| CoreError::NotFound(format!("{}が見つかりません", entity_name)))
    }
}

/// メール本文に載せる日付（`MM/DD/YYYY`）
pub(crate) fn email_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}
