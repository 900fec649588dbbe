//! # パスワード
//!
//! バッジ番号ログインで使うパスワードの値オブジェクト。
//! ハッシュ化と検証はインフラ層（argon2）が担う。

/// 平文パスワード
///
/// `Debug` では値をマスクする。
#[derive(Clone)]
pub struct PlainPassword(String);

impl std::fmt::Debug for PlainPassword {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_tuple("PlainPassword").field(&"[REDACTED]").finish()
   }
}

/// 管理者がユーザーを作成するときの最小文字数
pub const MIN_PASSWORD_LENGTH: usize = 8;

impl PlainPassword {
   pub fn new(value: impl Into<String>) -> Self {
      Self(value.into())
   }

   /// 新規設定用のパスワードを作成する（ログイン入力には使わない）
   pub fn for_new_account(value: impl Into<String>) -> Result<Self, crate::DomainError> {
      let value = value.into();
      if value.chars().count() < MIN_PASSWORD_LENGTH {
         return Err(crate::DomainError::Validation(format!(
            "パスワードは {MIN_PASSWORD_LENGTH} 文字以上である必要があります"
         )));
      }
      Ok(Self(value))
   }

   pub fn as_str(&self) -> &str {
      &self.0
   }
}

/// Argon2id の PHC 文字列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
   pub fn new(hash: impl Into<String>) -> Self {
      Self(hash.into())
   }

   pub fn as_str(&self) -> &str {
      &self.0
   }

   pub fn into_string(self) -> String {
      self.0
   }
}

/// パスワード検証結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordVerifyResult {
   Match,
   Mismatch,
}

impl PasswordVerifyResult {
   pub fn is_match(&self) -> bool {
      matches!(self, Self::Match)
   }
}

impl From<bool> for PasswordVerifyResult {
   fn from(matched: bool) -> Self {
      if matched { Self::Match } else { Self::Mismatch }
   }
}
