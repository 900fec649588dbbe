//! # パスワードハッシュ
//!
//! Argon2id によるパスワードのハッシュ化と検証を提供する。

use argon2::{
    Argon2,
    Params,
    PasswordHasher as _,
    PasswordVerifier as _,
    password_hash::{PasswordHash as Argon2PasswordHash, SaltString},
};
use trainflow_domain::password::{PasswordHash, PasswordVerifyResult, PlainPassword};
use uuid::Uuid;

use crate::InfraError;

/// パスワードのハッシュ化と検証を担当するトレイト
pub trait PasswordChecker: Send + Sync {
    /// パスワードを検証する
    ///
    /// # Errors
    ///
    /// - 不正なハッシュ形式の場合
    fn verify(
        &self,
        password: &PlainPassword,
        hash: &PasswordHash,
    ) -> Result<PasswordVerifyResult, InfraError>;

    /// 新規アカウント用にパスワードをハッシュ化する
    fn hash(&self, password: &PlainPassword) -> Result<PasswordHash, InfraError>;
}

/// Argon2id 実装
///
/// パラメータ: Memory 64 MB / Iterations 1 / Parallelism 1
pub struct Argon2PasswordChecker {
    argon2: Argon2<'static>,
}

impl Argon2PasswordChecker {
    pub fn new() -> Self {
        // 64 MB / t=1 / p=1 は常に有効な組み合わせ
        let params = Params::new(65536, 1, 1, None).unwrap_or_default();

        Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        }
    }
}

impl Default for Argon2PasswordChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordChecker for Argon2PasswordChecker {
    fn verify(
        &self,
        password: &PlainPassword,
        hash: &PasswordHash,
    ) -> Result<PasswordVerifyResult, InfraError> {
        let parsed = Argon2PasswordHash::new(hash.as_str())
            .map_err(|e| InfraError::unexpected(format!("不正なハッシュ形式: {e}")))?;

        let matched = self
            .argon2
            .verify_password(password.as_str().as_bytes(), &parsed)
            .is_ok();

        Ok(PasswordVerifyResult::from(matched))
    }

    fn hash(&self, password: &PlainPassword) -> Result<PasswordHash, InfraError> {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|e| InfraError::unexpected(format!("ソルト生成に失敗: {e}")))?;
        let hashed = self
            .argon2
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| InfraError::unexpected(format!("ハッシュ化に失敗: {e}")))?;

        Ok(PasswordHash::new(hashed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    // シードデータと同じハッシュ（password123）
    const SEED_HASH: &str = "$argon2id$v=19$m=65536,t=1,p=1$olntqw+EoVpwH4B1vUAI0A$5yCA1izLODgz8nQOInDGwbuQB/AS0sIQDwpmIilve5M";

    #[fixture]
    fn checker() -> Argon2PasswordChecker {
        Argon2PasswordChecker::new()
    }

    #[rstest]
    #[case("password123", true)]
    #[case("wrongpassword", false)]
    fn test_シードのハッシュを検証できる(
        checker: Argon2PasswordChecker,
        #[case] input: &str,
        #[case] expected: bool,
    ) {
        let result = checker
            .verify(&PlainPassword::new(input), &PasswordHash::new(SEED_HASH))
            .unwrap();

        assert_eq!(result.is_match(), expected);
    }

    #[rstest]
    fn test_不正なハッシュ形式はエラー(checker: Argon2PasswordChecker) {
        let result = checker.verify(
            &PlainPassword::new("password123"),
            &PasswordHash::new("not-a-valid-hash"),
        );

        assert!(result.is_err());
    }

    #[rstest]
    fn test_ハッシュ化したパスワードを検証できる(checker: Argon2PasswordChecker) {
        let password = PlainPassword::new("correct horse battery");

        let hash = checker.hash(&password).unwrap();

        assert!(hash.as_str().starts_with("$argon2id$v=19$m=65536,t=1,p=1$"));
        assert!(checker.verify(&password, &hash).unwrap().is_match());
        assert!(
            !checker
                .verify(&PlainPassword::new("wrong"), &hash)
                .unwrap()
                .is_match()
        );
    }
}
