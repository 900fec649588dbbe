//! # 認証ユースケース
//!
//! バッジ番号とパスワードでログインし、Redis セッションを発行する。
//! ログイン成功時はそのユーザーの通知ミラーを DB から読み直す。
//!
//! ## タイミング攻撃対策
//!
//! ユーザーが存在しない場合もダミーハッシュで検証を実行し、処理時間を均一化する。

use std::sync::Arc;

use trainflow_domain::{
    clock::Clock,
    password::{PasswordHash, PlainPassword},
    user::{BadgeNumber, User, UserId},
};
use trainflow_infra::{
    PasswordChecker,
    SessionData,
    SessionManager,
    repository::UserRepository,
};
use trainflow_shared::{
    event_log::{error, event},
    log_business_event,
};

use crate::{
    error::CoreError,
    usecase::{helpers::FindResultExt, notification::NotificationInboxUseCaseImpl},
};

/// ダミーハッシュ（有効な Argon2id 形式）
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=65536,t=1,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

const INVALID_CREDENTIALS: &str = "バッジ番号またはパスワードが正しくありません";

/// ログイン結果
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session_id: String,
    pub user: User,
}

pub struct AuthUseCaseImpl {
    user_repo: Arc<dyn UserRepository>,
    password_checker: Arc<dyn PasswordChecker>,
    session_manager: Arc<dyn SessionManager>,
    inbox: Arc<NotificationInboxUseCaseImpl>,
    clock: Arc<dyn Clock>,
}

impl AuthUseCaseImpl {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        password_checker: Arc<dyn PasswordChecker>,
        session_manager: Arc<dyn SessionManager>,
        inbox: Arc<NotificationInboxUseCaseImpl>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repo,
            password_checker,
            session_manager,
            inbox,
            clock,
        }
    }

    /// バッジ番号とパスワードで認証し、セッションを作成する
    ///
    /// 不正なバッジ番号・存在しないユーザー・パスワード不一致は区別せず 401 を返す。
    pub async fn login(&self, badge_number: &str, password: &str) -> Result<LoginOutcome, CoreError> {
        let password = PlainPassword::new(password);

        let credentials = match BadgeNumber::new(badge_number) {
            Ok(badge) => self
                .user_repo
                .find_credentials_by_badge(&badge)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        error.category = error::category::INFRASTRUCTURE,
                        error.kind = error::kind::USER_LOOKUP,
                        error = %e,
                        "ログイン時のユーザー取得に失敗"
                    );
                })?,
            Err(_) => None,
        };

        let Some((user, hash)) = credentials else {
            self.dummy_verification(&password);
            return Err(self.login_failed(badge_number, "unknown_badge"));
        };

        let verified = self
            .password_checker
            .verify(&password, &hash)
            .inspect_err(|e| {
                tracing::error!(
                    error.category = error::category::INFRASTRUCTURE,
                    error.kind = error::kind::PASSWORD_VERIFICATION,
                    error = %e,
                    user_id = %user.id(),
                    "パスワード検証でエラー"
                );
            })
            .is_ok_and(|r| r.is_match());
        if !verified {
            return Err(self.login_failed(badge_number, "password_mismatch"));
        }

        let session = SessionData::new(
            user.id().clone(),
            user.badge_number().as_str().to_string(),
            user.full_name(),
            user.role(),
            self.clock.now(),
        );
        let session_id = self.session_manager.create(&session).await.inspect_err(|e| {
            tracing::error!(
                error.category = error::category::INFRASTRUCTURE,
                error.kind = error::kind::SESSION,
                error = %e,
                "セッションの作成に失敗"
            );
        })?;

        if let Err(e) = self.inbox.reload(user.id()).await {
            tracing::error!(error = %e, user_id = %user.id(), "ログイン時の通知ミラー読み込みに失敗");
        }

        log_business_event!(
            event.category = event::category::AUTH,
            event.action = event::action::LOGIN_SUCCESS,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %user.id(),
            event.actor_id = %user.id(),
            event.result = event::result::SUCCESS,
            "ログイン成功"
        );

        Ok(LoginOutcome { session_id, user })
    }

    /// セッションを削除する（存在しなくても成功）
    pub async fn logout(&self, session_id: &str, user_id: &UserId) -> Result<(), CoreError> {
        self.session_manager.delete(session_id).await?;

        log_business_event!(
            event.category = event::category::AUTH,
            event.action = event::action::LOGOUT,
            event.entity_type = event::entity_type::SESSION,
            event.actor_id = %user_id,
            event.result = event::result::SUCCESS,
            "ログアウト"
        );
        Ok(())
    }

    /// ログイン中のユーザー
    pub async fn me(&self, user_id: &UserId) -> Result<User, CoreError> {
        self.user_repo.find_by_id(user_id).await.or_not_found("ユーザー")
    }

    fn login_failed(&self, badge_number: &str, reason: &'static str) -> CoreError {
        log_business_event!(
            event.category = event::category::AUTH,
            event.action = event::action::LOGIN_FAILURE,
            event.entity_type = event::entity_type::USER,
            event.result = event::result::FAILURE,
            auth.badge_number = badge_number,
            auth.reason = reason,
            "ログイン失敗"
        );
        CoreError::Unauthorized(INVALID_CREDENTIALS.to_string())
    }

    fn dummy_verification(&self, password: &PlainPassword) {
        let _ = self
            .password_checker
            .verify(password, &PasswordHash::new(DUMMY_HASH));
    }
}
