//! 職員管理ユースケース

use std::sync::Arc;

use trainflow_domain::{
    clock::Clock,
    password::PlainPassword,
    user::{BadgeNumber, Email, NewUser, Platoon, ProfileUpdate, User, UserId, UserRole},
    value_objects::PersonName,
};
use trainflow_infra::{PasswordChecker, repository::UserRepository};

use crate::{error::CoreError, usecase::helpers::FindResultExt};

/// 職員作成の入力
pub struct CreateUserInput {
    pub badge_number: BadgeNumber,
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub email: Email,
    pub role: UserRole,
    pub rank: String,
    pub supervisor_id: Option<UserId>,
    pub platoon: Option<Platoon>,
    pub password: String,
}

pub struct UserUseCaseImpl {
    user_repository: Arc<dyn UserRepository>,
    password_checker: Arc<dyn PasswordChecker>,
    clock: Arc<dyn Clock>,
}

impl UserUseCaseImpl {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        password_checker: Arc<dyn PasswordChecker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repository,
            password_checker,
            clock,
        }
    }

    /// 姓・名の順
    pub async fn list(&self) -> Result<Vec<User>, CoreError> {
        Ok(self.user_repository.find_all().await?)
    }

    pub async fn get(&self, id: &UserId) -> Result<User, CoreError> {
        self.user_repository.find_by_id(id).await.or_not_found("職員")
    }

    /// 職員を作成する
    ///
    /// 1. パスワードの最小長チェック
    /// 2. 上長の存在確認
    /// 3. ハッシュ化して挿入（バッジ番号・メールアドレスの重複は 409）
    pub async fn create(&self, input: CreateUserInput) -> Result<User, CoreError> {
        let password = PlainPassword::for_new_account(input.password)?;

        if let Some(supervisor_id) = &input.supervisor_id {
            self.user_repository
                .find_by_id(supervisor_id)
                .await
                .or_not_found("上長")?;
        }

        let user = User::new(NewUser {
            id: UserId::new(),
            badge_number: input.badge_number,
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            role: input.role,
            rank: input.rank,
            supervisor_id: input.supervisor_id,
            platoon: input.platoon,
            now: self.clock.now(),
        })?;
        let hash = self.password_checker.hash(&password)?;
        self.user_repository.insert(&user, &hash).await?;

        tracing::info!(user_id = %user.id(), role = %user.role(), "職員を作成");
        Ok(user)
    }

    /// プロフィールを編集する
    ///
    /// 本人か管理系ロールのみ。
    pub async fn update_profile(
        &self,
        target_id: &UserId,
        actor_id: &UserId,
        actor_role: UserRole,
        update: ProfileUpdate,
    ) -> Result<User, CoreError> {
        if target_id != actor_id && !actor_role.is_administrative() {
            return Err(CoreError::Forbidden(
                "他の職員のプロフィールは編集できません".to_string(),
            ));
        }

        let user = self.get(target_id).await?;
        let updated = user.with_profile(update, self.clock.now());
        self.user_repository.update_profile(&updated).await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::test_utils::TestFixture;

    fn input(badge: &str, email: &str, password: &str) -> CreateUserInput {
        CreateUserInput {
            badge_number: BadgeNumber::new(badge).unwrap(),
            first_name: PersonName::new("Taylor").unwrap(),
            last_name: PersonName::new("Brooks").unwrap(),
            email: Email::new(email).unwrap(),
            role: UserRole::Officer,
            rank: "Police Officer".to_string(),
            supervisor_id: None,
            platoon: Some(Platoon::BNights),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_作成した職員でログインできる() {
        let fx = TestFixture::new();

        let user = fx
            .user_usecase()
            .create(input("P9001", "t.brooks@shpd.example.com", "Patrol2026!"))
            .await
            .unwrap();

        let outcome = fx.auth_usecase().login("P9001", "Patrol2026!").await.unwrap();
        assert_eq!(outcome.user.id(), user.id());
    }

    #[rstest]
    #[case::バッジ番号("P9002", "other@shpd.example.com")]
    #[case::メールアドレス("P9999", "t.brooks@shpd.example.com")]
    #[tokio::test]
    async fn test_重複は409(#[case] badge: &str, #[case] email: &str) {
        let fx = TestFixture::new();
        let sut = fx.user_usecase();
        sut.create(input("P9002", "t.brooks@shpd.example.com", "Patrol2026!"))
            .await
            .unwrap();

        let result = sut.create(input(badge, email, "Patrol2026!")).await;

        assert!(matches!(result, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_短いパスワードは400() {
        let fx = TestFixture::new();

        let result = fx
            .user_usecase()
            .create(input("P9003", "t.brooks@shpd.example.com", "short"))
            .await;

        assert!(matches!(result, Err(CoreError::BadRequest(_))));
        assert!(fx.users.users().is_empty());
    }

    #[tokio::test]
    async fn test_存在しない上長は404() {
        let fx = TestFixture::new();

        let result = fx
            .user_usecase()
            .create(CreateUserInput {
                supervisor_id: Some(UserId::new()),
                ..input("P9004", "t.brooks@shpd.example.com", "Patrol2026!")
            })
            .await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_本人はプロフィールを編集できる() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);

        let updated = fx
            .user_usecase()
            .update_profile(
                officer.id(),
                officer.id(),
                officer.role(),
                ProfileUpdate {
                    platoon: Some(Some(Platoon::ADays)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.platoon(), Some(Platoon::ADays));
        assert_eq!(fx.users.users()[0].platoon(), Some(Platoon::ADays));
    }

    #[tokio::test]
    async fn test_他人のプロフィール編集は403() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);
        let other = fx.officer(None);

        let result = fx
            .user_usecase()
            .update_profile(other.id(), officer.id(), officer.role(), ProfileUpdate::default())
            .await;

        assert!(matches!(result, Err(CoreError::Forbidden(_))));
    }
}
