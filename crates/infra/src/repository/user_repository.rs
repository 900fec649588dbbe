//! # UserRepository
//!
//! 職員情報の永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **パスワードハッシュの分離**: `User` にはハッシュを持たせず、
//!   ログイン時だけ [`UserRepository::find_credentials_by_badge`] で一緒に取得する
//! - **階級の照合はドメイン側**: 階級は自由記述のため SQL では絞り込まず、
//!   `User::holds_rank` で判定する

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trainflow_domain::{
   password::PasswordHash,
   user::{BadgeNumber, Email, Platoon, User, UserId, UserRecord, UserRole},
   value_objects::PersonName,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{db::map_unique_violation, error::InfraError};

/// ユーザーリポジトリトレイト
#[async_trait]
pub trait UserRepository: Send + Sync {
   /// ID でユーザーを検索
   async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError>;

   /// 複数の ID でユーザーを一括検索
   ///
   /// 存在しない ID は無視する。空の配列を渡した場合は空の Vec を返す。
   async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, InfraError>;

   /// バッジ番号でユーザーとパスワードハッシュを取得する（ログイン用）
   async fn find_credentials_by_badge(
      &self,
      badge_number: &BadgeNumber,
   ) -> Result<Option<(User, PasswordHash)>, InfraError>;

   /// 全職員を姓・名の順で取得する
   async fn find_all(&self) -> Result<Vec<User>, InfraError>;

   /// 指定ロールの職員を取得する
   async fn find_by_roles(&self, roles: &[UserRole]) -> Result<Vec<User>, InfraError>;

   /// 直属の部下を取得する
   async fn find_supervisees(&self, supervisor_id: &UserId) -> Result<Vec<User>, InfraError>;

   /// 新規職員を登録する
   ///
   /// バッジ番号またはメールアドレスが重複する場合は `Conflict` を返す。
   async fn insert(&self, user: &User, password_hash: &PasswordHash) -> Result<(), InfraError>;

   /// プロフィール項目を更新する
   async fn update_profile(&self, user: &User) -> Result<(), InfraError>;
}

/// DB の users テーブルの行
#[derive(sqlx::FromRow)]
struct UserRow {
   id: Uuid,
   badge_number: String,
   first_name: String,
   last_name: String,
   email: String,
   role: String,
   rank: String,
   supervisor_id: Option<Uuid>,
   platoon: Option<String>,
   created_at: DateTime<Utc>,
   updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
   type Error = InfraError;

   fn try_from(row: UserRow) -> Result<Self, Self::Error> {
      Ok(User::from_db(UserRecord {
         id: UserId::from_uuid(row.id),
         badge_number: BadgeNumber::new(row.badge_number)
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
         first_name: PersonName::new(row.first_name)
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
         last_name: PersonName::new(row.last_name)
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
         email: Email::new(row.email).map_err(|e| InfraError::unexpected(e.to_string()))?,
         role: row
            .role
            .parse::<UserRole>()
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
         rank: row.rank,
         supervisor_id: row.supervisor_id.map(UserId::from_uuid),
         platoon: row
            .platoon
            .as_deref()
            .map(str::parse::<Platoon>)
            .transpose()
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
         created_at: row.created_at,
         updated_at: row.updated_at,
      }))
   }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
   #[sqlx(flatten)]
   user: UserRow,
   password_hash: String,
}

const USER_COLUMNS: &str = r#"
   id, badge_number, first_name, last_name, email, role, rank,
   supervisor_id, platoon, created_at, updated_at
"#;

fn into_users(rows: Vec<UserRow>) -> Result<Vec<User>, InfraError> {
   rows.into_iter().map(User::try_from).collect()
}

/// PostgreSQL 実装の UserRepository
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
   pool: PgPool,
}

impl PostgresUserRepository {
   /// 新しいリポジトリインスタンスを作成
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(%id))]
   async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError> {
      let row = sqlx::query_as::<_, UserRow>(&format!(
         "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
      ))
      .bind(id.as_uuid())
      .fetch_optional(&self.pool)
      .await?;

      row.map(User::try_from).transpose()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(count = ids.len()))]
   async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, InfraError> {
      if ids.is_empty() {
         return Ok(Vec::new());
      }

      let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
      let rows = sqlx::query_as::<_, UserRow>(&format!(
         "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
      ))
      .bind(&uuids)
      .fetch_all(&self.pool)
      .await?;

      into_users(rows)
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn find_credentials_by_badge(
      &self,
      badge_number: &BadgeNumber,
   ) -> Result<Option<(User, PasswordHash)>, InfraError> {
      let row = sqlx::query_as::<_, CredentialRow>(&format!(
         "SELECT {USER_COLUMNS}, password_hash FROM users WHERE badge_number = $1"
      ))
      .bind(badge_number.as_str())
      .fetch_optional(&self.pool)
      .await?;

      let Some(row) = row else {
         return Ok(None);
      };

      Ok(Some((
         User::try_from(row.user)?,
         PasswordHash::new(row.password_hash),
      )))
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn find_all(&self) -> Result<Vec<User>, InfraError> {
      let rows = sqlx::query_as::<_, UserRow>(&format!(
         "SELECT {USER_COLUMNS} FROM users ORDER BY last_name, first_name"
      ))
      .fetch_all(&self.pool)
      .await?;

      into_users(rows)
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn find_by_roles(&self, roles: &[UserRole]) -> Result<Vec<User>, InfraError> {
      if roles.is_empty() {
         return Ok(Vec::new());
      }

      let roles: Vec<&str> = roles.iter().map(|role| role.into()).collect();
      let rows = sqlx::query_as::<_, UserRow>(&format!(
         "SELECT {USER_COLUMNS} FROM users WHERE role = ANY($1) ORDER BY last_name, first_name"
      ))
      .bind(&roles)
      .fetch_all(&self.pool)
      .await?;

      into_users(rows)
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%supervisor_id))]
   async fn find_supervisees(&self, supervisor_id: &UserId) -> Result<Vec<User>, InfraError> {
      let rows = sqlx::query_as::<_, UserRow>(&format!(
         "SELECT {USER_COLUMNS} FROM users WHERE supervisor_id = $1 ORDER BY last_name, first_name"
      ))
      .bind(supervisor_id.as_uuid())
      .fetch_all(&self.pool)
      .await?;

      into_users(rows)
   }

   #[tracing::instrument(skip_all, level = "debug", fields(id = %user.id()))]
   async fn insert(&self, user: &User, password_hash: &PasswordHash) -> Result<(), InfraError> {
      let role: &str = user.role().into();
      let platoon: Option<&str> = user.platoon().map(|p| p.into());

      sqlx::query(
         r#"
         INSERT INTO users (
            id, badge_number, first_name, last_name, email, role, rank,
            supervisor_id, platoon, password_hash, created_at, updated_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         "#,
      )
      .bind(user.id().as_uuid())
      .bind(user.badge_number().as_str())
      .bind(user.first_name().as_str())
      .bind(user.last_name().as_str())
      .bind(user.email().as_str())
      .bind(role)
      .bind(user.rank())
      .bind(user.supervisor_id().map(|id| *id.as_uuid()))
      .bind(platoon)
      .bind(password_hash.as_str())
      .bind(user.created_at())
      .bind(user.updated_at())
      .execute(&self.pool)
      .await
      .map_err(|e| map_unique_violation(e, "User", user.badge_number().as_str()))?;

      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(id = %user.id()))]
   async fn update_profile(&self, user: &User) -> Result<(), InfraError> {
      let platoon: Option<&str> = user.platoon().map(|p| p.into());

      sqlx::query(
         r#"
         UPDATE users SET
            first_name = $1,
            last_name = $2,
            email = $3,
            platoon = $4,
            updated_at = $5
         WHERE id = $6
         "#,
      )
      .bind(user.first_name().as_str())
      .bind(user.last_name().as_str())
      .bind(user.email().as_str())
      .bind(platoon)
      .bind(user.updated_at())
      .bind(user.id().as_uuid())
      .execute(&self.pool)
      .await
      .map_err(|e| map_unique_violation(e, "User", user.email().as_str()))?;

      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_トレイトはsendとsyncを実装している() {
      fn assert_send_sync<T: Send + Sync>() {}
      assert_send_sync::<PostgresUserRepository>();
   }

   #[test]
   fn test_不正なロールの行は変換エラーになる() {
      let now = Utc::now();
      let row = UserRow {
         id: Uuid::now_v7(),
         badge_number: "P5001".to_string(),
         first_name: "Alex".to_string(),
         last_name: "Morgan".to_string(),
         email: "alex.morgan@shpd.example.com".to_string(),
         role: "sheriff".to_string(),
         rank: "Police Officer".to_string(),
         supervisor_id: None,
         platoon: Some("A-Days".to_string()),
         created_at: now,
         updated_at: now,
      };

      assert!(User::try_from(row).is_err());
   }

   #[test]
   fn test_正常な行はユーザーに変換できる() {
      let now = Utc::now();
      let row = UserRow {
         id: Uuid::now_v7(),
         badge_number: "P5001".to_string(),
         first_name: "Alex".to_string(),
         last_name: "Morgan".to_string(),
         email: "alex.morgan@shpd.example.com".to_string(),
         role: "officer".to_string(),
         rank: "Police Officer".to_string(),
         supervisor_id: None,
         platoon: Some("B-Nights".to_string()),
         created_at: now,
         updated_at: now,
      };

      let user = User::try_from(row).unwrap();

      assert_eq!(user.role(), UserRole::Officer);
      assert_eq!(user.platoon(), Some(Platoon::BNights));
      assert_eq!(user.full_name(), "Alex Morgan");
   }
}
