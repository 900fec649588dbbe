//! # セッション管理
//!
//! Redis を使用したセッション管理を提供する。
//!
//! ## Redis キー設計
//!
//! | キー | 値 | TTL |
//! |-----|-----|-----|
//! | `session:{session_id}` | SessionData (JSON) | 28800秒（8時間） |
//!
//! アクセスのたびに `last_accessed_at` を更新し TTL を延長する（スライディング有効期限）。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Deserialize, Serialize};
use trainflow_domain::user::{UserId, UserRole};
use uuid::Uuid;

use crate::InfraError;

/// セッションの有効期限（秒）
/// 8時間 = 28800秒
pub const SESSION_TTL_SECONDS: u64 = 28800;

/// セッションデータ
///
/// Redis に JSON 形式で保存されるセッション情報。
/// ログイン成功時に作成され、ログアウトまたは TTL 経過で削除される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
   user_id: UserId,
   badge_number: String,
   name: String,
   role: UserRole,
   created_at: DateTime<Utc>,
   last_accessed_at: DateTime<Utc>,
}

impl SessionData {
   /// `created_at` と `last_accessed_at` は `now` で初期化される。
   pub fn new(
      user_id: UserId,
      badge_number: String,
      name: String,
      role: UserRole,
      now: DateTime<Utc>,
   ) -> Self {
      Self {
         user_id,
         badge_number,
         name,
         role,
         created_at: now,
         last_accessed_at: now,
      }
   }

   pub fn user_id(&self) -> &UserId {
      &self.user_id
   }

   pub fn badge_number(&self) -> &str {
      &self.badge_number
   }

   pub fn name(&self) -> &str {
      &self.name
   }

   pub fn role(&self) -> UserRole {
      self.role
   }

   pub fn created_at(&self) -> DateTime<Utc> {
      self.created_at
   }

   pub fn last_accessed_at(&self) -> DateTime<Utc> {
      self.last_accessed_at
   }

   pub fn touched(self, now: DateTime<Utc>) -> Self {
      Self {
         last_accessed_at: now,
         ..self
      }
   }
}

/// セッション管理トレイト
#[async_trait]
pub trait SessionManager: Send + Sync {
   /// セッションを作成し、セッション ID（UUID v4）を返す
   async fn create(&self, data: &SessionData) -> Result<String, InfraError>;

   /// セッションを取得する
   ///
   /// 見つかった場合は `last_accessed_at` を `now` に更新し、TTL を延長する。
   async fn get(
      &self,
      session_id: &str,
      now: DateTime<Utc>,
   ) -> Result<Option<SessionData>, InfraError>;

   /// セッションを削除する
   ///
   /// 存在しないセッションを削除しても成功とする。
   async fn delete(&self, session_id: &str) -> Result<(), InfraError>;

   /// 疎通確認（readiness チェック用）
   async fn ping(&self) -> Result<(), InfraError>;
}

/// Redis を使用したセッションマネージャ
pub struct RedisSessionManager {
   conn: ConnectionManager,
}

impl RedisSessionManager {
   /// `redis_url` の例: `redis://localhost:6379`
   pub async fn new(redis_url: &str) -> Result<Self, InfraError> {
      let client = redis::Client::open(redis_url)?;
      let conn = ConnectionManager::new(client).await?;
      Ok(Self { conn })
   }

   fn session_key(session_id: &str) -> String {
      format!("session:{session_id}")
   }

   /// セッションの残り TTL（秒）を取得する
   pub async fn ttl(&self, session_id: &str) -> Result<Option<i64>, InfraError> {
      let mut conn = self.conn.clone();
      let ttl: i64 = conn.ttl(Self::session_key(session_id)).await?;

      // -2: キーなし、-1: TTL 未設定
      if ttl < 0 { Ok(None) } else { Ok(Some(ttl)) }
   }
}

#[async_trait]
impl SessionManager for RedisSessionManager {
   #[tracing::instrument(skip_all, level = "debug")]
   async fn create(&self, data: &SessionData) -> Result<String, InfraError> {
      let session_id = Uuid::new_v4().to_string();
      let json = serde_json::to_string(data)?;

      let mut conn = self.conn.clone();
      let _: () = conn
         .set_ex(Self::session_key(&session_id), json, SESSION_TTL_SECONDS)
         .await?;

      Ok(session_id)
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn get(
      &self,
      session_id: &str,
      now: DateTime<Utc>,
   ) -> Result<Option<SessionData>, InfraError> {
      let key = Self::session_key(session_id);
      let mut conn = self.conn.clone();

      let Some(json) = conn.get::<_, Option<String>>(&key).await? else {
         return Ok(None);
      };
      let data = serde_json::from_str::<SessionData>(&json)?.touched(now);

      let _: () = conn
         .set_ex(&key, serde_json::to_string(&data)?, SESSION_TTL_SECONDS)
         .await?;
      Ok(Some(data))
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn delete(&self, session_id: &str) -> Result<(), InfraError> {
      let mut conn = self.conn.clone();
      let _: () = conn.del(Self::session_key(session_id)).await?;
      Ok(())
   }

   async fn ping(&self) -> Result<(), InfraError> {
      let mut conn = self.conn.clone();
      let _: String = redis::cmd("PING").query_async(&mut conn).await?;
      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn now() -> DateTime<Utc> {
      DateTime::from_timestamp(1_700_000_000, 0).unwrap()
   }

   #[test]
   fn test_セッションキーの形式() {
      assert_eq!(RedisSessionManager::session_key("abc"), "session:abc");
   }

   #[test]
   fn test_セッションデータはjsonで往復できる() {
      let data = SessionData::new(
         UserId::new(),
         "1042".to_string(),
         "Pat Quinn".to_string(),
         UserRole::Supervisor,
         now(),
      );

      let json = serde_json::to_string(&data).unwrap();
      let restored: SessionData = serde_json::from_str(&json).unwrap();

      assert_eq!(restored, data);
   }

   #[test]
   fn test_touchedは最終アクセスのみ更新する() {
      let data = SessionData::new(
         UserId::new(),
         "1042".to_string(),
         "Pat Quinn".to_string(),
         UserRole::Officer,
         now(),
      );
      let later = now() + chrono::Duration::minutes(30);

      let sut = data.clone().touched(later);

      assert_eq!(sut.created_at(), now());
      assert_eq!(sut.last_accessed_at(), later);
   }

   #[test]
   fn test_トレイトはsendとsyncを実装している() {
      fn assert_send_sync<T: Send + Sync>() {}
      assert_send_sync::<RedisSessionManager>();
   }
}
