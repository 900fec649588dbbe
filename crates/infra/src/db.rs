//! # PostgreSQL データベース接続管理
//!
//! 接続プールの作成とマイグレーションの適用を行う。
//!
//! ```rust,ignore
//! use trainflow_infra::db;
//!
//! let pool = db::create_pool("postgres://localhost/trainflow").await?;
//! db::run_migrations(&pool).await?;
//! ```

use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::error::InfraError;

/// 最大接続数
const MAX_CONNECTIONS: u32 = 10;

/// 接続取得のタイムアウト
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// データベースマイグレーションを実行する
///
/// 適用済みのマイグレーションはスキップされる。sqlx が advisory lock を取るため
/// 複数プロセスから同時に呼び出してもよい。
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// PostgreSQL 接続プールを作成する
///
/// 起動時に一度だけ呼び出し、プールをアプリケーション全体で共有する。
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

/// 疎通確認（readiness チェック用）
pub async fn ping(pool: &PgPool) -> Result<(), InfraError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// 一意制約違反を `Conflict` に読み替える
///
/// それ以外の DB エラーはそのまま `Database` として返す。
pub(crate) fn map_unique_violation(
    err: sqlx::Error,
    entity: &str,
    id: impl Into<String>,
) -> InfraError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            InfraError::conflict(entity, id)
        }
        _ => err.into(),
    }
}
