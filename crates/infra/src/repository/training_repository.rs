//! # TrainingRepository
//!
//! 研修カタログの読み取り。ワークフローからは参照のみ。

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use trainflow_domain::training::{TrainingId, TrainingOpportunity};
use uuid::Uuid;

use crate::error::InfraError;

#[async_trait]
pub trait TrainingRepository: Send + Sync {
   /// 開催日の昇順で全件取得する
   async fn find_all(&self) -> Result<Vec<TrainingOpportunity>, InfraError>;

   async fn find_by_id(&self, id: &TrainingId) -> Result<Option<TrainingOpportunity>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct TrainingRow {
   id: Uuid,
   title: String,
   description: String,
   category: String,
   date: NaiveDate,
   location: String,
   instructor: String,
   capacity: i32,
   enrolled: i32,
   credits: i32,
   mandatory: bool,
   cpt_hours: Option<f64>,
}

impl From<TrainingRow> for TrainingOpportunity {
   fn from(row: TrainingRow) -> Self {
      Self {
         id: TrainingId::from_uuid(row.id),
         title: row.title,
         description: row.description,
         category: row.category,
         date: row.date,
         location: row.location,
         instructor: row.instructor,
         capacity: row.capacity,
         enrolled: row.enrolled,
         credits: row.credits,
         mandatory: row.mandatory,
         cpt_hours: row.cpt_hours,
      }
   }
}

#[derive(Debug, Clone)]
pub struct PostgresTrainingRepository {
   pool: PgPool,
}

impl PostgresTrainingRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl TrainingRepository for PostgresTrainingRepository {
   #[tracing::instrument(skip_all, level = "debug")]
   async fn find_all(&self) -> Result<Vec<TrainingOpportunity>, InfraError> {
      let rows = sqlx::query_as::<_, TrainingRow>(
         r#"
         SELECT id, title, description, category, date, location, instructor,
                capacity, enrolled, credits, mandatory, cpt_hours
         FROM trainings
         ORDER BY date, title
         "#,
      )
      .fetch_all(&self.pool)
      .await?;

      Ok(rows.into_iter().map(TrainingOpportunity::from).collect())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%id))]
   async fn find_by_id(&self, id: &TrainingId) -> Result<Option<TrainingOpportunity>, InfraError> {
      let row = sqlx::query_as::<_, TrainingRow>(
         r#"
         SELECT id, title, description, category, date, location, instructor,
                capacity, enrolled, credits, mandatory, cpt_hours
         FROM trainings
         WHERE id = $1
         "#,
      )
      .bind(id.as_uuid())
      .fetch_optional(&self.pool)
      .await?;

      Ok(row.map(TrainingOpportunity::from))
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_トレイトはsendとsyncを実装している() {
      fn assert_send_sync<T: Send + Sync>() {}
      assert_send_sync::<PostgresTrainingRepository>();
   }
}
