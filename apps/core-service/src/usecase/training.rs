//! 研修カタログの参照

use std::sync::Arc;

use trainflow_domain::training::{TrainingId, TrainingOpportunity};
use trainflow_infra::repository::TrainingRepository;

use crate::{error::CoreError, usecase::helpers::FindResultExt};

pub struct TrainingUseCaseImpl {
    training_repo: Arc<dyn TrainingRepository>,
}

impl TrainingUseCaseImpl {
    pub fn new(training_repo: Arc<dyn TrainingRepository>) -> Self {
        Self { training_repo }
    }

    /// 実施日順
    pub async fn list(&self) -> Result<Vec<TrainingOpportunity>, CoreError> {
        Ok(self.training_repo.find_all().await?)
    }

    pub async fn get(&self, id: &TrainingId) -> Result<TrainingOpportunity, CoreError> {
        self.training_repo.find_by_id(id).await.or_not_found("研修")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Days;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_utils::TestFixture;

    #[tokio::test]
    async fn test_一覧は実施日順() {
        let fx = TestFixture::new();
        let later = fx.add_training("Active Shooter Response", fx.today() + Days::new(20));
        let sooner = fx.add_training("Crisis Negotiation", fx.today() + Days::new(5));

        let trainings = fx.training_usecase().list().await.unwrap();

        assert_eq!(trainings, vec![sooner, later]);
    }

    #[tokio::test]
    async fn test_存在しない研修は404() {
        let fx = TestFixture::new();

        let result = fx.training_usecase().get(&TrainingId::new()).await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }
}
