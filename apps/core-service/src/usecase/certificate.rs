//! # 修了証ユースケース
//!
//! 管理者が修了証を発行・失効させ、職員は自分の修了証を参照する。

use std::sync::Arc;

use chrono::NaiveDate;
use trainflow_domain::{
    certificate::{Certificate, CertificateId, CertificateStatus, NewCertificate},
    clock::Clock,
    notification::{NotificationDraft, NotificationKind},
    user::UserId,
};
use trainflow_infra::repository::{CertificateRepository, UserRepository};
use trainflow_shared::{event_log::event, log_business_event};

use crate::{
    error::CoreError,
    usecase::{helpers::FindResultExt, notification::NotificationPublisher},
};

#[derive(Debug, Clone)]
pub struct IssueCertificateInput {
    pub user_id: UserId,
    pub certificate_number: String,
    pub training_title: String,
    pub completion_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub credits: f64,
    pub instructor: Option<String>,
}

pub struct CertificateUseCaseImpl {
    certificate_repo: Arc<dyn CertificateRepository>,
    user_repo: Arc<dyn UserRepository>,
    publisher: Arc<NotificationPublisher>,
    clock: Arc<dyn Clock>,
}

impl CertificateUseCaseImpl {
    pub fn new(
        certificate_repo: Arc<dyn CertificateRepository>,
        user_repo: Arc<dyn UserRepository>,
        publisher: Arc<NotificationPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            certificate_repo,
            user_repo,
            publisher,
            clock,
        }
    }

    /// 修了証を発行し、受講者に通知する
    ///
    /// 証明書番号の重複は 409。
    pub async fn issue(
        &self,
        issuer_id: &UserId,
        input: IssueCertificateInput,
    ) -> Result<Certificate, CoreError> {
        let holder = self.user_repo.find_by_id(&input.user_id).await.or_not_found("職員")?;

        let certificate = Certificate::issue(NewCertificate {
            id: CertificateId::new(),
            user_id: holder.id().clone(),
            certificate_number: input.certificate_number,
            training_title: input.training_title,
            completion_date: input.completion_date,
            expiration_date: input.expiration_date,
            credits: input.credits,
            instructor: input.instructor,
            now: self.clock.now(),
        })?;
        self.certificate_repo.insert(&certificate).await?;

        log_business_event!(
            event.category = event::category::CERTIFICATE,
            event.action = event::action::CERTIFICATE_ISSUED,
            event.entity_type = event::entity_type::CERTIFICATE,
            event.entity_id = %certificate.id(),
            event.actor_id = %issuer_id,
            event.result = event::result::SUCCESS,
            certificate.number = certificate.certificate_number(),
            "修了証を発行"
        );

        self.publisher
            .publish(
                NotificationDraft::new(
                    holder.id().clone(),
                    "Certificate Issued",
                    format!(
                        "Your certificate for \"{}\" has been issued.",
                        certificate.training_title()
                    ),
                    NotificationKind::Success,
                )
                .with_link("/certificates"),
            )
            .await;

        Ok(certificate)
    }

    pub async fn revoke(&self, id: &CertificateId, actor_id: &UserId) -> Result<Certificate, CoreError> {
        let certificate = self.certificate_repo.find_by_id(id).await.or_not_found("修了証")?;
        let expected: CertificateStatus = certificate.status();
        let revoked = certificate.revoke(self.clock.now())?;
        self.certificate_repo.update_status(&revoked, expected).await?;

        log_business_event!(
            event.category = event::category::CERTIFICATE,
            event.action = event::action::CERTIFICATE_REVOKED,
            event.entity_type = event::entity_type::CERTIFICATE,
            event.entity_id = %revoked.id(),
            event.actor_id = %actor_id,
            event.result = event::result::SUCCESS,
            "修了証を失効"
        );
        Ok(revoked)
    }

    /// 職員の修了証（修了日の新しい順）
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Certificate>, CoreError> {
        Ok(self.certificate_repo.find_by_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_utils::TestFixture;

    fn input(user_id: &UserId, number: &str) -> IssueCertificateInput {
        IssueCertificateInput {
            user_id: user_id.clone(),
            certificate_number: number.to_string(),
            training_title: "Crisis Intervention Team".to_string(),
            completion_date: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            expiration_date: NaiveDate::from_ymd_opt(2028, 10, 15),
            credits: 40.0,
            instructor: Some("Lt. Harper".to_string()),
        }
    }

    #[tokio::test]
    async fn test_発行すると受講者に通知が届く() {
        let fx = TestFixture::new();
        let admin = fx.administrator();
        let officer = fx.officer(None);

        let certificate = fx
            .certificate_usecase()
            .issue(admin.id(), input(officer.id(), "CIT-2026-014"))
            .await
            .unwrap();

        assert_eq!(certificate.status(), CertificateStatus::Active);
        assert_eq!(certificate.issued_date(), fx.today());
        let notifications = fx.notifications_for(&officer);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title(), "Certificate Issued");
    }

    #[tokio::test]
    async fn test_証明書番号の重複は409() {
        let fx = TestFixture::new();
        let admin = fx.administrator();
        let officer = fx.officer(None);
        let sut = fx.certificate_usecase();
        sut.issue(admin.id(), input(officer.id(), "CIT-2026-015")).await.unwrap();

        let result = sut.issue(admin.id(), input(officer.id(), "CIT-2026-015")).await;

        assert!(matches!(result, Err(CoreError::Conflict(_))));
        assert_eq!(fx.certificates.certificates().len(), 1);
    }

    #[tokio::test]
    async fn test_存在しない職員には発行できない() {
        let fx = TestFixture::new();
        let admin = fx.administrator();

        let result = fx
            .certificate_usecase()
            .issue(admin.id(), input(&UserId::new(), "CIT-2026-016"))
            .await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_失効は1回だけ() {
        let fx = TestFixture::new();
        let admin = fx.administrator();
        let officer = fx.officer(None);
        let sut = fx.certificate_usecase();
        let certificate = sut.issue(admin.id(), input(officer.id(), "CIT-2026-017")).await.unwrap();

        let revoked = sut.revoke(certificate.id(), admin.id()).await.unwrap();
        let again = sut.revoke(certificate.id(), admin.id()).await;

        assert_eq!(revoked.status(), CertificateStatus::Revoked);
        assert!(matches!(again, Err(CoreError::Conflict(_))));
        assert_eq!(
            sut.list_for_user(officer.id()).await.unwrap()[0].status(),
            CertificateStatus::Revoked
        );
    }
}
