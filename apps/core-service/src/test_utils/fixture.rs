//! テストフィクスチャ
//!
//! 全リポジトリのモック、固定時刻、通知ミラーをひとまとめにし、
//! ユースケースの SUT（System Under Test）を組み立てる。
//!
//! ```ignore
//! let fx = TestFixture::new();
//! let supervisor = fx.supervisor();
//! let officer = fx.officer(Some(&supervisor));
//! let sut = fx.request_usecase();
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use chrono::{DateTime, NaiveDate, Utc};
use trainflow_domain::{
    clock::{Clock, FixedClock},
    training::{TrainingId, TrainingOpportunity},
    user::{BadgeNumber, Email, NewUser, User, UserId, UserRole},
    value_objects::PersonName,
};
use trainflow_infra::mock::{
    MockBudgetRepository,
    MockCertificateRepository,
    MockCostRepository,
    MockCustomTrainingRequestRepository,
    MockDocumentRepository,
    MockEmailLogRepository,
    MockEmailPreferencesRepository,
    MockInvoiceRepository,
    MockNotificationRepository,
    MockNotificationSender,
    MockPasswordChecker,
    MockPaymentBatchRepository,
    MockSessionManager,
    MockTrainingRepository,
    MockTrainingRequestRepository,
    MockUserRepository,
};

use crate::{
    app_builder::AppDependencies,
    handler::ReadinessState,
    usecase::{
        AccountingUseCaseImpl,
        AuthUseCaseImpl,
        CertificateUseCaseImpl,
        CustomRequestUseCaseImpl,
        DocumentUseCaseImpl,
        EmailUseCaseImpl,
        NotificationGenerator,
        RequestUseCaseImpl,
        TrainingUseCaseImpl,
        UserUseCaseImpl,
        notification::{
            NotificationInboxUseCaseImpl,
            NotificationMirror,
            NotificationPublisher,
            NotificationService,
            TemplateRenderer,
        },
    },
};

/// 2026-10-19T09:00:00Z
pub const FIXTURE_NOW_TIMESTAMP: i64 = 1_792_400_400;

pub struct TestFixture {
    pub now: DateTime<Utc>,
    pub users: MockUserRepository,
    pub trainings: MockTrainingRepository,
    pub requests: MockTrainingRequestRepository,
    pub custom_requests: MockCustomTrainingRequestRepository,
    pub notifications: MockNotificationRepository,
    pub preferences: MockEmailPreferencesRepository,
    pub email_logs: MockEmailLogRepository,
    pub certificates: MockCertificateRepository,
    pub documents: MockDocumentRepository,
    pub costs: MockCostRepository,
    pub budgets: MockBudgetRepository,
    pub invoices: MockInvoiceRepository,
    pub payment_batches: MockPaymentBatchRepository,
    pub sender: MockNotificationSender,
    pub sessions: MockSessionManager,
    pub mirror: Arc<NotificationMirror>,
    badge_seq: AtomicU32,
}

impl TestFixture {
    pub fn new() -> Self {
        let invoices = MockInvoiceRepository::new();
        Self {
            now: DateTime::from_timestamp(FIXTURE_NOW_TIMESTAMP, 0).unwrap(),
            users: MockUserRepository::new(),
            trainings: MockTrainingRepository::new(),
            requests: MockTrainingRequestRepository::new(),
            custom_requests: MockCustomTrainingRequestRepository::new(),
            notifications: MockNotificationRepository::new(),
            preferences: MockEmailPreferencesRepository::new(),
            email_logs: MockEmailLogRepository::new(),
            certificates: MockCertificateRepository::new(),
            documents: MockDocumentRepository::new(),
            costs: MockCostRepository::new(),
            budgets: MockBudgetRepository::new(),
            payment_batches: MockPaymentBatchRepository::new(invoices.clone()),
            invoices,
            sender: MockNotificationSender::new(),
            sessions: MockSessionManager::new(),
            mirror: Arc::new(NotificationMirror::new()),
            badge_seq: AtomicU32::new(5001),
        }
    }

    /// メール送信が常に失敗するフィクスチャ
    pub fn with_failing_sender() -> Self {
        Self {
            sender: MockNotificationSender::failing(),
            ..Self::new()
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(self.now))
    }

    // ===== ユーザー =====

    /// 職員を作成してリポジトリに登録する（パスワードは `"password123"`）
    pub fn add_user(
        &self,
        first_name: &str,
        last_name: &str,
        role: UserRole,
        rank: &str,
        supervisor: Option<&User>,
    ) -> User {
        let seq = self.badge_seq.fetch_add(1, Ordering::SeqCst);
        let user = User::new(NewUser {
            id: UserId::new(),
            badge_number: BadgeNumber::new(format!("P{seq}")).unwrap(),
            first_name: PersonName::new(first_name).unwrap(),
            last_name: PersonName::new(last_name).unwrap(),
            email: Email::new(format!(
                "{}.{}{seq}@shpd.example.com",
                first_name.to_lowercase(),
                last_name.to_lowercase()
            ))
            .unwrap(),
            role,
            rank: rank.to_string(),
            supervisor_id: supervisor.map(|s| s.id().clone()),
            platoon: None,
            now: self.now,
        })
        .unwrap();
        self.users.add_user(user.clone());
        user
    }

    pub fn officer(&self, supervisor: Option<&User>) -> User {
        self.add_user("Alex", "Morgan", UserRole::Officer, "Police Officer", supervisor)
    }

    pub fn supervisor(&self) -> User {
        self.add_user("Dana", "Rivera", UserRole::Supervisor, "Sergeant", None)
    }

    pub fn administrator(&self) -> User {
        self.add_user("Chris", "Park", UserRole::Administrator, "Lieutenant", None)
    }

    pub fn coordinator(&self) -> User {
        self.add_user("Jamie", "Lee", UserRole::TrainingCoordinator, "Civilian", None)
    }

    pub fn accountant(&self) -> User {
        self.add_user("Robin", "Shaw", UserRole::Accounting, "Civilian", None)
    }

    /// 指定の階級テキストを持つ一般職員
    pub fn ranked(&self, rank: &str) -> User {
        self.add_user("Sam", "Quinn", UserRole::Officer, rank, None)
    }

    // ===== カタログ =====

    pub fn add_training(&self, title: &str, date: NaiveDate) -> TrainingOpportunity {
        let training = TrainingOpportunity {
            id: TrainingId::new(),
            title: title.to_string(),
            description: format!("{title} course"),
            category: "Tactical".to_string(),
            date,
            location: "Training Center".to_string(),
            instructor: "Sgt. Blake".to_string(),
            capacity: 20,
            enrolled: 4,
            credits: 8,
            mandatory: false,
            cpt_hours: Some(8.0),
        };
        self.trainings.add_training(training.clone());
        training
    }

    // ===== SUT =====

    pub fn publisher(&self) -> Arc<NotificationPublisher> {
        Arc::new(NotificationPublisher::new(
            Arc::new(self.notifications.clone()),
            self.clock(),
        ))
    }

    pub fn notifier(&self) -> Arc<NotificationService> {
        Arc::new(NotificationService::new(
            Arc::new(self.sender.clone()),
            TemplateRenderer::new().unwrap(),
            Arc::new(self.email_logs.clone()),
            Arc::new(self.preferences.clone()),
            self.clock(),
            "http://localhost:5173".to_string(),
        ))
    }

    pub fn inbox_usecase(&self) -> Arc<NotificationInboxUseCaseImpl> {
        Arc::new(NotificationInboxUseCaseImpl::new(
            Arc::new(self.notifications.clone()),
            self.mirror.clone(),
        ))
    }

    pub fn request_usecase(&self) -> RequestUseCaseImpl {
        RequestUseCaseImpl::new(
            Arc::new(self.requests.clone()),
            Arc::new(self.trainings.clone()),
            Arc::new(self.users.clone()),
            self.publisher(),
            self.notifier(),
            self.clock(),
        )
    }

    pub fn custom_request_usecase(&self) -> CustomRequestUseCaseImpl {
        CustomRequestUseCaseImpl::new(
            Arc::new(self.custom_requests.clone()),
            Arc::new(self.users.clone()),
            self.publisher(),
            self.notifier(),
            self.clock(),
        )
    }

    pub fn auth_usecase(&self) -> AuthUseCaseImpl {
        AuthUseCaseImpl::new(
            Arc::new(self.users.clone()),
            Arc::new(MockPasswordChecker),
            Arc::new(self.sessions.clone()),
            self.inbox_usecase(),
            self.clock(),
        )
    }

    pub fn email_usecase(&self) -> EmailUseCaseImpl {
        EmailUseCaseImpl::new(
            self.notifier(),
            Arc::new(self.users.clone()),
            Arc::new(self.preferences.clone()),
        )
    }

    pub fn generator(&self) -> NotificationGenerator {
        NotificationGenerator::new(
            Arc::new(self.users.clone()),
            Arc::new(self.requests.clone()),
            Arc::new(self.notifications.clone()),
            Arc::new(self.certificates.clone()),
            Arc::new(self.costs.clone()),
            Arc::new(self.budgets.clone()),
            Arc::new(self.email_logs.clone()),
            self.publisher(),
            self.notifier(),
            self.clock(),
        )
    }

    pub fn accounting_usecase(&self) -> AccountingUseCaseImpl {
        AccountingUseCaseImpl::new(
            Arc::new(self.costs.clone()),
            Arc::new(self.budgets.clone()),
            Arc::new(self.invoices.clone()),
            Arc::new(self.payment_batches.clone()),
            self.clock(),
        )
    }

    pub fn certificate_usecase(&self) -> CertificateUseCaseImpl {
        CertificateUseCaseImpl::new(
            Arc::new(self.certificates.clone()),
            Arc::new(self.users.clone()),
            self.publisher(),
            self.clock(),
        )
    }

    pub fn document_usecase(&self) -> DocumentUseCaseImpl {
        DocumentUseCaseImpl::new(Arc::new(self.documents.clone()), self.clock())
    }

    pub fn user_usecase(&self) -> UserUseCaseImpl {
        UserUseCaseImpl::new(
            Arc::new(self.users.clone()),
            Arc::new(MockPasswordChecker),
            self.clock(),
        )
    }

    pub fn training_usecase(&self) -> TrainingUseCaseImpl {
        TrainingUseCaseImpl::new(Arc::new(self.trainings.clone()))
    }

    // ===== ルーター =====

    /// モック一式を詰めた依存（`build_app` 用）
    pub fn dependencies(&self) -> AppDependencies {
        AppDependencies {
            users: Arc::new(self.users.clone()),
            trainings: Arc::new(self.trainings.clone()),
            requests: Arc::new(self.requests.clone()),
            custom_requests: Arc::new(self.custom_requests.clone()),
            notifications: Arc::new(self.notifications.clone()),
            preferences: Arc::new(self.preferences.clone()),
            email_logs: Arc::new(self.email_logs.clone()),
            certificates: Arc::new(self.certificates.clone()),
            documents: Arc::new(self.documents.clone()),
            costs: Arc::new(self.costs.clone()),
            budgets: Arc::new(self.budgets.clone()),
            invoices: Arc::new(self.invoices.clone()),
            payment_batches: Arc::new(self.payment_batches.clone()),
            sender: Arc::new(self.sender.clone()),
            session_manager: Arc::new(self.sessions.clone()),
            password_checker: Arc::new(MockPasswordChecker),
            mirror: self.mirror.clone(),
            clock: self.clock(),
            base_url: "http://localhost:5173".to_string(),
        }
    }

    /// 接続しない DB プールで Readiness の State を作る
    pub fn readiness_state(&self) -> Arc<ReadinessState> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/trainflow_test")
            .unwrap();
        Arc::new(ReadinessState {
            pool,
            session_manager: Arc::new(self.sessions.clone()),
        })
    }

    /// 指定ユーザー宛のアプリ内通知（保存順）
    pub fn notifications_for(&self, user: &User) -> Vec<trainflow_domain::notification::Notification> {
        self.notifications
            .notifications()
            .into_iter()
            .filter(|n| n.user_id() == user.id())
            .collect()
    }

    /// 指定ユーザー宛に送信されたメール
    pub fn emails_to(&self, user: &User) -> Vec<trainflow_domain::notification::EmailMessage> {
        self.sender
            .sent_emails()
            .into_iter()
            .filter(|m| m.to == user.email().as_str())
            .collect()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
