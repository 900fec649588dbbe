//! # 通知ジェネレーター
//!
//! 定期実行（および管理者の手動実行）で、期限や滞留に応じたアプリ内通知を作る。
//!
//! | ジェネレーター | 対象 | 重複抑止 |
//! |----------------|------|----------|
//! | 承認待ち | 部下の申請が滞留している supervisor | 1 日 |
//! | 研修リマインダー | 7 日以内に研修がある承認済み申請 | 24 時間・研修ごと |
//! | 証明書期限 | 60 日以内に期限を迎える有効な証明書 | 1 週間・証明書ごと |
//! | 予算警告 | 最新年度の消化率が 75% 以上 | 1 日 |
//!
//! 重複抑止は `notifications` テーブルに同種の通知が残っているかで判定する。
//! 個々の失敗は [`GeneratorReport::errors`] に積んで処理を続ける。
//!
//! 研修リマインダーと証明書期限は、受信者がメール設定で決めた日数
//! （`reminder_days_before` / `cert_expiry_days_before`）以内ならメールでも知らせる。
//! メールは同じ件名で 1 回だけ送り、重複は `email_logs` の送信済み記録で判定する。

use std::sync::Arc;

use chrono::{Days, Duration, NaiveDate};
use serde::Serialize;
use trainflow_domain::{
    accounting::{BudgetStatus, DEFAULT_TOTAL_BUDGET},
    certificate::{Certificate, CertificateStatus, EXPIRY_WINDOW_DAYS, ExpiryCheck},
    clock::Clock,
    notification::{EmailFields, EmailTemplateKind, NotificationDraft},
    preferences::{EmailCategory, MAX_DAYS_BEFORE},
    request::RequestStatus,
    user::{UserId, UserRole},
};
use trainflow_infra::repository::{
    BudgetRepository,
    CertificateRepository,
    CostRepository,
    EmailLogRepository,
    NotificationRepository,
    RecentNotificationFilter,
    TrainingRequestRepository,
    UserRepository,
};
use trainflow_shared::{
    event_log::{error, event},
    log_business_event,
};

use crate::usecase::{
    helpers::email_date,
    notification::{NotificationPublisher, NotificationService},
};

/// アプリ内リマインダーを出す研修日までの日数
const REMINDER_WINDOW_DAYS: i64 = 7;

/// 既読通知の保持期間
const READ_RETENTION_DAYS: i64 = 30;

/// ジェネレーター 1 回分の結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratorReport {
    pub created: usize,
    /// 送ったリマインダーメールの件数
    pub emailed: usize,
    pub errors: Vec<String>,
}

impl GeneratorReport {
    fn merge(&mut self, other: GeneratorReport) {
        self.created += other.created;
        self.emailed += other.emailed;
        self.errors.extend(other.errors);
    }

    fn record_error(&mut self, context: &str, err: impl std::fmt::Display) {
        tracing::error!(
            error.category = error::category::INFRASTRUCTURE,
            error.kind = error::kind::DATABASE,
            error = %err,
            context,
            "通知ジェネレーターでエラー"
        );
        self.errors.push(format!("{context}: {err}"));
    }
}

/// 全ジェネレーターと掃除の結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub pending_approvals: GeneratorReport,
    pub training_reminders: GeneratorReport,
    pub certificate_expirations: GeneratorReport,
    pub budget_warnings: GeneratorReport,
    /// 削除した既読通知の件数
    pub cleaned: u64,
    pub cleanup_errors: Vec<String>,
}

impl MaintenanceReport {
    pub fn total(&self) -> GeneratorReport {
        let mut total = GeneratorReport::default();
        for report in [
            &self.pending_approvals,
            &self.training_reminders,
            &self.certificate_expirations,
            &self.budget_warnings,
        ] {
            total.merge(report.clone());
        }
        total.errors.extend(self.cleanup_errors.iter().cloned());
        total
    }
}

/// 期限の近い研修・証明書のリマインダーメール
struct ReminderEmail<'a> {
    recipient_id: &'a UserId,
    category: EmailCategory,
    days_left: i64,
    subject: String,
    training_name: &'a str,
    date: NaiveDate,
    link: &'static str,
}

pub struct NotificationGenerator {
    user_repo: Arc<dyn UserRepository>,
    request_repo: Arc<dyn TrainingRequestRepository>,
    notification_repo: Arc<dyn NotificationRepository>,
    certificate_repo: Arc<dyn CertificateRepository>,
    cost_repo: Arc<dyn CostRepository>,
    budget_repo: Arc<dyn BudgetRepository>,
    email_log_repo: Arc<dyn EmailLogRepository>,
    publisher: Arc<NotificationPublisher>,
    notifier: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
}

impl NotificationGenerator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        request_repo: Arc<dyn TrainingRequestRepository>,
        notification_repo: Arc<dyn NotificationRepository>,
        certificate_repo: Arc<dyn CertificateRepository>,
        cost_repo: Arc<dyn CostRepository>,
        budget_repo: Arc<dyn BudgetRepository>,
        email_log_repo: Arc<dyn EmailLogRepository>,
        publisher: Arc<NotificationPublisher>,
        notifier: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repo,
            request_repo,
            notification_repo,
            certificate_repo,
            cost_repo,
            budget_repo,
            email_log_repo,
            publisher,
            notifier,
            clock,
        }
    }

    /// すべてのジェネレーターを順に実行し、既読の古い通知を削除する
    #[tracing::instrument(skip_all)]
    pub async fn run_all(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport {
            pending_approvals: self.pending_approvals().await,
            training_reminders: self.training_reminders().await,
            certificate_expirations: self.certificate_expirations().await,
            budget_warnings: self.budget_warnings().await,
            cleaned: 0,
            cleanup_errors: Vec::new(),
        };

        let cutoff = self.clock.now() - Duration::days(READ_RETENTION_DAYS);
        match self.notification_repo.delete_read_before(cutoff).await {
            Ok(cleaned) => {
                report.cleaned = cleaned;
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATIONS_CLEANED,
                    event.entity_type = event::entity_type::NOTIFICATION,
                    event.result = event::result::SUCCESS,
                    notification.deleted = cleaned,
                    "既読の古い通知を削除"
                );
            }
            Err(e) => {
                let mut cleanup = GeneratorReport::default();
                cleanup.record_error("cleanup", e);
                report.cleanup_errors = cleanup.errors;
            }
        }

        let total = report.total();
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATIONS_GENERATED,
            event.entity_type = event::entity_type::NOTIFICATION,
            event.result = if total.errors.is_empty() {
                event::result::SUCCESS
            } else {
                event::result::FAILURE
            },
            notification.created = total.created,
            notification.errors = total.errors.len(),
            "通知ジェネレーターを実行"
        );
        report
    }

    /// 部下の申請が判断待ちの supervisor に件数を知らせる
    pub async fn pending_approvals(&self) -> GeneratorReport {
        let mut report = GeneratorReport::default();
        let supervisors = match self.user_repo.find_by_roles(&[UserRole::Supervisor]).await {
            Ok(users) => users,
            Err(e) => {
                report.record_error("pending_approvals", e);
                return report;
            }
        };

        for supervisor in supervisors {
            let supervisee_ids: Vec<UserId> =
                match self.user_repo.find_supervisees(supervisor.id()).await {
                    Ok(users) => users.iter().map(|u| u.id().clone()).collect(),
                    Err(e) => {
                        report.record_error("pending_approvals", e);
                        continue;
                    }
                };
            if supervisee_ids.is_empty() {
                continue;
            }
            let pending = match self
                .request_repo
                .find_by_requesters_and_statuses(
                    &supervisee_ids,
                    &[RequestStatus::Submitted, RequestStatus::SupervisorReview],
                )
                .await
            {
                Ok(requests) => requests.len(),
                Err(e) => {
                    report.record_error("pending_approvals", e);
                    continue;
                }
            };
            if pending == 0 {
                continue;
            }

            let draft = NotificationDraft::pending_approvals(supervisor.id().clone(), pending);
            self.publish_once(&mut report, "pending_approvals", draft, None, Duration::days(1))
                .await;
        }
        report
    }

    /// 7 日以内に研修がある承認済み申請の申請者に知らせる
    ///
    /// メールは申請者の `reminder_days_before` 以内なら送る。
    pub async fn training_reminders(&self) -> GeneratorReport {
        let mut report = GeneratorReport::default();
        let today = self.clock.today();
        let Some(until) = today.checked_add_days(Days::new(email_lookahead_days())) else {
            return report;
        };

        let requests = match self.request_repo.find_approved_catalog_between(today, until).await {
            Ok(requests) => requests,
            Err(e) => {
                report.record_error("training_reminders", e);
                return report;
            }
        };

        for request in requests {
            let date = request.details().training_date();
            let days_left = days_between(today, date);
            if days_left <= REMINDER_WINDOW_DAYS {
                let draft = NotificationDraft::training_reminder(
                    request.requester_id().clone(),
                    request.title(),
                    days_left,
                    date,
                );
                self.publish_once(
                    &mut report,
                    "training_reminders",
                    draft,
                    Some(request.title()),
                    Duration::hours(24),
                )
                .await;
            }

            self.email_reminder(
                &mut report,
                "training_reminders",
                ReminderEmail {
                    recipient_id: request.requester_id(),
                    category: EmailCategory::TrainingReminder,
                    days_left,
                    subject: format!(
                        "Training Reminder: {} on {}",
                        request.title(),
                        email_date(date)
                    ),
                    training_name: request.title(),
                    date,
                    link: "/requests",
                },
            )
            .await;
        }
        report
    }

    /// 期限の近い証明書を知らせ、期限切れの証明書を `expired` にする
    ///
    /// メールは所有者の `cert_expiry_days_before` 以内なら送る。
    pub async fn certificate_expirations(&self) -> GeneratorReport {
        let mut report = GeneratorReport::default();
        let today = self.clock.today();
        let lookahead = email_lookahead_days().max(EXPIRY_WINDOW_DAYS.unsigned_abs());
        let Some(until) = today.checked_add_days(Days::new(lookahead)) else {
            return report;
        };

        let certificates = match self.certificate_repo.find_active_expiring_until(until).await {
            Ok(certificates) => certificates,
            Err(e) => {
                report.record_error("certificate_expirations", e);
                return report;
            }
        };

        for certificate in certificates {
            let check = certificate.check_expiry(today);
            if check == ExpiryCheck::Expired {
                self.expire(&mut report, certificate).await;
                continue;
            }
            let Some(expiration) = certificate.expiration_date() else {
                continue;
            };
            if let ExpiryCheck::ExpiringIn(days) = check {
                let draft = NotificationDraft::certificate_expiring(
                    certificate.user_id().clone(),
                    certificate.training_title(),
                    days,
                    expiration,
                );
                self.publish_once(
                    &mut report,
                    "certificate_expirations",
                    draft,
                    Some(certificate.training_title()),
                    Duration::weeks(1),
                )
                .await;
            }

            self.email_reminder(
                &mut report,
                "certificate_expirations",
                ReminderEmail {
                    recipient_id: certificate.user_id(),
                    category: EmailCategory::CertificateExpiry,
                    days_left: days_between(today, expiration),
                    subject: format!(
                        "Certificate Expiring Soon: {} ({})",
                        certificate.training_title(),
                        email_date(expiration)
                    ),
                    training_name: certificate.training_title(),
                    date: expiration,
                    link: "/certificates",
                },
            )
            .await;
        }
        report
    }

    async fn expire(&self, report: &mut GeneratorReport, certificate: Certificate) {
        let expired = match certificate.mark_expired(self.clock.now()) {
            Ok(expired) => expired,
            Err(e) => {
                report.record_error("certificate_expirations", e);
                return;
            }
        };
        if let Err(e) = self
            .certificate_repo
            .update_status(&expired, CertificateStatus::Active)
            .await
        {
            report.record_error("certificate_expirations", e);
            return;
        }

        log_business_event!(
            event.category = event::category::CERTIFICATE,
            event.action = event::action::CERTIFICATE_EXPIRED,
            event.entity_type = event::entity_type::CERTIFICATE,
            event.entity_id = %expired.id(),
            event.result = event::result::SUCCESS,
            "証明書を期限切れにしました"
        );

        let draft =
            NotificationDraft::certificate_expired(expired.user_id().clone(), expired.training_title());
        match self.publisher.try_publish(draft).await {
            Ok(_) => report.created += 1,
            Err(e) => report.record_error("certificate_expirations", e),
        }
    }

    /// 最新年度の予算消化率がしきい値を超えていれば会計担当に知らせる
    pub async fn budget_warnings(&self) -> GeneratorReport {
        let mut report = GeneratorReport::default();
        let status = match self.budget_status().await {
            Ok(Some(status)) => status,
            Ok(None) => return report,
            Err(e) => {
                report.record_error("budget_warnings", e);
                return report;
            }
        };
        if status.threshold.is_none() {
            return report;
        }

        let accountants = match self.user_repo.find_by_roles(&[UserRole::Accounting]).await {
            Ok(users) => users,
            Err(e) => {
                report.record_error("budget_warnings", e);
                return report;
            }
        };
        for accountant in accountants {
            if let Some(draft) = status.warning_for(accountant.id().clone()) {
                self.publish_once(&mut report, "budget_warnings", draft, None, Duration::days(1))
                    .await;
            }
        }
        report
    }

    async fn budget_status(&self) -> Result<Option<BudgetStatus>, trainflow_infra::InfraError> {
        let Some(fiscal_year) = self.cost_repo.latest_fiscal_year().await? else {
            return Ok(None);
        };
        let total_budget = self
            .budget_repo
            .find(&fiscal_year)
            .await?
            .map_or(DEFAULT_TOTAL_BUDGET, |settings| settings.total_budget);
        let spent = self.cost_repo.total_for_fiscal_year(&fiscal_year).await?;
        Ok(Some(BudgetStatus::compute(fiscal_year, total_budget, spent)))
    }

    /// 受信者の設定した日数以内で、同じ件名をまだ送っていなければメールを送る
    async fn email_reminder(
        &self,
        report: &mut GeneratorReport,
        context: &str,
        reminder: ReminderEmail<'_>,
    ) {
        let preferences = self.notifier.preferences_for(reminder.recipient_id).await;
        if !preferences.wants_reminder(reminder.category, reminder.days_left) {
            return;
        }
        let recipient = match self.user_repo.find_by_id(reminder.recipient_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                report.record_error(context, e);
                return;
            }
        };

        let to = recipient.email().as_str().to_string();
        let since = self.clock.now() - Duration::days(i64::from(MAX_DAYS_BEFORE));
        match self.email_log_repo.sent_since(&to, &reminder.subject, since).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                report.record_error(context, e);
                return;
            }
        }

        let fields = EmailFields {
            to,
            subject: reminder.subject,
            officer_name: recipient.full_name(),
            training_name: reminder.training_name.to_string(),
            recipient_name: Some(recipient.full_name()),
            training_date: Some(email_date(reminder.date)),
            notes: Some(format!("{} day(s) remaining.", reminder.days_left)),
            system_link: Some(format!("{}{}", self.notifier.base_url(), reminder.link)),
            ..Default::default()
        };
        match self
            .notifier
            .send(EmailTemplateKind::Notification, &fields, None)
            .await
        {
            Ok(()) => report.emailed += 1,
            Err(e) => report.record_error(context, e),
        }
    }

    /// `window` 以内に同じ件名（と本文の一部）の通知がなければ作る
    async fn publish_once(
        &self,
        report: &mut GeneratorReport,
        context: &str,
        draft: NotificationDraft,
        message_contains: Option<&str>,
        window: Duration,
    ) {
        let title_key = dedup_title(&draft.title);
        let filter = RecentNotificationFilter {
            user_id: &draft.user_id,
            title_contains: title_key,
            message_contains,
            since: self.clock.now() - window,
        };
        match self.notification_repo.exists_since(filter).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                report.record_error(context, e);
                return;
            }
        }

        match self.publisher.try_publish(draft).await {
            Ok(_) => report.created += 1,
            Err(e) => report.record_error(context, e),
        }
    }
}

/// 件名の接頭辞（`URGENT: ` など）を除いた照合キー
fn dedup_title(title: &str) -> &str {
    title.rsplit_once(": ").map_or(title, |(_, rest)| rest)
}

/// メールの日数設定の上限まで先を見る
fn email_lookahead_days() -> u64 {
    u64::from(MAX_DAYS_BEFORE.unsigned_abs())
}

fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
