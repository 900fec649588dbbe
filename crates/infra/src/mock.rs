//! # テスト用モック
//!
//! ユースケーステストで使用するインメモリのリポジトリ・送信者・セッション管理。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! trainflow-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! 条件付き更新は PostgreSQL 実装と同じく、保存済みの状態が期待値と異なれば
//! `InfraError::Conflict` を返す。

use std::{
   collections::HashMap,
   sync::{
      Arc,
      Mutex,
      atomic::{AtomicBool, Ordering},
   },
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use trainflow_domain::{
   accounting::{
      BudgetSettings,
      CostId,
      InvoiceId,
      InvoiceStatus,
      Invoice,
      OfficerTrainingCost,
      PaymentBatch,
      PaymentBatchId,
      PaymentBatchStatus,
      PaymentStatus,
   },
   certificate::{Certificate, CertificateId, CertificateStatus},
   custom_request::{CustomRequestStatus, CustomTrainingRequest, CustomTrainingRequestId},
   document::{Document, DocumentId},
   notification::{
      EmailLog,
      EmailLogStatus,
      EmailMessage,
      Notification,
      NotificationError,
      NotificationId,
   },
   password::{PasswordHash, PasswordVerifyResult, PlainPassword},
   preferences::EmailPreferences,
   request::{RequestKind, RequestStatus, TrainingRequest, TrainingRequestId},
   training::{TrainingId, TrainingOpportunity},
   user::{BadgeNumber, User, UserId, UserRole},
   value_objects::{FiscalYear, Money},
};
use uuid::Uuid;

use crate::{
   error::InfraError,
   notification::NotificationSender,
   password::PasswordChecker,
   repository::{
      BudgetRepository,
      CertificateRepository,
      CostRepository,
      CustomTrainingRequestRepository,
      DocumentRepository,
      EmailLogRepository,
      EmailPreferencesRepository,
      InvoiceRepository,
      NotificationRepository,
      PaymentBatchRepository,
      RecentNotificationFilter,
      TrainingRepository,
      TrainingRequestRepository,
      UserRepository,
   },
   session::{SessionData, SessionManager},
};

fn conflict(entity: &str, id: &Uuid) -> InfraError {
   InfraError::conflict(entity, id.to_string())
}

// ===== MockUserRepository =====

#[derive(Clone, Default)]
pub struct MockUserRepository {
   users: Arc<Mutex<Vec<(User, PasswordHash)>>>,
}

impl MockUserRepository {
   pub fn new() -> Self {
      Self::default()
   }

   /// パスワードハッシュは [`MockPasswordChecker`] で `"password123"` を検証できる値になる
   pub fn add_user(&self, user: User) {
      self.add_user_with_hash(user, MockPasswordChecker::hash_of("password123"));
   }

   pub fn add_user_with_hash(&self, user: User, hash: PasswordHash) {
      self.users.lock().unwrap().push((user, hash));
   }

   pub fn users(&self) -> Vec<User> {
      self.users.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
   }
}

#[async_trait]
impl UserRepository for MockUserRepository {
   async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError> {
      Ok(self
         .users
         .lock()
         .unwrap()
         .iter()
         .find(|(u, _)| u.id() == id)
         .map(|(u, _)| u.clone()))
   }

   async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, InfraError> {
      Ok(self
         .users
         .lock()
         .unwrap()
         .iter()
         .filter(|(u, _)| ids.contains(u.id()))
         .map(|(u, _)| u.clone())
         .collect())
   }

   async fn find_credentials_by_badge(
      &self,
      badge_number: &BadgeNumber,
   ) -> Result<Option<(User, PasswordHash)>, InfraError> {
      Ok(self
         .users
         .lock()
         .unwrap()
         .iter()
         .find(|(u, _)| u.badge_number() == badge_number)
         .cloned())
   }

   async fn find_all(&self) -> Result<Vec<User>, InfraError> {
      let mut users = self.users();
      users.sort_by(|a, b| {
         (a.last_name().as_str(), a.first_name().as_str())
            .cmp(&(b.last_name().as_str(), b.first_name().as_str()))
      });
      Ok(users)
   }

   async fn find_by_roles(&self, roles: &[UserRole]) -> Result<Vec<User>, InfraError> {
      Ok(self
         .users()
         .into_iter()
         .filter(|u| roles.contains(&u.role()))
         .collect())
   }

   async fn find_supervisees(&self, supervisor_id: &UserId) -> Result<Vec<User>, InfraError> {
      Ok(self
         .users()
         .into_iter()
         .filter(|u| u.supervisor_id() == Some(supervisor_id))
         .collect())
   }

   async fn insert(&self, user: &User, password_hash: &PasswordHash) -> Result<(), InfraError> {
      let mut users = self.users.lock().unwrap();
      if users
         .iter()
         .any(|(u, _)| u.badge_number() == user.badge_number() || u.email() == user.email())
      {
         return Err(conflict("User", user.id().as_uuid()));
      }
      users.push((user.clone(), password_hash.clone()));
      Ok(())
   }

   async fn update_profile(&self, user: &User) -> Result<(), InfraError> {
      let mut users = self.users.lock().unwrap();
      if let Some(entry) = users.iter_mut().find(|(u, _)| u.id() == user.id()) {
         entry.0 = user.clone();
      }
      Ok(())
   }
}

// ===== MockTrainingRepository =====

#[derive(Clone, Default)]
pub struct MockTrainingRepository {
   trainings: Arc<Mutex<Vec<TrainingOpportunity>>>,
}

impl MockTrainingRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn add_training(&self, training: TrainingOpportunity) {
      self.trainings.lock().unwrap().push(training);
   }
}

#[async_trait]
impl TrainingRepository for MockTrainingRepository {
   async fn find_all(&self) -> Result<Vec<TrainingOpportunity>, InfraError> {
      let mut trainings = self.trainings.lock().unwrap().clone();
      trainings.sort_by(|a, b| (a.date, &a.title).cmp(&(b.date, &b.title)));
      Ok(trainings)
   }

   async fn find_by_id(&self, id: &TrainingId) -> Result<Option<TrainingOpportunity>, InfraError> {
      Ok(self
         .trainings
         .lock()
         .unwrap()
         .iter()
         .find(|t| &t.id == id)
         .cloned())
   }
}

// ===== MockTrainingRequestRepository =====

#[derive(Clone, Default)]
pub struct MockTrainingRequestRepository {
   requests: Arc<Mutex<Vec<TrainingRequest>>>,
}

impl MockTrainingRequestRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn requests(&self) -> Vec<TrainingRequest> {
      self.requests.lock().unwrap().clone()
   }

   fn filtered(&self, predicate: impl Fn(&TrainingRequest) -> bool) -> Vec<TrainingRequest> {
      self.requests
         .lock()
         .unwrap()
         .iter()
         .filter(|r| predicate(r))
         .cloned()
         .collect()
   }
}

#[async_trait]
impl TrainingRequestRepository for MockTrainingRequestRepository {
   async fn insert(&self, request: &TrainingRequest) -> Result<(), InfraError> {
      self.requests.lock().unwrap().push(request.clone());
      Ok(())
   }

   async fn update_with_status_check(
      &self,
      request: &TrainingRequest,
      expected_status: RequestStatus,
   ) -> Result<(), InfraError> {
      let mut requests = self.requests.lock().unwrap();
      let Some(pos) = requests.iter().position(|r| r.id() == request.id()) else {
         return Err(conflict("TrainingRequest", request.id().as_uuid()));
      };
      if requests[pos].status() != expected_status {
         return Err(conflict("TrainingRequest", request.id().as_uuid()));
      }
      requests[pos] = request.clone();
      Ok(())
   }

   async fn find_by_id(
      &self,
      id: &TrainingRequestId,
   ) -> Result<Option<TrainingRequest>, InfraError> {
      Ok(self.filtered(|r| r.id() == id).into_iter().next())
   }

   async fn find_by_requester(
      &self,
      requester_id: &UserId,
   ) -> Result<Vec<TrainingRequest>, InfraError> {
      let mut requests = self.filtered(|r| r.requester_id() == requester_id);
      requests.sort_by_key(|r| std::cmp::Reverse(r.created_at()));
      Ok(requests)
   }

   async fn find_by_requesters_and_statuses(
      &self,
      requester_ids: &[UserId],
      statuses: &[RequestStatus],
   ) -> Result<Vec<TrainingRequest>, InfraError> {
      let mut requests = self.filtered(|r| {
         requester_ids.contains(r.requester_id()) && statuses.contains(&r.status())
      });
      requests.sort_by_key(|r| std::cmp::Reverse(r.created_at()));
      Ok(requests)
   }

   async fn find_by_statuses(
      &self,
      statuses: &[RequestStatus],
   ) -> Result<Vec<TrainingRequest>, InfraError> {
      let mut requests = self.filtered(|r| statuses.contains(&r.status()));
      requests.sort_by_key(|r| r.created_at());
      Ok(requests)
   }

   async fn find_approved_catalog_between(
      &self,
      from: NaiveDate,
      to: NaiveDate,
   ) -> Result<Vec<TrainingRequest>, InfraError> {
      let mut requests = self.filtered(|r| {
         let date = r.details().training_date();
         r.status() == RequestStatus::Approved
            && r.details().kind() == RequestKind::Catalog
            && (from..=to).contains(&date)
      });
      requests.sort_by_key(|r| r.details().training_date());
      Ok(requests)
   }
}

// ===== MockCustomTrainingRequestRepository =====

#[derive(Clone, Default)]
pub struct MockCustomTrainingRequestRepository {
   requests: Arc<Mutex<Vec<CustomTrainingRequest>>>,
}

impl MockCustomTrainingRequestRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn requests(&self) -> Vec<CustomTrainingRequest> {
      self.requests.lock().unwrap().clone()
   }
}

#[async_trait]
impl CustomTrainingRequestRepository for MockCustomTrainingRequestRepository {
   async fn insert(&self, request: &CustomTrainingRequest) -> Result<(), InfraError> {
      self.requests.lock().unwrap().push(request.clone());
      Ok(())
   }

   async fn update_with_status_check(
      &self,
      request: &CustomTrainingRequest,
      expected_status: CustomRequestStatus,
      expected_level: usize,
   ) -> Result<(), InfraError> {
      let mut requests = self.requests.lock().unwrap();
      let Some(pos) = requests.iter().position(|r| r.id() == request.id()) else {
         return Err(conflict("CustomTrainingRequest", request.id().as_uuid()));
      };
      let stored = &requests[pos];
      if stored.status() != expected_status || stored.current_level() != expected_level {
         return Err(conflict("CustomTrainingRequest", request.id().as_uuid()));
      }
      requests[pos] = request.clone();
      Ok(())
   }

   async fn find_by_id(
      &self,
      id: &CustomTrainingRequestId,
   ) -> Result<Option<CustomTrainingRequest>, InfraError> {
      Ok(self
         .requests
         .lock()
         .unwrap()
         .iter()
         .find(|r| r.id() == id)
         .cloned())
   }

   async fn find_by_requester(
      &self,
      requester_id: &UserId,
   ) -> Result<Vec<CustomTrainingRequest>, InfraError> {
      let mut requests: Vec<_> = self
         .requests()
         .into_iter()
         .filter(|r| r.requester_id() == requester_id)
         .collect();
      requests.sort_by_key(|r| std::cmp::Reverse(r.created_at()));
      Ok(requests)
   }

   async fn find_by_statuses(
      &self,
      statuses: &[CustomRequestStatus],
   ) -> Result<Vec<CustomTrainingRequest>, InfraError> {
      let mut requests: Vec<_> = self
         .requests()
         .into_iter()
         .filter(|r| statuses.contains(&r.status()))
         .collect();
      requests.sort_by_key(|r| r.created_at());
      Ok(requests)
   }
}

// ===== MockNotificationRepository =====

/// `fail_inserts()` / `fail_updates()` で以後の書き込みを失敗させられる
#[derive(Clone, Default)]
pub struct MockNotificationRepository {
   notifications: Arc<Mutex<Vec<Notification>>>,
   fail_inserts: Arc<AtomicBool>,
   fail_updates: Arc<AtomicBool>,
}

impl MockNotificationRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn notifications(&self) -> Vec<Notification> {
      self.notifications.lock().unwrap().clone()
   }

   pub fn fail_inserts(&self) {
      self.fail_inserts.store(true, Ordering::SeqCst);
   }

   pub fn fail_updates(&self) {
      self.fail_updates.store(true, Ordering::SeqCst);
   }

   fn check_update(&self) -> Result<(), InfraError> {
      if self.fail_updates.load(Ordering::SeqCst) {
         return Err(InfraError::unexpected("notification update failed"));
      }
      Ok(())
   }
}

#[async_trait]
impl NotificationRepository for MockNotificationRepository {
   async fn insert(&self, notification: &Notification) -> Result<(), InfraError> {
      if self.fail_inserts.load(Ordering::SeqCst) {
         return Err(InfraError::unexpected("notification insert failed"));
      }
      self.notifications.lock().unwrap().push(notification.clone());
      Ok(())
   }

   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Notification>, InfraError> {
      let mut notifications: Vec<_> = self
         .notifications()
         .into_iter()
         .filter(|n| n.user_id() == user_id)
         .collect();
      notifications.sort_by_key(|n| std::cmp::Reverse(n.created_at()));
      Ok(notifications)
   }

   async fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, InfraError> {
      Ok(self
         .notifications
         .lock()
         .unwrap()
         .iter()
         .find(|n| n.id() == id)
         .cloned())
   }

   async fn mark_read(&self, id: &NotificationId, user_id: &UserId) -> Result<bool, InfraError> {
      self.check_update()?;
      let mut notifications = self.notifications.lock().unwrap();
      let Some(pos) = notifications
         .iter()
         .position(|n| n.id() == id && n.user_id() == user_id)
      else {
         return Ok(false);
      };
      notifications[pos] = notifications[pos].clone().mark_read();
      Ok(true)
   }

   async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, InfraError> {
      self.check_update()?;
      let mut notifications = self.notifications.lock().unwrap();
      let mut count = 0;
      for n in notifications.iter_mut() {
         if n.user_id() == user_id && !n.is_read() {
            *n = n.clone().mark_read();
            count += 1;
         }
      }
      Ok(count)
   }

   async fn exists_since(&self, filter: RecentNotificationFilter<'_>) -> Result<bool, InfraError> {
      Ok(self.notifications.lock().unwrap().iter().any(|n| {
         n.user_id() == filter.user_id
            && n.title().contains(filter.title_contains)
            && filter
               .message_contains
               .is_none_or(|needle| n.message().contains(needle))
            && n.created_at() >= filter.since
      }))
   }

   async fn delete_read_before(&self, before: DateTime<Utc>) -> Result<u64, InfraError> {
      let mut notifications = self.notifications.lock().unwrap();
      let len = notifications.len();
      notifications.retain(|n| !(n.is_read() && n.created_at() < before));
      Ok((len - notifications.len()) as u64)
   }
}

// ===== MockEmailPreferencesRepository =====

#[derive(Clone, Default)]
pub struct MockEmailPreferencesRepository {
   preferences: Arc<Mutex<Vec<EmailPreferences>>>,
}

impl MockEmailPreferencesRepository {
   pub fn new() -> Self {
      Self::default()
   }
}

#[async_trait]
impl EmailPreferencesRepository for MockEmailPreferencesRepository {
   async fn find_by_user(&self, user_id: &UserId) -> Result<Option<EmailPreferences>, InfraError> {
      Ok(self
         .preferences
         .lock()
         .unwrap()
         .iter()
         .find(|p| &p.user_id == user_id)
         .cloned())
   }

   async fn upsert(&self, preferences: &EmailPreferences) -> Result<(), InfraError> {
      let mut stored = self.preferences.lock().unwrap();
      stored.retain(|p| p.user_id != preferences.user_id);
      stored.push(preferences.clone());
      Ok(())
   }
}

// ===== MockEmailLogRepository =====

#[derive(Clone, Default)]
pub struct MockEmailLogRepository {
   logs: Arc<Mutex<Vec<EmailLog>>>,
}

impl MockEmailLogRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn logs(&self) -> Vec<EmailLog> {
      self.logs.lock().unwrap().clone()
   }
}

#[async_trait]
impl EmailLogRepository for MockEmailLogRepository {
   async fn insert(&self, log: &EmailLog) -> Result<(), InfraError> {
      self.logs.lock().unwrap().push(log.clone());
      Ok(())
   }

   async fn sent_since(
      &self,
      recipient: &str,
      subject: &str,
      since: DateTime<Utc>,
   ) -> Result<bool, InfraError> {
      Ok(self.logs.lock().unwrap().iter().any(|log| {
         log.recipient == recipient
            && log.subject == subject
            && log.status == EmailLogStatus::Sent
            && log.created_at >= since
      }))
   }
}

// ===== MockCertificateRepository =====

#[derive(Clone, Default)]
pub struct MockCertificateRepository {
   certificates: Arc<Mutex<Vec<Certificate>>>,
}

impl MockCertificateRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn certificates(&self) -> Vec<Certificate> {
      self.certificates.lock().unwrap().clone()
   }
}

#[async_trait]
impl CertificateRepository for MockCertificateRepository {
   async fn insert(&self, certificate: &Certificate) -> Result<(), InfraError> {
      let mut certificates = self.certificates.lock().unwrap();
      if certificates
         .iter()
         .any(|c| c.certificate_number() == certificate.certificate_number())
      {
         return Err(conflict("Certificate", certificate.id().as_uuid()));
      }
      certificates.push(certificate.clone());
      Ok(())
   }

   async fn find_by_id(&self, id: &CertificateId) -> Result<Option<Certificate>, InfraError> {
      Ok(self
         .certificates
         .lock()
         .unwrap()
         .iter()
         .find(|c| c.id() == id)
         .cloned())
   }

   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Certificate>, InfraError> {
      let mut certificates: Vec<_> = self
         .certificates()
         .into_iter()
         .filter(|c| c.user_id() == user_id)
         .collect();
      certificates.sort_by_key(|c| std::cmp::Reverse(c.completion_date()));
      Ok(certificates)
   }

   async fn find_active_expiring_until(
      &self,
      until: NaiveDate,
   ) -> Result<Vec<Certificate>, InfraError> {
      let mut certificates: Vec<_> = self
         .certificates()
         .into_iter()
         .filter(|c| {
            c.status() == CertificateStatus::Active
               && c.expiration_date().is_some_and(|date| date <= until)
         })
         .collect();
      certificates.sort_by_key(|c| c.expiration_date());
      Ok(certificates)
   }

   async fn update_status(
      &self,
      certificate: &Certificate,
      expected_status: CertificateStatus,
   ) -> Result<(), InfraError> {
      let mut certificates = self.certificates.lock().unwrap();
      match certificates.iter().position(|c| c.id() == certificate.id()) {
         Some(pos) if certificates[pos].status() == expected_status => {
            certificates[pos] = certificate.clone();
            Ok(())
         }
         _ => Err(conflict("Certificate", certificate.id().as_uuid())),
      }
   }
}

// ===== MockDocumentRepository =====

#[derive(Clone, Default)]
pub struct MockDocumentRepository {
   documents: Arc<Mutex<Vec<Document>>>,
}

impl MockDocumentRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn documents(&self) -> Vec<Document> {
      self.documents.lock().unwrap().clone()
   }
}

#[async_trait]
impl DocumentRepository for MockDocumentRepository {
   async fn insert(&self, document: &Document) -> Result<(), InfraError> {
      self.documents.lock().unwrap().push(document.clone());
      Ok(())
   }

   async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, InfraError> {
      Ok(self
         .documents
         .lock()
         .unwrap()
         .iter()
         .find(|d| d.id() == id)
         .cloned())
   }

   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Document>, InfraError> {
      let mut documents: Vec<_> = self
         .documents()
         .into_iter()
         .filter(|d| d.user_id() == user_id)
         .collect();
      documents.sort_by_key(|d| std::cmp::Reverse(d.created_at()));
      Ok(documents)
   }

   async fn find_unverified(&self) -> Result<Vec<Document>, InfraError> {
      let mut documents: Vec<_> = self
         .documents()
         .into_iter()
         .filter(|d| !d.is_verified())
         .collect();
      documents.sort_by_key(|d| d.created_at());
      Ok(documents)
   }

   async fn mark_verified(&self, document: &Document) -> Result<(), InfraError> {
      let mut documents = self.documents.lock().unwrap();
      match documents.iter().position(|d| d.id() == document.id()) {
         Some(pos) if !documents[pos].is_verified() => {
            documents[pos] = document.clone();
            Ok(())
         }
         _ => Err(conflict("Document", document.id().as_uuid())),
      }
   }
}

// ===== MockCostRepository =====

#[derive(Clone, Default)]
pub struct MockCostRepository {
   costs: Arc<Mutex<Vec<OfficerTrainingCost>>>,
}

impl MockCostRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn costs(&self) -> Vec<OfficerTrainingCost> {
      self.costs.lock().unwrap().clone()
   }
}

#[async_trait]
impl CostRepository for MockCostRepository {
   async fn insert(&self, cost: &OfficerTrainingCost) -> Result<(), InfraError> {
      self.costs.lock().unwrap().push(cost.clone());
      Ok(())
   }

   async fn find_by_id(&self, id: &CostId) -> Result<Option<OfficerTrainingCost>, InfraError> {
      Ok(self.costs.lock().unwrap().iter().find(|c| &c.id == id).cloned())
   }

   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<OfficerTrainingCost>, InfraError> {
      let mut costs: Vec<_> = self
         .costs()
         .into_iter()
         .filter(|c| &c.user_id == user_id)
         .collect();
      costs.sort_by_key(|c| std::cmp::Reverse(c.created_at));
      Ok(costs)
   }

   async fn find_all(&self) -> Result<Vec<OfficerTrainingCost>, InfraError> {
      let mut costs = self.costs();
      costs.sort_by_key(|c| std::cmp::Reverse(c.created_at));
      Ok(costs)
   }

   async fn update_payment_status(
      &self,
      cost: &OfficerTrainingCost,
      expected_status: PaymentStatus,
   ) -> Result<(), InfraError> {
      let mut costs = self.costs.lock().unwrap();
      match costs.iter().position(|c| c.id == cost.id) {
         Some(pos) if costs[pos].payment_status == expected_status => {
            costs[pos] = cost.clone();
            Ok(())
         }
         _ => Err(conflict("OfficerTrainingCost", cost.id.as_uuid())),
      }
   }

   async fn total_for_fiscal_year(&self, fiscal_year: &FiscalYear) -> Result<Money, InfraError> {
      Ok(self
         .costs
         .lock()
         .unwrap()
         .iter()
         .filter(|c| &c.fiscal_year == fiscal_year && c.payment_status != PaymentStatus::Rejected)
         .map(|c| c.amount)
         .sum())
   }

   async fn latest_fiscal_year(&self) -> Result<Option<FiscalYear>, InfraError> {
      Ok(self
         .costs
         .lock()
         .unwrap()
         .iter()
         .map(|c| c.fiscal_year.clone())
         .max_by(|a, b| a.as_str().cmp(b.as_str())))
   }
}

// ===== MockBudgetRepository =====

#[derive(Clone, Default)]
pub struct MockBudgetRepository {
   settings: Arc<Mutex<Vec<BudgetSettings>>>,
}

impl MockBudgetRepository {
   pub fn new() -> Self {
      Self::default()
   }
}

#[async_trait]
impl BudgetRepository for MockBudgetRepository {
   async fn find(&self, fiscal_year: &FiscalYear) -> Result<Option<BudgetSettings>, InfraError> {
      Ok(self
         .settings
         .lock()
         .unwrap()
         .iter()
         .find(|s| &s.fiscal_year == fiscal_year)
         .cloned())
   }

   async fn upsert(&self, settings: &BudgetSettings) -> Result<(), InfraError> {
      let mut stored = self.settings.lock().unwrap();
      stored.retain(|s| s.fiscal_year != settings.fiscal_year);
      stored.push(settings.clone());
      Ok(())
   }
}

// ===== MockInvoiceRepository / MockPaymentBatchRepository =====

#[derive(Clone, Default)]
pub struct MockInvoiceRepository {
   invoices: Arc<Mutex<Vec<Invoice>>>,
}

impl MockInvoiceRepository {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn invoices(&self) -> Vec<Invoice> {
      self.invoices.lock().unwrap().clone()
   }
}

#[async_trait]
impl InvoiceRepository for MockInvoiceRepository {
   async fn insert(&self, invoice: &Invoice) -> Result<(), InfraError> {
      let mut invoices = self.invoices.lock().unwrap();
      if invoices.iter().any(|i| i.invoice_number == invoice.invoice_number) {
         return Err(conflict("Invoice", invoice.id.as_uuid()));
      }
      invoices.push(invoice.clone());
      Ok(())
   }

   async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, InfraError> {
      Ok(self.invoices.lock().unwrap().iter().find(|i| &i.id == id).cloned())
   }

   async fn find_by_ids(&self, ids: &[InvoiceId]) -> Result<Vec<Invoice>, InfraError> {
      let mut invoices: Vec<_> = self
         .invoices()
         .into_iter()
         .filter(|i| ids.contains(&i.id))
         .collect();
      invoices.sort_by_key(|i| i.invoice_date);
      Ok(invoices)
   }

   async fn find_all(&self) -> Result<Vec<Invoice>, InfraError> {
      let mut invoices = self.invoices();
      invoices.sort_by(|a, b| {
         b.invoice_date
            .cmp(&a.invoice_date)
            .then_with(|| a.invoice_number.cmp(&b.invoice_number))
      });
      Ok(invoices)
   }

   async fn update_status(
      &self,
      invoice: &Invoice,
      expected_status: InvoiceStatus,
   ) -> Result<(), InfraError> {
      let mut invoices = self.invoices.lock().unwrap();
      match invoices.iter().position(|i| i.id == invoice.id) {
         Some(pos) if invoices[pos].status == expected_status => {
            invoices[pos] = invoice.clone();
            Ok(())
         }
         _ => Err(conflict("Invoice", invoice.id.as_uuid())),
      }
   }
}

/// 請求書の紐付けは共有する [`MockInvoiceRepository`] に書き込む
#[derive(Clone, Default)]
pub struct MockPaymentBatchRepository {
   batches: Arc<Mutex<Vec<PaymentBatch>>>,
   invoices: MockInvoiceRepository,
}

impl MockPaymentBatchRepository {
   pub fn new(invoices: MockInvoiceRepository) -> Self {
      Self {
         batches: Arc::new(Mutex::new(Vec::new())),
         invoices,
      }
   }

   pub fn batches(&self) -> Vec<PaymentBatch> {
      self.batches.lock().unwrap().clone()
   }
}

#[async_trait]
impl PaymentBatchRepository for MockPaymentBatchRepository {
   async fn insert_with_invoices(
      &self,
      batch: &PaymentBatch,
      invoice_ids: &[InvoiceId],
   ) -> Result<(), InfraError> {
      let mut invoices = self.invoices.invoices.lock().unwrap();
      let claimable = invoices
         .iter()
         .filter(|i| invoice_ids.contains(&i.id) && i.is_batchable())
         .count();
      if claimable != invoice_ids.len() {
         return Err(conflict("PaymentBatch", batch.id.as_uuid()));
      }
      for invoice in invoices.iter_mut().filter(|i| invoice_ids.contains(&i.id)) {
         invoice.batch_id = Some(batch.id.clone());
         invoice.updated_at = batch.created_at;
      }
      self.batches.lock().unwrap().push(batch.clone());
      Ok(())
   }

   async fn find_by_id(&self, id: &PaymentBatchId) -> Result<Option<PaymentBatch>, InfraError> {
      Ok(self.batches.lock().unwrap().iter().find(|b| &b.id == id).cloned())
   }

   async fn find_all(&self) -> Result<Vec<PaymentBatch>, InfraError> {
      let mut batches = self.batches();
      batches.sort_by(|a, b| {
         b.batch_date
            .cmp(&a.batch_date)
            .then_with(|| a.batch_number.cmp(&b.batch_number))
      });
      Ok(batches)
   }

   async fn update_status(
      &self,
      batch: &PaymentBatch,
      expected_status: PaymentBatchStatus,
   ) -> Result<(), InfraError> {
      let mut batches = self.batches.lock().unwrap();
      match batches.iter().position(|b| b.id == batch.id) {
         Some(pos) if batches[pos].status == expected_status => {
            batches[pos] = batch.clone();
            Ok(())
         }
         _ => Err(conflict("PaymentBatch", batch.id.as_uuid())),
      }
   }
}

// ===== MockNotificationSender =====

/// 送信したメールを記録する。`failing()` で作ると常に送信に失敗する
#[derive(Clone, Default)]
pub struct MockNotificationSender {
   sent: Arc<Mutex<Vec<EmailMessage>>>,
   fail: bool,
}

impl MockNotificationSender {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn failing() -> Self {
      Self {
         sent: Arc::new(Mutex::new(Vec::new())),
         fail: true,
      }
   }

   pub fn sent_emails(&self) -> Vec<EmailMessage> {
      self.sent.lock().unwrap().clone()
   }
}

#[async_trait]
impl NotificationSender for MockNotificationSender {
   async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
      if self.fail {
         return Err(NotificationError::SendFailed(format!(
            "mock sender rejected {}",
            email.to
         )));
      }
      self.sent.lock().unwrap().push(email.clone());
      Ok(())
   }
}

// ===== MockSessionManager =====

#[derive(Clone, Default)]
pub struct MockSessionManager {
   sessions: Arc<Mutex<HashMap<String, SessionData>>>,
}

impl MockSessionManager {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn session_count(&self) -> usize {
      self.sessions.lock().unwrap().len()
   }
}

#[async_trait]
impl SessionManager for MockSessionManager {
   async fn create(&self, data: &SessionData) -> Result<String, InfraError> {
      let session_id = Uuid::new_v4().to_string();
      self.sessions
         .lock()
         .unwrap()
         .insert(session_id.clone(), data.clone());
      Ok(session_id)
   }

   async fn get(
      &self,
      session_id: &str,
      now: DateTime<Utc>,
   ) -> Result<Option<SessionData>, InfraError> {
      let mut sessions = self.sessions.lock().unwrap();
      let Some(data) = sessions.get(session_id).cloned() else {
         return Ok(None);
      };
      let touched = data.touched(now);
      sessions.insert(session_id.to_string(), touched.clone());
      Ok(Some(touched))
   }

   async fn delete(&self, session_id: &str) -> Result<(), InfraError> {
      self.sessions.lock().unwrap().remove(session_id);
      Ok(())
   }

   async fn ping(&self) -> Result<(), InfraError> {
      Ok(())
   }
}

// ===== MockPasswordChecker =====

/// Argon2 を使わない高速なパスワードチェッカー
///
/// ハッシュは `"mock$"` と平文を連結した文字列になる。
#[derive(Clone, Copy, Default)]
pub struct MockPasswordChecker;

impl MockPasswordChecker {
   pub fn hash_of(plain: &str) -> PasswordHash {
      PasswordHash::new(format!("mock${plain}"))
   }
}

impl PasswordChecker for MockPasswordChecker {
   fn verify(
      &self,
      password: &PlainPassword,
      hash: &PasswordHash,
   ) -> Result<PasswordVerifyResult, InfraError> {
      Ok(PasswordVerifyResult::from(
         Self::hash_of(password.as_str()) == *hash,
      ))
   }

   fn hash(&self, password: &PlainPassword) -> Result<PasswordHash, InfraError> {
      Ok(Self::hash_of(password.as_str()))
   }
}
