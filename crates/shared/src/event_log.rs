//! # ビジネスイベントログ
//!
//! 申請の状態遷移や通知送信などの業務イベントを、`jq` で抽出しやすい
//! 構造化ログとして出力する。
//!
//! [`log_business_event!`] は `event.kind = "business_event"` を自動付与するので、
//! `jq 'select(.["event.kind"] == "business_event")'` で絞り込める。
//!
//! フィールドはドット記法（`event.category`、`error.kind`）で、JSON 出力では
//! フラットなキーになる。

/// ビジネスイベントを INFO で出力する
///
/// 慣例として `event.category` / `event.action` / `event.result` を必ず付け、
/// 対象があれば `event.entity_type` / `event.entity_id` / `event.actor_id` を付ける。
///
/// ```ignore
/// log_business_event!(
///     event.category = event::category::REQUEST,
///     event.action = event::action::REQUEST_SUBMITTED,
///     event.entity_type = event::entity_type::TRAINING_REQUEST,
///     event.entity_id = %request_id,
///     event.actor_id = %user_id,
///     event.result = event::result::SUCCESS,
///     "研修申請を受け付けました"
/// );
/// ```
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    pub mod category {
        pub const REQUEST: &str = "request";
        pub const CUSTOM_REQUEST: &str = "custom_request";
        pub const NOTIFICATION: &str = "notification";
        pub const EMAIL: &str = "email";
        pub const AUTH: &str = "auth";
        pub const ACCOUNTING: &str = "accounting";
        pub const CERTIFICATE: &str = "certificate";
        pub const DOCUMENT: &str = "document";
    }

    pub mod action {
        // 研修申請
        pub const REQUEST_SUBMITTED: &str = "request.submitted";
        pub const REQUEST_ADVANCED: &str = "request.advanced";
        pub const REQUEST_APPROVED: &str = "request.approved";
        pub const REQUEST_DENIED: &str = "request.denied";

        // カスタム研修申請
        pub const CUSTOM_REQUEST_SUBMITTED: &str = "custom_request.submitted";
        pub const CUSTOM_REQUEST_FORWARDED: &str = "custom_request.forwarded";
        pub const CUSTOM_REQUEST_APPROVED: &str = "custom_request.approved";
        pub const CUSTOM_REQUEST_DENIED: &str = "custom_request.denied";

        // アプリ内通知
        pub const NOTIFICATION_CREATED: &str = "notification.created";
        pub const NOTIFICATION_READ: &str = "notification.read";
        pub const NOTIFICATIONS_GENERATED: &str = "notification.generated";
        pub const NOTIFICATIONS_CLEANED: &str = "notification.cleaned";

        // メール
        pub const EMAIL_SENT: &str = "email.sent";
        pub const EMAIL_FAILED: &str = "email.failed";

        // 認証
        pub const LOGIN_SUCCESS: &str = "auth.login_success";
        pub const LOGIN_FAILURE: &str = "auth.login_failure";
        pub const LOGOUT: &str = "auth.logout";

        // 経理
        pub const COST_RECORDED: &str = "cost.recorded";
        pub const PAYMENT_STATUS_CHANGED: &str = "cost.payment_status_changed";
        pub const BUDGET_UPDATED: &str = "budget.updated";
        pub const INVOICE_CREATED: &str = "invoice.created";
        pub const INVOICE_STATUS_CHANGED: &str = "invoice.status_changed";
        pub const PAYMENT_BATCH_CREATED: &str = "payment_batch.created";
        pub const PAYMENT_BATCH_STATUS_CHANGED: &str = "payment_batch.status_changed";

        // 修了証・書類
        pub const CERTIFICATE_ISSUED: &str = "certificate.issued";
        pub const CERTIFICATE_REVOKED: &str = "certificate.revoked";
        pub const CERTIFICATE_EXPIRED: &str = "certificate.expired";
        pub const DOCUMENT_UPLOADED: &str = "document.uploaded";
        pub const DOCUMENT_VERIFIED: &str = "document.verified";
    }

    pub mod entity_type {
        pub const TRAINING_REQUEST: &str = "training_request";
        pub const CUSTOM_TRAINING_REQUEST: &str = "custom_training_request";
        pub const NOTIFICATION: &str = "notification";
        pub const EMAIL_LOG: &str = "email_log";
        pub const USER: &str = "user";
        pub const SESSION: &str = "session";
        pub const COST: &str = "officer_training_cost";
        pub const BUDGET: &str = "budget_settings";
        pub const INVOICE: &str = "invoice";
        pub const PAYMENT_BATCH: &str = "payment_batch";
        pub const CERTIFICATE: &str = "certificate";
        pub const DOCUMENT: &str = "document";
    }

    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
///
/// `tracing::error!` に `error.category` と `error.kind` として付ける。
pub mod error {
    pub mod category {
        /// DB、Redis、セッションストア
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// SendGrid / SMTP / SES などの外部送信先
        pub const EXTERNAL_SERVICE: &str = "external_service";
    }

    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const SESSION: &str = "session";
        pub const INTERNAL: &str = "internal";
        pub const USER_LOOKUP: &str = "user_lookup";
        pub const PASSWORD_VERIFICATION: &str = "password_verification";
        pub const EMAIL_DELIVERY: &str = "email_delivery";
        pub const REALTIME: &str = "realtime";
        pub const RANK_LOOKUP: &str = "rank_lookup";
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::layer::SubscriberExt;

    use super::event;

    #[derive(Clone, Default)]
    struct FieldCapture {
        fields: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FieldCapture {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            struct Visitor<'a>(&'a mut Vec<(String, String)>);
            impl tracing::field::Visit for Visitor<'_> {
                fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                    self.0.push((field.name().to_string(), format!("{value:?}")));
                }
                fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                    self.0.push((field.name().to_string(), value.to_string()));
                }
            }
            let mut fields = self.fields.lock().unwrap();
            event.record(&mut Visitor(&mut fields));
        }
    }

    #[test]
    fn test_log_business_eventはevent_kindマーカーを付与する() {
        let capture = FieldCapture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            log_business_event!(
                event.category = event::category::REQUEST,
                event.action = event::action::REQUEST_DENIED,
                event.result = event::result::SUCCESS,
                "研修申請を却下しました"
            );
        });

        let fields = capture.fields.lock().unwrap();
        let get = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("event.kind").as_deref(), Some("business_event"));
        assert_eq!(get("event.category").as_deref(), Some("request"));
        assert_eq!(get("event.action").as_deref(), Some("request.denied"));
    }
}
