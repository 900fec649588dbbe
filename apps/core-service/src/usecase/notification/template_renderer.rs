//! # テンプレートレンダラー
//!
//! tera テンプレートエンジンでメールを HTML/plaintext 両形式で生成する。
//!
//! - テンプレートは `include_str!` でバイナリに埋め込む
//! - 7 種類のテンプレート種別は同じ骨格を共有し、導入文だけが変わる
//! - `system_link` 未指定時は `{base_url}/requests` へのリンクを入れる

use tera::{Context, Tera};
use trainflow_domain::notification::{
    EmailFields,
    EmailMessage,
    EmailTemplateKind,
    NotificationError,
};

const HTML_TEMPLATE: &str = "message.html";
const TEXT_TEMPLATE: &str = "message.txt";

/// 宛名がないときの呼びかけ
const DEFAULT_RECIPIENT_NAME: &str = "Training Coordinator";

/// テンプレートレンダラー
pub struct TemplateRenderer {
    engine: Tera,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self, NotificationError> {
        let mut engine = Tera::default();

        engine
            .add_raw_templates(vec![
                (
                    HTML_TEMPLATE,
                    include_str!("../../../templates/email/message.html"),
                ),
                (
                    TEXT_TEMPLATE,
                    include_str!("../../../templates/email/message.txt"),
                ),
            ])
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(Self { engine })
    }

    /// テンプレート種別と差し込み値からメールを生成する
    ///
    /// 必須項目（`to`、`subject`、`officer_name`、`training_name`）が欠けていれば
    /// レンダリング前に `InvalidFields` を返す。
    pub fn render(
        &self,
        kind: EmailTemplateKind,
        fields: &EmailFields,
        base_url: &str,
    ) -> Result<EmailMessage, NotificationError> {
        fields.validate()?;

        let context = build_context(kind, fields, base_url);

        let html_body = self
            .engine
            .render(HTML_TEMPLATE, &context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        let text_body = self
            .engine
            .render(TEXT_TEMPLATE, &context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(EmailMessage {
            to: fields.to.trim().to_string(),
            subject: fields.subject.clone(),
            html_body,
            text_body,
            ..Default::default()
        })
    }
}

fn build_context(kind: EmailTemplateKind, fields: &EmailFields, base_url: &str) -> Context {
    let mut context = Context::new();
    context.insert("lead", kind.lead());
    context.insert("officer_name", &fields.officer_name);
    context.insert("training_name", &fields.training_name);
    context.insert(
        "recipient_name",
        fields
            .recipient_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_RECIPIENT_NAME),
    );
    let system_link = fields
        .system_link
        .clone()
        .unwrap_or_else(|| format!("{base_url}/requests"));
    context.insert("system_link", &system_link);

    // 任意項目は値があるときだけ入れる（テンプレート側の {% if %} で行ごと省く）
    for (key, value) in [
        ("badge_number", &fields.badge_number),
        ("training_type", &fields.training_type),
        ("training_date", &fields.training_date),
        ("date_submitted", &fields.date_submitted),
        ("approver_name", &fields.approver_name),
        ("notes", &fields.notes),
        ("signature", &fields.signature),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            context.insert(key, value);
        }
    }
    context
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn fields() -> EmailFields {
        EmailFields {
            to: "sgt.rivera@shpd.example.com".to_string(),
            subject: "New Training Request: Crisis Intervention".to_string(),
            officer_name: "Alex Morgan".to_string(),
            training_name: "Crisis Intervention".to_string(),
            badge_number: Some("P5001".to_string()),
            training_date: Some("11/14/2026".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_必須項目と任意項目が本文に入る() {
        let renderer = TemplateRenderer::new().unwrap();

        let email = renderer
            .render(EmailTemplateKind::Submission, &fields(), "http://localhost:5173")
            .unwrap();

        assert_eq!(email.to, "sgt.rivera@shpd.example.com");
        assert_eq!(email.subject, "New Training Request: Crisis Intervention");
        assert!(email.html_body.contains("Alex Morgan"));
        assert!(email.html_body.contains("P5001"));
        assert!(email.html_body.contains("Hello Training Coordinator,"));
        assert!(
            email
                .html_body
                .contains("http://localhost:5173/requests")
        );
        assert!(email.text_body.contains("Training Date: 11/14/2026"));
        assert!(!email.text_body.contains("Approver:"));
    }

    #[rstest]
    #[case(EmailTemplateKind::Submission, "requires your attention")]
    #[case(EmailTemplateKind::Denial, "has been denied")]
    #[case(EmailTemplateKind::FinalApproval, "final approval")]
    fn test_種別ごとに導入文が変わる(#[case] kind: EmailTemplateKind, #[case] expected: &str) {
        let renderer = TemplateRenderer::new().unwrap();

        let email = renderer.render(kind, &fields(), "http://localhost:5173").unwrap();

        assert!(email.text_body.contains(expected));
    }

    #[test]
    fn test_必須項目が欠けているとinvalid_fields() {
        let renderer = TemplateRenderer::new().unwrap();
        let missing = EmailFields {
            officer_name: String::new(),
            ..fields()
        };

        let result = renderer.render(EmailTemplateKind::General, &missing, "http://localhost");

        assert!(matches!(result, Err(NotificationError::InvalidFields(f)) if f == "officer_name"));
    }

    #[test]
    fn test_htmlでは値がエスケープされる() {
        let renderer = TemplateRenderer::new().unwrap();
        let with_notes = EmailFields {
            notes: Some("<b>bring vest</b>".to_string()),
            ..fields()
        };

        let email = renderer
            .render(EmailTemplateKind::Approval, &with_notes, "http://localhost")
            .unwrap();

        assert!(email.html_body.contains("&lt;b&gt;bring vest&lt;&#x2F;b&gt;"));
        assert!(email.text_body.contains("<b>bring vest</b>"));
    }

    #[test]
    fn test_署名は本文末尾にエスケープして入る() {
        let renderer = TemplateRenderer::new().unwrap();
        let signed = EmailFields {
            signature: Some("Lt. Dana Cruz\nTraining <Unit>".to_string()),
            ..fields()
        };

        let email = renderer
            .render(EmailTemplateKind::Mass, &signed, "http://localhost")
            .unwrap();

        assert!(email.html_body.contains("Lt. Dana Cruz<br>Training &lt;Unit&gt;"));
        assert!(email.text_body.contains("Lt. Dana Cruz\nTraining <Unit>"));
    }
}
