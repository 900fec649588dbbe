//! # Core Service 設定
//!
//! 環境変数から TrainFlow サーバーの設定を読み込む。
//! 必須項目の欠落や不正値は [`ConfigError`] として返し、`main` で報告する。

use std::{env, str::FromStr};

use thiserror::Error;

/// 設定読み込みエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    #[error("{name} の値が不正です: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// サーバー設定
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// バインドアドレス
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    /// メール送信設定
    pub notification: NotificationConfig,
    /// 通知ジェネレータの実行間隔（秒）。0 で無効
    pub generator_interval_secs: u64,
}

/// メール送信バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationBackend {
    SendGrid,
    Smtp,
    Ses,
    /// 送信しない（ログ出力のみ）
    #[default]
    Noop,
}

impl FromStr for NotificationBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sendgrid" => Ok(Self::SendGrid),
            "smtp" => Ok(Self::Smtp),
            "ses" => Ok(Self::Ses),
            "noop" => Ok(Self::Noop),
            other => Err(ConfigError::Invalid {
                name:  "NOTIFICATION_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

/// メール通知の設定
///
/// `NOTIFICATION_BACKEND` で送信経路を切り替える:
/// - `sendgrid`: SendGrid v3 API（`SENDGRID_API_KEY` 必須）
/// - `smtp`: Mailpit（開発）/ SMTP サーバー
/// - `ses`: Amazon SES v2
/// - `noop`: 送信しない
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub backend: NotificationBackend,
    pub sendgrid_api_key: Option<String>,
    pub sender_email: String,
    pub sender_name: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// フロントエンド URL（メール内リンク用）
    pub base_url: String,
}

impl CoreConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の参照関数から設定を組み立てる
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));
        let or_default =
            |name: &'static str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let notification = NotificationConfig {
            backend: lookup("NOTIFICATION_BACKEND")
                .map(|v| v.parse::<NotificationBackend>())
                .transpose()?
                .unwrap_or_default(),
            sendgrid_api_key: lookup("SENDGRID_API_KEY").filter(|key| !key.is_empty()),
            sender_email: or_default("SENDER_EMAIL", "info@shpdtraining.com"),
            sender_name: or_default("SENDER_NAME", "SHPD Training System"),
            smtp_host: or_default("SMTP_HOST", "localhost"),
            smtp_port: parse_number("SMTP_PORT", &or_default("SMTP_PORT", "1025"))?,
            base_url: or_default("APP_BASE_URL", "http://localhost:5173"),
        };
        if notification.backend == NotificationBackend::SendGrid
            && notification.sendgrid_api_key.is_none()
        {
            return Err(ConfigError::Missing("SENDGRID_API_KEY"));
        }

        Ok(Self {
            host: or_default("APP_HOST", "0.0.0.0"),
            port: parse_number("APP_PORT", &required("APP_PORT")?)?,
            database_url: required("DATABASE_URL")?,
            redis_url: required("REDIS_URL")?,
            notification,
            generator_interval_secs: parse_number(
                "GENERATOR_INTERVAL_SECS",
                &or_default("GENERATOR_INTERVAL_SECS", "3600"),
            )?,
        })
    }
}

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
