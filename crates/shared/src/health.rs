//! # ヘルスチェック共通型

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `GET /health` のレスポンス
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"healthy"` 固定（プロセスが応答できていること自体が liveness）
    pub status:  String,
    pub version: String,
}

/// 個別チェックの結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    Ready,
    NotReady,
}

/// `GET /health/ready` のレスポンス
///
/// `checks` のキーは `"database"` と `"redis"`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: ReadinessStatus,
    pub checks: HashMap<String, CheckStatus>,
}

impl ReadinessResponse {
    /// 個別チェック結果から全体ステータスを決める
    ///
    /// 1 つでも `Error` があれば `NotReady`。
    pub fn from_checks(checks: HashMap<String, CheckStatus>) -> Self {
        let status = if checks.values().all(|c| *c == CheckStatus::Ok) {
            ReadinessStatus::Ready
        } else {
            ReadinessStatus::NotReady
        };
        Self { status, checks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_responseのjson形状() {
        let response = HealthResponse {
            status:  "healthy".to_string(),
            version: "0.1.0".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({ "status": "healthy", "version": "0.1.0" })
        );
    }

    #[test]
    fn test_全チェック成功ならready() {
        let checks = HashMap::from([
            ("database".to_string(), CheckStatus::Ok),
            ("redis".to_string(), CheckStatus::Ok),
        ]);

        let response = ReadinessResponse::from_checks(checks);

        assert_eq!(response.status, ReadinessStatus::Ready);
    }

    #[test]
    fn test_一つでも失敗ならnot_ready() {
        let checks = HashMap::from([
            ("database".to_string(), CheckStatus::Ok),
            ("redis".to_string(), CheckStatus::Error),
        ]);

        let response = ReadinessResponse::from_checks(checks);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "not_ready");
        assert_eq!(json["checks"]["redis"], "error");
    }
}
