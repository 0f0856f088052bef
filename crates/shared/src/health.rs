//! # ヘルスチェック共通型

use serde::Serialize;

/// ヘルスチェックレスポンス
///
/// ```
/// use learnhub_shared::HealthResponse;
///
/// let response = HealthResponse::healthy("core-service", "0.1.0");
/// assert_eq!(response.status, "healthy");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status:  &'static str,
    pub service: &'static str,
    /// Cargo.toml のバージョン
    pub version: &'static str,
}

impl HealthResponse {
    /// 稼働中のサービスのレスポンス
    pub fn healthy(service: &'static str, version: &'static str) -> Self {
        Self {
            status: "healthy",
            service,
            version,
        }
    }
}
