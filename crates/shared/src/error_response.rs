//! # エラーレスポンス（RFC 9457 Problem Details）
//!
//! 内部 API がエラー時に返す本文。`IntoResponse` への変換は各サービスが行う
//! （shared は axum に依存しない）。
//!
//! 削除 API では、処理を始めた後の失敗はこの形式ではなく削除結果の本文で返す
//! （中断までに削除した件数を呼び出し元が知る必要があるため）。この形式は
//! 要求そのものを受け付けなかった場合に使う。

use serde::{Deserialize, Serialize};

/// error_type URI のベースパス
const ERROR_TYPE_BASE: &str = "https://learnhub.example.com/errors";

/// エラーレスポンス
///
/// `type` は問題の種類を識別する URI。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title:      String,
    pub status:     u16,
    pub detail:     String,
}

impl ErrorResponse {
    /// `error_type_suffix` はベース URI に付加される（例: `"unknown-entity-kind"`）。
    pub fn new(
        error_type_suffix: &str,
        title: impl Into<String>,
        status: u16,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            error_type: format!("{ERROR_TYPE_BASE}/{error_type_suffix}"),
            title: title.into(),
            status,
            detail: detail.into(),
        }
    }

    /// 400 Bad Request
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new("bad-request", "Bad Request", 400, detail)
    }

    /// 403 Forbidden
    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new("forbidden", "Forbidden", 403, detail)
    }

    /// 404 Not Found
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new("not-found", "Not Found", 404, detail)
    }

    /// 500 Internal Server Error
    ///
    /// detail は固定値（内部情報を漏らさないため）。
    pub fn internal_error() -> Self {
        Self::new(
            "internal-error",
            "Internal Server Error",
            500,
            "内部エラーが発生しました",
        )
    }

    /// 400 削除できる種別ではない
    ///
    /// `raw` はパスで指定された種別の文字列。
    pub fn unknown_entity_kind(raw: &str) -> Self {
        Self::new(
            "unknown-entity-kind",
            "Unknown Entity Kind",
            400,
            format!("不明な種別です: {raw}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_で全フィールドが正しく設定される() {
        let error = ErrorResponse::new("custom-error", "Custom Error", 418, "カスタムエラー");

        assert_eq!(
            error.error_type,
            "https://learnhub.example.com/errors/custom-error"
        );
        assert_eq!(error.title, "Custom Error");
        assert_eq!(error.status, 418);
        assert_eq!(error.detail, "カスタムエラー");
    }

    #[test]
    fn test_not_found_が404と正しいerror_typeを返す() {
        let error = ErrorResponse::not_found("リソースが見つかりません");

        assert_eq!(
            error.error_type,
            "https://learnhub.example.com/errors/not-found"
        );
        assert_eq!(error.title, "Not Found");
        assert_eq!(error.status, 404);
        assert_eq!(error.detail, "リソースが見つかりません");
    }

    #[test]
    fn test_internal_error_が500と固定detailを返す() {
        let error = ErrorResponse::internal_error();

        assert_eq!(
            error.error_type,
            "https://learnhub.example.com/errors/internal-error"
        );
        assert_eq!(error.title, "Internal Server Error");
        assert_eq!(error.status, 500);
        assert_eq!(error.detail, "内部エラーが発生しました");
    }

    #[test]
    fn test_jsonシリアライズでtypeフィールド名が正しい() {
        let error = ErrorResponse::bad_request("不正なリクエスト");
        let json = serde_json::to_value(&error).unwrap();

        // serde(rename = "type") で `error_type` → `type` に変換される
        assert_eq!(
            json["type"],
            "https://learnhub.example.com/errors/bad-request"
        );
        assert_eq!(json["title"], "Bad Request");
        assert_eq!(json["status"], 400);
        assert_eq!(json["detail"], "不正なリクエスト");
        // `error_type` フィールドは存在しない
        assert!(json.get("error_type").is_none());
    }

    #[test]
    fn test_全便利コンストラクタのstatusが正しい() {
        assert_eq!(ErrorResponse::bad_request("").status, 400);
        assert_eq!(ErrorResponse::forbidden("").status, 403);
        assert_eq!(ErrorResponse::not_found("").status, 404);
        assert_eq!(ErrorResponse::internal_error().status, 500);
    }

    #[test]
    fn test_unknown_entity_kindは種別の文字列をdetailに含める() {
        let error = ErrorResponse::unknown_entity_kind("courses");

        assert_eq!(
            error.error_type,
            "https://learnhub.example.com/errors/unknown-entity-kind"
        );
        assert_eq!(error.status, 400);
        assert_eq!(error.detail, "不明な種別です: courses");
    }

    #[test]
    fn test_jsonデシリアライズが正しく動作する() {
        let json = r#"{
                "type": "https://learnhub.example.com/errors/not-found",
                "title": "Not Found",
                "status": 404,
                "detail": "見つかりません"
        }"#;
        let error: ErrorResponse = serde_json::from_str(json).unwrap();

        assert_eq!(
            error.error_type,
            "https://learnhub.example.com/errors/not-found"
        );
        assert_eq!(error.title, "Not Found");
        assert_eq!(error.status, 404);
        assert_eq!(error.detail, "見つかりません");
    }
}
