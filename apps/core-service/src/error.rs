//! # Core Service エラー定義
//!
//! Core Service 固有のエラーと、HTTP レスポンスへの変換を定義する。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use learnhub_domain::DomainError;
use learnhub_infra::{InfraError, error::InfraErrorKind};
use learnhub_shared::{
    ErrorResponse,
    event_log::error::{category, kind},
};
use thiserror::Error;

/// Core Service で発生するエラー
#[derive(Debug, Error)]
pub enum CoreError {
    /// リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// 削除できる種別ではない（パスの種別文字列を保持）
    #[error("不明な種別です: {0}")]
    UnknownEntityKind(String),

    /// 権限不足
    #[error("権限がありません: {0}")]
    Forbidden(String),

    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(#[from] InfraError),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl CoreError {
    /// ログに付与する `error.category` と `error.kind`
    pub fn log_fields(&self) -> (&'static str, &'static str) {
        match self {
            CoreError::Database(e) => match e.kind() {
                InfraErrorKind::ObjectStorage(_) => {
                    (category::EXTERNAL_SERVICE, kind::OBJECT_STORAGE)
                }
                InfraErrorKind::VideoService(_) => (category::EXTERNAL_SERVICE, kind::VIDEO_SERVICE),
                InfraErrorKind::Lock(_) => (category::INFRASTRUCTURE, kind::LOCK),
                _ => (category::INFRASTRUCTURE, kind::DATABASE),
            },
            _ => (category::INFRASTRUCTURE, kind::INTERNAL),
        }
    }
}

impl From<DomainError> for CoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::BadRequest(msg),
            DomainError::NotFound { .. } => Self::NotFound(err.to_string()),
            DomainError::Forbidden(msg) => Self::Forbidden(msg),
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let body = match &self {
            CoreError::NotFound(msg) => ErrorResponse::not_found(msg.clone()),
            CoreError::BadRequest(msg) => ErrorResponse::bad_request(msg.clone()),
            CoreError::UnknownEntityKind(raw) => ErrorResponse::unknown_entity_kind(raw),
            CoreError::Forbidden(msg) => ErrorResponse::forbidden(msg.clone()),
            CoreError::Database(e) => {
                let (error_category, error_kind) = self.log_fields();
                tracing::error!(
                    error.category = error_category,
                    error.kind = error_kind,
                    "データベースエラー: {}",
                    e
                );
                ErrorResponse::internal_error()
            }
            CoreError::Internal(msg) => {
                tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::INTERNAL,
                    "内部エラー: {}",
                    msg
                );
                ErrorResponse::internal_error()
            }
        };

        let status =
            StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(CoreError::NotFound("x".to_string()), StatusCode::NOT_FOUND)]
    #[case(CoreError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST)]
    #[case(CoreError::UnknownEntityKind("x".to_string()), StatusCode::BAD_REQUEST)]
    #[case(CoreError::Forbidden("x".to_string()), StatusCode::FORBIDDEN)]
    #[case(CoreError::Internal("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(
        CoreError::Database(InfraError::unexpected("x")),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    fn test_エラー種別ごとのステータスコード(
        #[case] error: CoreError,
        #[case] expected: StatusCode,
    ) {
        assert_eq!(error.into_response().status(), expected);
    }

    #[rstest]
    #[case(
        CoreError::Database(InfraError::object_storage("x")),
        (category::EXTERNAL_SERVICE, kind::OBJECT_STORAGE)
    )]
    #[case(
        CoreError::Database(InfraError::video_service("x")),
        (category::EXTERNAL_SERVICE, kind::VIDEO_SERVICE)
    )]
    #[case(
        CoreError::Database(InfraError::unexpected("x")),
        (category::INFRASTRUCTURE, kind::DATABASE)
    )]
    #[case(
        CoreError::Internal("x".to_string()),
        (category::INFRASTRUCTURE, kind::INTERNAL)
    )]
    fn test_ログのエラー分類(
        #[case] error: CoreError,
        #[case] expected: (&'static str, &'static str),
    ) {
        assert_eq!(error.log_fields(), expected);
    }

    #[test]
    fn test_ドメインのバリデーションエラーはbad_requestになる() {
        let err: CoreError = DomainError::Validation("不明な種別です".to_string()).into();

        assert!(matches!(err, CoreError::BadRequest(msg) if msg == "不明な種別です"));
    }
}
