//! # インフラ層エラー定義
//!
//! データベースや外部サービスとの通信で発生するエラーを表現する。
//!
//! ## 設計方針
//!
//! - **エラーの変換**: `sqlx::Error` をラップし、AWS SDK / reqwest のエラーは文字列化して保持
//! - **ドメインエラーとの分離**: インフラ固有のエラーを明示
//! - **SpanTrace 自動捕捉**: `From` 実装や convenience constructor で
//!   エラー生成時の呼び出し経路を自動記録する
//!
//! ## 構造
//!
//! `std::io::Error` と同じ struct + enum パターンを採用:
//! - [`InfraError`]: エラー種別（[`InfraErrorKind`]）と [`SpanTrace`] を保持するラッパー
//! - [`InfraErrorKind`]: エラーの具体的な種別（Database, ObjectStorage 等）
//!
//! 外部参照の削除失敗はここでは扱わない（[`crate::storage::DeleteResult`] で表現する）。
//! このエラーは一覧取得など、呼び出し元が処理を継続できない失敗に使う。

use std::fmt;

use derive_more::Display;
use thiserror::Error;
use tracing_error::SpanTrace;

/// インフラ層で発生するエラー
///
/// エラー種別（[`InfraErrorKind`]）と [`SpanTrace`]（呼び出し経路）を保持する。
/// `From<sqlx::Error>` 等の変換や convenience constructor でエラーを生成すると、
/// その時点のスパン情報が自動的にキャプチャされる。
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
    kind:       InfraErrorKind,
    span_trace: SpanTrace,
}

/// インフラ層エラーの種別
#[derive(Debug, Error)]
pub enum InfraErrorKind {
    /// データベースエラー
    ///
    /// SQL クエリの実行失敗、接続エラー、制約違反など。
    #[error("データベースエラー: {0}")]
    Database(#[source] sqlx::Error),

    /// 外部キー制約違反
    ///
    /// 子レコードが残った状態で親レコードを削除しようとした。
    /// `table` は削除を拒否されたテーブル。
    #[error("外部キー制約違反: {table}: {detail}")]
    ForeignKeyViolation {
        table:  &'static str,
        detail: String,
    },

    /// オブジェクトストレージのエラー
    ///
    /// AWS SDK のエラー型はジェネリクスが深く `#[from]` が困難なため、
    /// 手動で String にマップする。
    #[error("オブジェクトストレージエラー: {0}")]
    ObjectStorage(String),

    /// 動画配信サービスのエラー
    #[error("動画配信サービスエラー: {0}")]
    VideoService(String),

    /// カスケードロックの取得・解放に失敗した
    #[error("ロックエラー: {0}")]
    Lock(String),

    /// クライアント入力エラー
    ///
    /// 不正なカラム名など。呼び出し元のバグを示す。
    #[error("入力エラー: {0}")]
    InvalidInput(String),

    /// 予期しないエラー
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

// ===== InfraError のメソッド =====

impl InfraError {
    /// エラー種別を取得する
    pub fn kind(&self) -> &InfraErrorKind {
        &self.kind
    }

    /// SpanTrace を取得する
    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    fn with_kind(kind: InfraErrorKind) -> Self {
        Self {
            kind,
            span_trace: SpanTrace::capture(),
        }
    }

    // ===== Convenience constructors =====

    /// 外部キー制約違反エラーを生成する
    pub fn foreign_key_violation(table: &'static str, detail: impl Into<String>) -> Self {
        Self::with_kind(InfraErrorKind::ForeignKeyViolation {
            table,
            detail: detail.into(),
        })
    }

    /// オブジェクトストレージエラーを生成する
    pub fn object_storage(msg: impl Into<String>) -> Self {
        Self::with_kind(InfraErrorKind::ObjectStorage(msg.into()))
    }

    /// 動画配信サービスエラーを生成する
    pub fn video_service(msg: impl Into<String>) -> Self {
        Self::with_kind(InfraErrorKind::VideoService(msg.into()))
    }

    /// ロックエラーを生成する
    pub fn lock(msg: impl Into<String>) -> Self {
        Self::with_kind(InfraErrorKind::Lock(msg.into()))
    }

    /// クライアント入力エラーを生成する
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::with_kind(InfraErrorKind::InvalidInput(msg.into()))
    }

    /// 予期しないエラーを生成する
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::with_kind(InfraErrorKind::Unexpected(msg.into()))
    }
}

// ===== トレイト実装 =====

impl fmt::Debug for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfraError")
            .field("kind", &self.kind)
            .field("span_trace", &self.span_trace)
            .finish()
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

// ===== From 実装（SpanTrace 自動キャプチャ） =====

impl From<sqlx::Error> for InfraError {
    fn from(source: sqlx::Error) -> Self {
        Self::with_kind(InfraErrorKind::Database(source))
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::layer::SubscriberExt as _;

    use super::*;

    /// テスト用に ErrorLayer 付き subscriber を設定する
    fn with_error_layer(f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(tracing_error::ErrorLayer::default());
        let _guard = tracing::subscriber::set_default(subscriber);
        f();
    }

    #[test]
    fn test_from_sqlx_errorでspan_traceがキャプチャされる() {
        with_error_layer(|| {
            let span = tracing::info_span!("test_record_store", kind = "course");
            let _enter = span.enter();

            let err: InfraError = sqlx::Error::RowNotFound.into();

            assert!(matches!(err.kind(), InfraErrorKind::Database(_)));
            let trace_str = format!("{}", err.span_trace());
            assert!(
                trace_str.contains("test_record_store"),
                "SpanTrace がスパン名を含むこと: {trace_str}",
            );
        });
    }

    #[test]
    fn test_foreign_key_violationでspan_traceがキャプチャされる() {
        with_error_layer(|| {
            let span = tracing::info_span!("test_delete_many");
            let _enter = span.enter();

            let err = InfraError::foreign_key_violation("chapters", "lessons が参照しています");

            assert!(matches!(
                err.kind(),
                InfraErrorKind::ForeignKeyViolation { table, .. } if *table == "chapters"
            ));
            assert!(format!("{}", err.span_trace()).contains("test_delete_many"));
        });
    }

    #[test]
    fn test_object_storageとvideo_serviceの種別が区別される() {
        let storage = InfraError::object_storage("一覧取得に失敗");
        let video = InfraError::video_service("一覧取得に失敗");

        assert!(matches!(storage.kind(), InfraErrorKind::ObjectStorage(_)));
        assert!(matches!(video.kind(), InfraErrorKind::VideoService(_)));
    }

    #[test]
    fn test_displayがinfra_error_kindのメッセージを出力する() {
        let err = InfraError::lock("advisory lock の取得に失敗");
        assert_eq!(format!("{err}"), "ロックエラー: advisory lock の取得に失敗");
    }

    #[test]
    fn test_sourceがinfra_error_kindに委譲する() {
        use std::error::Error;

        let err: InfraError = sqlx::Error::RowNotFound.into();
        assert!(err.source().is_some());

        let err = InfraError::unexpected("test");
        assert!(err.source().is_none());
    }
}
