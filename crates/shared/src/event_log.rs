//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! `jq` で効率的に調査できるよう、ログフィールドの命名規約とヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## エラーコンテキスト
//!
//! 既存の `tracing::error!` / `tracing::warn!` に `error.category` + `error.kind`
//! フィールドを直接追加する。定数は [`error`] モジュールで提供。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`error.kind`）を使用。tracing の
//! `$($field:ident).+` パターンでサポートされ、JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.entity_type`: エンティティ種別（`EntityKind` の snake_case 表現）
/// - `event.entity_id`: エンティティ ID
/// - `event.actor_id`: 操作者 ID
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
    /// イベントカテゴリ
    pub mod category {
        pub const DELETION: &str = "deletion";
        pub const MAINTENANCE: &str = "maintenance";
    }

    /// イベントアクション
    pub mod action {
        // カスケード削除
        pub const CASCADE_STARTED: &str = "cascade.started";
        pub const CASCADE_COMPLETED: &str = "cascade.completed";
        pub const CASCADE_FAILED: &str = "cascade.failed";
        pub const CASCADE_DENIED: &str = "cascade.denied";

        // 孤立ファイル掃除
        pub const ORPHAN_SWEEP_COMPLETED: &str = "orphan_sweep.completed";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const PARTIAL: &str = "partial";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（DB、ロック）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// 外部サービス呼び出し（オブジェクトストレージ、動画配信サービス）
        pub const EXTERNAL_SERVICE: &str = "external_service";
    }

    /// エラー種別
    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const OBJECT_STORAGE: &str = "object_storage";
        pub const VIDEO_SERVICE: &str = "video_service";
        pub const LOCK: &str = "lock";
        pub const INTERNAL: &str = "internal";
    }
}
