//! # ドメイン層エラー定義
//!
//! 入力値の検証失敗や権限不足など、ドメイン固有の例外状態を表現するエラー型。
//! カスケード削除に固有のエラーは [`crate::deletion::CascadeError`] を参照。
//!
//! ## エラーの種類と HTTP ステータスの対応
//!
//! | エラー種別 | HTTP ステータス | 用途 |
//! |-----------|----------------|------|
//! | `Validation` | 400 Bad Request | 入力値の検証失敗 |
//! | `NotFound` | 404 Not Found | エンティティが存在しない |
//! | `Forbidden` | 403 Forbidden | 権限不足 |
//!
//! ## 使用例
//!
//! ```rust
//! use learnhub_domain::{DomainError, entity::EntityKind};
//!
//! fn parse_kind(raw: &str) -> Result<EntityKind, DomainError> {
//!     raw.parse()
//!         .map_err(|_| DomainError::Validation(format!("不明な種別です: {raw}")))
//! }
//!
//! assert!(parse_kind("course").is_ok());
//! assert!(parse_kind("courses").is_err());
//! ```

use thiserror::Error;

/// ドメイン層で発生するエラー
///
/// API 層でこのエラーを受け取り、適切な HTTP レスポンスに変換する。
#[derive(Debug, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// 不正な種別名や ID、許可されていない状態遷移など。
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// エンティティが見つからない
    ///
    /// # フィールド
    ///
    /// - `entity_type`: エンティティの種類（`EntityKind` の snake_case 表現）
    /// - `id`: 検索に使用した識別子
    #[error("{entity_type} が見つかりません: {id}")]
    NotFound {
        entity_type: &'static str,
        id:          String,
    },

    /// 権限エラー
    ///
    /// 認証（Authentication）ではなく認可（Authorization）の失敗を表す。
    #[error("権限がありません: {0}")]
    Forbidden(String),
}
