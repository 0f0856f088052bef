//! # 外部ストレージ
//!
//! レコードが参照するバイナリの保存先（オブジェクトストレージと動画配信サービス）への
//! 削除・一覧取得を提供する。
//!
//! ## 構成
//!
//! - [`ObjectStorage`]: S3 互換オブジェクトストレージ（画像、提出ファイル）
//! - [`VideoService`]: 動画配信サービス（レッスン動画、ライブ録画）
//! - [`StorageGateway`]: 参照キーから削除先を判定し、タイムアウトを適用する窓口
//!
//! 一覧取得はページ単位のメソッドとして公開し、ページ送りとタイムアウトはゲートウェイが行う。
//!
//! ## 削除結果の分類
//!
//! プロバイダ固有のエラーは [`DeleteResult`] に正規化する。
//!
//! | プロバイダの応答 | 結果 |
//! |-----------------|------|
//! | 2xx | `Ok` |
//! | 404 / `NoSuchKey` | `NotFound`（呼び出し元は成功として扱う） |
//! | 接続失敗、タイムアウト、408、429、5xx | `TransientError` |
//! | その他の 4xx | `PermanentError` |

mod gateway;
mod object_storage;
mod video_service;

use std::{fmt, sync::LazyLock};

use chrono::{DateTime, Utc};
pub use gateway::StorageGateway;
pub use object_storage::{ObjectStorage, S3ObjectStorage, create_client};
use regex::Regex;
pub use video_service::{HttpVideoService, VideoService};

/// 外部ストレージへの削除要求の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteResult {
    /// 削除した
    Ok,
    /// 既に存在しない（冪等な削除として成功扱い）
    NotFound,
    /// 再試行で解消しうる失敗
    TransientError(String),
    /// 再試行しても解消しない失敗（権限不足、不正なキーなど）
    PermanentError(String),
}

impl DeleteResult {
    /// HTTP ステータスコードから結果を分類する
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        match status {
            200..=299 => Self::Ok,
            404 => Self::NotFound,
            408 | 429 | 500..=599 => Self::TransientError(detail.into()),
            _ => Self::PermanentError(detail.into()),
        }
    }

    /// 呼び出し元が成功として扱ってよいか
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::NotFound)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientError(_))
    }

    /// 失敗の詳細（成功時は `None`）
    pub fn failure_detail(&self) -> Option<&str> {
        match self {
            Self::Ok | Self::NotFound => None,
            Self::TransientError(detail) | Self::PermanentError(detail) => Some(detail),
        }
    }
}

impl fmt::Display for DeleteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::NotFound => write!(f, "not_found"),
            Self::TransientError(detail) => write!(f, "transient_error: {detail}"),
            Self::PermanentError(detail) => write!(f, "permanent_error: {detail}"),
        }
    }
}

/// 参照キーの保存先
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReferenceBackend {
    ObjectStorage,
    VideoService,
}

static VIDEO_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("動画 ID の正規表現は有効")
});

impl ReferenceBackend {
    /// キーの形式から保存先を判定する
    ///
    /// UUID 形式（`8-4-4-4-12` の 16 進数）は動画 ID、それ以外はオブジェクトのパス。
    pub fn detect(key: &str) -> Self {
        if VIDEO_ID_PATTERN.is_match(key.trim()) {
            Self::VideoService
        } else {
            Self::ObjectStorage
        }
    }
}

/// 外部ストレージ上に保存されているオブジェクト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key:           String,
    pub last_modified: DateTime<Utc>,
}

impl StoredObject {
    pub fn new(key: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            last_modified,
        }
    }
}

/// 一覧取得の 1 ページ
///
/// `next_cursor` が `None` なら最終ページ。カーソルの形式はプロバイダごとに異なる
/// （S3 は継続トークン、動画配信サービスはページ番号）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects:     Vec<StoredObject>,
    pub next_cursor: Option<String>,
}
