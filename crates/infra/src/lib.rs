//! # LearnHub インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL への接続プール管理とマイグレーション
//! - **レコードストア**: 種別とカラム名で汎化したレコードの検索・一括削除
//! - **外部ストレージ**: オブジェクトストレージ（S3 / MinIO）と動画配信サービスへの削除要求
//! - **カスケードロック**: カスケード削除どうしの相互排他
//!
//! ## 依存関係
//!
//! ```text
//! core-service → infra → domain
//!                  infra → shared
//! ```
//!
//! ドメイン層はインフラ層に依存しない（依存性逆転の原則）。
//!
//! ## モジュール構成
//!
//! - [`db`] - PostgreSQL データベース接続管理
//! - [`error`] - インフラ層エラー定義
//! - [`lock`] - カスケードロック
//! - [`repository`] - レコードストア
//! - [`storage`] - 外部ストレージゲートウェイ

pub mod db;
pub mod error;
pub mod lock;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod repository;
pub mod storage;

pub use error::InfraError;
pub use lock::{CascadeLock, CascadeLockGuard, InProcessCascadeLock, PostgresCascadeLock};
pub use repository::{PostgresRecordStore, RecordStore};
pub use storage::{DeleteResult, StorageGateway};
