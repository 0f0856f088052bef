//! # リポジトリ実装
//!
//! レコードストアのトレイトと PostgreSQL 実装を提供する。
//!
//! ## 設計方針
//!
//! - **種別で汎化**: テーブルごとのリポジトリではなく、[`EntityKind`] とカラム名を
//!   引数に取る 1 つのトレイトで全テーブルを扱う
//! - **テスタビリティ**: トレイト経由でモック可能な設計（[`crate::mock::InMemoryRecordStore`]）
//!
//! [`EntityKind`]: learnhub_domain::entity::EntityKind

pub mod record_store;

pub use record_store::{PostgresRecordStore, RecordStore};
