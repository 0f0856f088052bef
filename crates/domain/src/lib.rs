//! # LearnHub ドメイン層
//!
//! エンティティの削除ライフサイクルの中核となるドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **スキーマはデータ**: テーブル間の依存関係は [`schema::Schema`] に辺として宣言し、
//!   削除順序はそこから導出する
//! - **プランは値**: 削除順序は [`deletion::DeletionPlan`] として生成され、
//!   実行前にレビュー・テストできる
//! - **I/O を持たない**: データベースや外部ストレージへのアクセスはインフラ層が担う
//!
//! ## 依存関係の方向
//!
//! ```text
//! core-service → infra → domain
//! ```
//!
//! ## モジュール構成
//!
//! - [`entity`] - レコード種別と識別子
//! - [`reference`] - 外部ストレージへの参照
//! - [`schema`] - 依存辺の宣言
//! - [`deletion`] - 削除プラン、プランナー、実行結果
//! - [`clock`] - 時刻プロバイダ
//! - [`error`] - ドメイン層で発生するエラーの定義

#[macro_use]
mod macros;

pub mod clock;
pub mod deletion;
pub mod entity;
pub mod error;
pub mod reference;
pub mod schema;

pub use error::DomainError;
