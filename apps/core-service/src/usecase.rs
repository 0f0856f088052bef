//! # ユースケース層
//!
//! Core Service のビジネスロジックを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: レコードストア、ロック、認可ポリシーを `Arc<dyn Trait>` で外部から注入
//! - **薄いハンドラ**: ハンドラは薄く保ち、ロジックはユースケースに集約
//!
//! ## モジュール構成
//!
//! - `authorization`: 削除要求の認可
//! - `deletion`: カスケード削除（グラフの読み込みと実行）
//! - `orphan_sweeper`: 孤立ファイル掃除

pub mod authorization;
pub mod deletion;
pub mod orphan_sweeper;

pub use authorization::{
    Actor,
    ActorRole,
    AdminOnlyPolicy,
    AllowAllPolicy,
    AuthorizationPolicy,
};
pub use deletion::{
    CascadeExecutor,
    DeletionPreview,
    DeletionUseCaseImpl,
    EntityGraph,
    EntityGraphReader,
};
pub use orphan_sweeper::{OrphanSweeper, SweepReport};
