//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュール（この `handler.rs`）で re-export し、フラットな API を提供
//! - ハンドラは薄く保ち、削除のロジックはユースケース層に委譲

pub mod deletion;
pub mod health;
pub mod maintenance;

pub use deletion::{
    ACTOR_ID_HEADER,
    ACTOR_ROLE_HEADER,
    CascadeErrorDto,
    DeletionOutcomeDto,
    DeletionPreviewDto,
    DeletionState,
    delete_entity,
    preview_deletion,
};
pub use health::health_check;
pub use maintenance::{MaintenanceState, run_orphan_sweep};
