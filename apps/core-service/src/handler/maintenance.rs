//! # メンテナンスハンドラ
//!
//! 運用者が手動で実行するメンテナンス処理の内部 API。
//!
//! ## エンドポイント
//!
//! - `POST /internal/maintenance/orphan-sweep` - 孤立ファイル掃除を即時実行

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use learnhub_shared::ApiResponse;

use crate::{error::CoreError, usecase::OrphanSweeper};

/// メンテナンス API の共有状態
pub struct MaintenanceState {
    pub sweeper: Arc<OrphanSweeper>,
}

/// POST /internal/maintenance/orphan-sweep
///
/// 定期実行を待たずに孤立ファイル掃除を 1 回実行し、結果を返す。
/// 個々のファイルの削除失敗は `failed` に数えられ、エラーにはならない。
pub async fn run_orphan_sweep(
    State(state): State<Arc<MaintenanceState>>,
) -> Result<impl IntoResponse, CoreError> {
    let report = state.sweeper.sweep().await?;
    Ok((StatusCode::OK, Json(ApiResponse::new(report))))
}
