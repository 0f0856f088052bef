//! # カスケード削除ハンドラ
//!
//! BFF から呼び出される削除の内部 API を提供する。
//!
//! ## エンドポイント
//!
//! - `DELETE /internal/entities/{kind}/{id}` - エンティティのカスケード削除
//! - `GET /internal/entities/{kind}/{id}/deletion-preview` - 削除対象の件数と実行順
//!
//! 操作者は `X-Actor-Role`（必須）と `X-Actor-Id`（任意）ヘッダーで渡す。

use std::{collections::BTreeMap, str::FromStr, sync::Arc};

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use learnhub_domain::{
    deletion::{CascadeState, DeletionOutcome, ExternalDeleteFailure},
    entity::{EntityId, EntityKind, EntityRef},
};
use learnhub_shared::ApiResponse;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::CoreError,
    usecase::{Actor, ActorRole, DeletionPreview, DeletionUseCaseImpl},
};

/// 操作者 ID ヘッダー
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// 操作者ロールヘッダー
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// 削除 API の共有状態
pub struct DeletionState {
    pub usecase: Arc<DeletionUseCaseImpl>,
}

// --- レスポンス型 ---

/// カスケード削除結果 DTO
#[derive(Debug, Serialize)]
pub struct DeletionOutcomeDto {
    pub root:                     EntityRef,
    pub state:                    CascadeState,
    pub root_not_found:           bool,
    pub deleted_counts:           BTreeMap<EntityKind, u64>,
    pub nullified_counts:         BTreeMap<EntityKind, u64>,
    pub external_delete_failures: Vec<ExternalDeleteFailure>,
    /// 中断の原因（`state` が `failed` のときのみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:                    Option<CascadeErrorDto>,
}

/// カスケード中断の原因
#[derive(Debug, Serialize)]
pub struct CascadeErrorDto {
    pub message:   String,
    /// 同じ要求を再実行すれば続きから削除できる
    pub retryable: bool,
}

impl From<DeletionOutcome> for DeletionOutcomeDto {
    fn from(outcome: DeletionOutcome) -> Self {
        Self {
            state: outcome.state(),
            error: outcome.fatal_error.as_ref().map(|e| CascadeErrorDto {
                message:   e.to_string(),
                retryable: e.is_retryable(),
            }),
            root: outcome.root,
            root_not_found: outcome.root_not_found,
            deleted_counts: outcome.deleted_counts,
            nullified_counts: outcome.nullified_counts,
            external_delete_failures: outcome.external_delete_failures,
        }
    }
}

/// 削除プレビュー DTO
#[derive(Debug, Serialize)]
pub struct DeletionPreviewDto {
    pub root:             EntityRef,
    /// 実行順のステップ（例: `"delete lesson"`, `"nullify live_lesson.course_id"`）
    pub steps:            Vec<String>,
    pub deleted_counts:   BTreeMap<EntityKind, usize>,
    pub nullified_counts: BTreeMap<EntityKind, usize>,
    pub reference_count:  usize,
}

impl From<DeletionPreview> for DeletionPreviewDto {
    fn from(preview: DeletionPreview) -> Self {
        Self {
            steps: preview.plan.steps().iter().map(ToString::to_string).collect(),
            root: preview.root,
            deleted_counts: preview.deleted_counts,
            nullified_counts: preview.nullified_counts,
            reference_count: preview.reference_count,
        }
    }
}

// --- ハンドラ ---

/// DELETE /internal/entities/{kind}/{id}
///
/// エンティティとその依存レコード・外部参照を削除する。
///
/// ## レスポンス
///
/// - `200 OK`: 削除完了（外部ファイルの削除に失敗した場合は `warnings` 付き）
/// - `400 Bad Request`: 不明な種別、操作者ヘッダーの不備
/// - `403 Forbidden`: 認可ポリシーが拒否した
/// - `503 Service Unavailable`: 途中で中断した（同じ要求を再実行してよい）
/// - `500 Internal Server Error`: 削除プランを生成できなかった
///
/// 中断した場合も本文は削除結果で、中断までに削除した件数と失敗した外部参照を含む。
pub async fn delete_entity(
    State(state): State<Arc<DeletionState>>,
    Path((kind, id)): Path<(String, Uuid)>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<ApiResponse<DeletionOutcomeDto>>), CoreError> {
    let kind = parse_kind(&kind)?;
    let actor = actor_from_headers(&headers)?;

    let outcome = state
        .usecase
        .delete_entity(&actor, kind, EntityId::from_uuid(id))
        .await?;

    let mut warnings = outcome.warnings();
    let status = match &outcome.fatal_error {
        None => StatusCode::OK,
        Some(error) if error.is_retryable() => {
            warnings.push(format!(
                "削除は途中で中断されました（削除済み: {} 件）。同じ要求を再実行すると残りを削除できます",
                outcome.total_deleted()
            ));
            StatusCode::SERVICE_UNAVAILABLE
        }
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let response = ApiResponse::new(DeletionOutcomeDto::from(outcome)).with_warnings(warnings);
    Ok((status, Json(response)))
}

/// GET /internal/entities/{kind}/{id}/deletion-preview
///
/// 削除を実行せずに、削除されるレコードの件数と実行順を返す。
///
/// ## レスポンス
///
/// - `200 OK`: プレビュー
/// - `404 Not Found`: 対象が存在しない
pub async fn preview_deletion(
    State(state): State<Arc<DeletionState>>,
    Path((kind, id)): Path<(String, Uuid)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, CoreError> {
    let kind = parse_kind(&kind)?;
    let actor = actor_from_headers(&headers)?;

    let preview = state
        .usecase
        .preview(&actor, kind, EntityId::from_uuid(id))
        .await?;

    let response = ApiResponse::new(DeletionPreviewDto::from(preview));
    Ok((StatusCode::OK, Json(response)))
}

fn parse_kind(raw: &str) -> Result<EntityKind, CoreError> {
    EntityKind::from_str(raw).map_err(|_| CoreError::UnknownEntityKind(raw.to_string()))
}

/// 操作者ヘッダーから操作者を復元する
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, CoreError> {
    let header = |name: &str| -> Result<Option<&str>, CoreError> {
        headers
            .get(name)
            .map(|v| {
                v.to_str()
                    .map_err(|_| CoreError::BadRequest(format!("{name} ヘッダーが不正です")))
            })
            .transpose()
    };

    let role = header(ACTOR_ROLE_HEADER)?
        .ok_or_else(|| CoreError::BadRequest(format!("{ACTOR_ROLE_HEADER} ヘッダーが必要です")))?;
    let role = ActorRole::from_str(role)
        .map_err(|_| CoreError::BadRequest(format!("不明なロールです: {role}")))?;
    let id = header(ACTOR_ID_HEADER)?
        .map(EntityId::from_str)
        .transpose()?;

    Ok(Actor::new(id, role))
}
