//! # CascadeExecutor
//!
//! 読み込んだレコードグラフに対して削除プランを実行する。
//!
//! ステップは順番に 1 つずつ実行する。各ステップでは:
//!
//! 1. ステップの行が所有する外部参照の削除を並行に発行し、すべての完了を待つ
//! 2. 行の一括削除（または外部キーの NULL 更新）を実行する
//!
//! 外部参照の削除失敗は記録して続行し、関係データベースの失敗で残りのステップを中止する。

use std::sync::Arc;

use futures::{FutureExt, StreamExt, stream};
use learnhub_domain::{
    deletion::{
        CascadeError,
        CascadeState,
        DeletionOutcome,
        DeletionPlan,
        DeletionStep,
        ExternalDeleteFailure,
        StepAction,
    },
    reference::OwnedReference,
};
use learnhub_infra::{DeleteResult, InfraError, RecordStore, StorageGateway};
use learnhub_shared::event_log::error::{category, kind};

use super::graph_reader::EntityGraph;
use crate::error::CoreError;

/// カスケード実行器
pub struct CascadeExecutor {
    store:       Arc<dyn RecordStore>,
    storage:     StorageGateway,
    concurrency: usize,
}

impl CascadeExecutor {
    /// `concurrency` は 1 ステップ内で同時に発行する外部参照削除の上限（0 は 1 とみなす）
    pub fn new(store: Arc<dyn RecordStore>, storage: StorageGateway, concurrency: usize) -> Self {
        Self {
            store,
            storage,
            concurrency: concurrency.max(1),
        }
    }

    /// プランを実行し、結果を返す
    ///
    /// 関係データベースの失敗も `DeletionOutcome::fatal_error` として返す。
    /// `Err` を返すのは状態遷移の不整合のみ。
    #[tracing::instrument(skip_all, fields(root = %graph.root()))]
    pub async fn execute(
        &self,
        plan: &DeletionPlan,
        graph: &EntityGraph,
    ) -> Result<DeletionOutcome, CoreError> {
        let state = CascadeState::Planned.transition(CascadeState::Running)?;
        let mut outcome = DeletionOutcome::new(graph.root().clone());

        for step in plan.steps() {
            self.delete_references(graph.references(step.kind), step, &mut outcome)
                .await;

            if let Err(e) = self.apply_relational(step, graph, &mut outcome).await {
                tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::DATABASE,
                    step = %step,
                    "カスケードを中止しました: {}",
                    e
                );
                outcome.record_fatal(CascadeError::RelationalDeleteFailure {
                    kind:    step.kind,
                    step:    step.to_string(),
                    message: e.to_string(),
                });
                break;
            }
        }

        state.transition(outcome.state())?;
        Ok(outcome)
    }

    /// ステップの外部参照を削除する
    ///
    /// 発行順で結果を集めるため、失敗の一覧は参照の並び順と一致する。
    /// 各削除は参照とゲートウェイを所有した `Send + 'static` な future として発行する。
    async fn delete_references(
        &self,
        references: &[OwnedReference],
        step: &DeletionStep,
        outcome: &mut DeletionOutcome,
    ) {
        if !step.is_delete() || references.is_empty() {
            return;
        }

        let results: Vec<(OwnedReference, DeleteResult)> = stream::iter(references.to_vec())
            .map(|owned| {
                let storage = self.storage.clone();
                async move {
                    let result = storage.delete(&owned.reference).await;
                    (owned, result)
                }
                .boxed()
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (owned, result) in results {
            if let Some(detail) = result.failure_detail() {
                outcome.record_external_failure(ExternalDeleteFailure::new(
                    &owned,
                    result.is_transient(),
                    detail,
                ));
            }
        }
    }

    async fn apply_relational(
        &self,
        step: &DeletionStep,
        graph: &EntityGraph,
        outcome: &mut DeletionOutcome,
    ) -> Result<(), InfraError> {
        let ids = graph.ids_for(step);
        if ids.is_empty() {
            return Ok(());
        }

        match step.action {
            StepAction::Delete => {
                let count = self.store.delete_many(step.kind, ids).await?;
                outcome.record_deleted(step.kind, count);
            }
            StepAction::Nullify { column } => {
                let count = self.store.nullify_many(step.kind, column, ids).await?;
                outcome.record_nullified(step.kind, count);
            }
        }
        tracing::debug!(step = %step, ids = ids.len(), "ステップを実行しました");
        Ok(())
    }
}
