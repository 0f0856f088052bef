//! # カスケード削除ユースケース
//!
//! `delete_entity(kind, id)` がカスケード削除の唯一の入口。
//!
//! ## 処理の流れ
//!
//! 1. 認可ポリシーで操作者を検証する
//! 2. ルート種別の削除プランを生成する
//! 3. カスケードロックを取得する（同時に実行できるカスケードは 1 つ）
//! 4. ロックを保持したままレコードグラフを読み込み、プランを実行する
//! 5. ロックを解放し、結果をビジネスイベントとして記録する

mod executor;
mod graph_reader;

use std::{collections::BTreeMap, sync::Arc};

pub use executor::CascadeExecutor;
pub use graph_reader::{EntityGraph, EntityGraphReader};
use learnhub_domain::{
    deletion::{CascadeError, CascadeState, DeletionOutcome, DeletionPlan, DeletionPlanner},
    entity::{EntityId, EntityKind, EntityRef},
};
use learnhub_infra::CascadeLock;
use learnhub_shared::{
    event_log::{self, event},
    log_business_event,
};

use super::authorization::{Actor, AuthorizationPolicy};
use crate::error::CoreError;

/// 削除のプレビュー
///
/// 実行せずに、削除されるレコードの件数と実行順を確認するために使う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPreview {
    pub root:             EntityRef,
    pub plan:             DeletionPlan,
    pub deleted_counts:   BTreeMap<EntityKind, usize>,
    pub nullified_counts: BTreeMap<EntityKind, usize>,
    pub reference_count:  usize,
}

/// カスケード削除ユースケースの実装
pub struct DeletionUseCaseImpl {
    planner:  DeletionPlanner,
    reader:   EntityGraphReader,
    executor: CascadeExecutor,
    policy:   Arc<dyn AuthorizationPolicy>,
    lock:     Arc<dyn CascadeLock>,
}

impl DeletionUseCaseImpl {
    pub fn new(
        planner: DeletionPlanner,
        reader: EntityGraphReader,
        executor: CascadeExecutor,
        policy: Arc<dyn AuthorizationPolicy>,
        lock: Arc<dyn CascadeLock>,
    ) -> Self {
        Self {
            planner,
            reader,
            executor,
            policy,
            lock,
        }
    }

    /// エンティティとその依存レコード・外部参照を削除する
    ///
    /// 冪等。既に存在しない対象は `root_not_found` 付きの成功として返す。
    ///
    /// # Errors
    ///
    /// - `CoreError::Forbidden`: 認可ポリシーが拒否した
    /// - `CoreError::Database`: ロックの取得、グラフの読み込みに失敗した
    ///
    /// 関係データベースの削除失敗はエラーではなく、`Failed` 状態の結果として返す。
    pub async fn delete_entity(
        &self,
        actor: &Actor,
        kind: EntityKind,
        id: EntityId,
    ) -> Result<DeletionOutcome, CoreError> {
        let target = EntityRef::new(kind, id);
        self.authorize(actor, &target)?;

        let plan = match self.planner.plan_for(kind) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(
                    error.category = event_log::error::category::INFRASTRUCTURE,
                    error.kind = event_log::error::kind::INTERNAL,
                    "削除プランを生成できません: {}",
                    e
                );
                let mut outcome = DeletionOutcome::new(target);
                outcome.record_fatal(CascadeError::from(e));
                return Ok(outcome);
            }
        };

        log_business_event!(
            event.category = event::category::DELETION,
            event.action = event::action::CASCADE_STARTED,
            event.entity_type = %kind,
            event.entity_id = %target.id,
            event.actor_role = %actor.role,
            event.steps = plan.steps().len(),
            "カスケード削除を開始"
        );

        let guard = self.lock.acquire().await?;
        let result = self.run_locked(&plan, &target).await;
        let released = guard.release().await;

        let outcome = result?;
        released?;

        Self::log_outcome(&outcome);
        Ok(outcome)
    }

    /// 削除を実行せずに、削除対象の件数と実行順を返す
    ///
    /// # Errors
    ///
    /// - `CoreError::Forbidden`: 認可ポリシーが拒否した
    /// - `CoreError::NotFound`: 対象が存在しない
    pub async fn preview(
        &self,
        actor: &Actor,
        kind: EntityKind,
        id: EntityId,
    ) -> Result<DeletionPreview, CoreError> {
        let target = EntityRef::new(kind, id);
        self.authorize(actor, &target)?;

        let plan = self
            .planner
            .plan_for(kind)
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        let graph = self
            .reader
            .load_descendants(&plan, &target.id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("{target} が見つかりません")))?;

        Ok(DeletionPreview {
            root: target,
            deleted_counts: graph.counts(),
            nullified_counts: graph.nullify_counts(),
            reference_count: graph.reference_count(),
            plan,
        })
    }

    fn authorize(&self, actor: &Actor, target: &EntityRef) -> Result<(), CoreError> {
        if let Err(e) = self.policy.authorize(actor, target) {
            log_business_event!(
                event.category = event::category::DELETION,
                event.action = event::action::CASCADE_DENIED,
                event.entity_type = %target.kind,
                event.entity_id = %target.id,
                event.actor_role = %actor.role,
                event.result = event::result::FAILURE,
                "カスケード削除を拒否"
            );
            return Err(e.into());
        }
        Ok(())
    }

    async fn run_locked(
        &self,
        plan: &DeletionPlan,
        target: &EntityRef,
    ) -> Result<DeletionOutcome, CoreError> {
        match self.reader.load_descendants(plan, &target.id).await? {
            Some(graph) => self.executor.execute(plan, &graph).await,
            None => {
                tracing::info!("{} は既に存在しません", target);
                Ok(DeletionOutcome::not_found(target.clone()))
            }
        }
    }

    fn log_outcome(outcome: &DeletionOutcome) {
        let state = outcome.state();
        let (action, result) = match state {
            CascadeState::Failed => (event::action::CASCADE_FAILED, event::result::FAILURE),
            CascadeState::PartiallySucceeded => {
                (event::action::CASCADE_COMPLETED, event::result::PARTIAL)
            }
            _ => (event::action::CASCADE_COMPLETED, event::result::SUCCESS),
        };

        log_business_event!(
            event.category = event::category::DELETION,
            event.action = action,
            event.result = result,
            event.entity_type = %outcome.root.kind,
            event.entity_id = %outcome.root.id,
            event.state = %state,
            event.deleted = outcome.total_deleted(),
            event.external_failures = outcome.external_delete_failures.len(),
            event.root_not_found = outcome.root_not_found,
            "カスケード削除を終了"
        );
    }
}
