//! # EntityGraphReader
//!
//! 削除プランに従って、ルートから到達可能なレコードの ID と外部参照を読み込む。
//!
//! プランは子 → 親の順に並んでいるため、逆順にたどれば親の ID が子より先に確定する。
//! 各ステップの ID は、プラン内の親の ID を外部キーで参照する子の和集合。

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use itertools::Itertools;
use learnhub_domain::{
    deletion::{DeletionPlan, DeletionStep, IdSource, ParentLink, StepAction},
    entity::{EntityId, EntityKind, EntityRef},
    reference::OwnedReference,
};
use learnhub_infra::{InfraError, RecordStore};

/// 削除対象のレコードグラフ
///
/// カスケードロックを保持している間に読み込み、同じロックの中で実行する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityGraph {
    root:            EntityRef,
    ids:             HashMap<EntityKind, Vec<EntityId>>,
    nullify_targets: HashMap<(EntityKind, &'static str), Vec<EntityId>>,
    references:      HashMap<EntityKind, Vec<OwnedReference>>,
}

impl EntityGraph {
    fn new(root: EntityRef) -> Self {
        Self {
            root,
            ids: HashMap::new(),
            nullify_targets: HashMap::new(),
            references: HashMap::new(),
        }
    }

    pub fn root(&self) -> &EntityRef {
        &self.root
    }

    /// 削除対象の ID
    pub fn ids(&self, kind: EntityKind) -> &[EntityId] {
        self.ids.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// 外部キーを NULL にする行の ID
    pub fn nullify_targets(&self, kind: EntityKind, column: &str) -> &[EntityId] {
        self.nullify_targets
            .iter()
            .find(|((k, c), _)| *k == kind && *c == column)
            .map(|(_, ids)| ids.as_slice())
            .unwrap_or_default()
    }

    /// ステップが操作する行の ID
    pub fn ids_for(&self, step: &DeletionStep) -> &[EntityId] {
        match step.action {
            StepAction::Delete => self.ids(step.kind),
            StepAction::Nullify { column } => self.nullify_targets(step.kind, column),
        }
    }

    /// 削除対象のレコードが所有する外部参照
    pub fn references(&self, kind: EntityKind) -> &[OwnedReference] {
        self.references
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// 種別ごとの削除予定件数（0 件の種別は含めない）
    pub fn counts(&self) -> BTreeMap<EntityKind, usize> {
        self.ids
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(kind, ids)| (*kind, ids.len()))
            .collect()
    }

    /// 種別ごとの NULL 更新予定件数（0 件の種別は含めない）
    pub fn nullify_counts(&self) -> BTreeMap<EntityKind, usize> {
        let mut counts = BTreeMap::new();
        for ((kind, _), ids) in &self.nullify_targets {
            if !ids.is_empty() {
                *counts.entry(*kind).or_default() += ids.len();
            }
        }
        counts
    }

    /// 削除を試行する外部参照の総数
    pub fn reference_count(&self) -> usize {
        self.references.values().map(Vec::len).sum()
    }
}

/// レコードグラフの読み込み
pub struct EntityGraphReader {
    store: Arc<dyn RecordStore>,
}

impl EntityGraphReader {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// ルートとその子孫を読み込む
    ///
    /// # 戻り値
    ///
    /// - `Ok(Some(_))`: 削除対象のグラフ
    /// - `Ok(None)`: ルートのレコードが存在しない
    #[tracing::instrument(skip(self, plan), fields(root = %plan.root()))]
    pub async fn load_descendants(
        &self,
        plan: &DeletionPlan,
        root_id: &EntityId,
    ) -> Result<Option<EntityGraph>, InfraError> {
        let Some(root) = self.store.find_one(plan.root(), root_id).await? else {
            return Ok(None);
        };

        let mut graph = EntityGraph::new(root);
        for step in plan.steps().iter().rev() {
            let ids = match &step.source {
                IdSource::Root => vec![graph.root.id.clone()],
                IdSource::ChildrenOf(links) => self.find_children(step.kind, links, &graph).await?,
            };

            match step.action {
                StepAction::Delete => {
                    if !step.references.is_empty() && !ids.is_empty() {
                        let references = self
                            .store
                            .find_references(step.kind, &ids, step.references)
                            .await?;
                        graph.references.insert(step.kind, references);
                    }
                    graph.ids.insert(step.kind, ids);
                }
                StepAction::Nullify { column } => {
                    graph.nullify_targets.insert((step.kind, column), ids);
                }
            }
        }

        tracing::debug!(counts = ?graph.counts(), "削除対象を読み込みました");
        Ok(Some(graph))
    }

    async fn find_children(
        &self,
        kind: EntityKind,
        links: &[ParentLink],
        graph: &EntityGraph,
    ) -> Result<Vec<EntityId>, InfraError> {
        let mut found = Vec::new();
        for link in links {
            let parent_ids = graph.ids(link.parent);
            if parent_ids.is_empty() {
                continue;
            }
            found.extend(
                self.store
                    .find_child_ids(kind, link.foreign_key, parent_ids)
                    .await?,
            );
        }
        Ok(found.into_iter().unique().collect())
    }
}
