//! # DeletionPlanner
//!
//! 依存辺の宣言から、ルート種別ごとの削除順序を導出する純粋関数。I/O は行わない。
//!
//! ## アルゴリズム
//!
//! ルートから `Cascade` 辺を深さ優先でたどり、帰りがけ順（post-order）に
//! 削除ステップを積む。ある種別のステップは、その種別から到達可能な
//! すべての子孫のステップより後に来るため、子 → 親の順序が保証される。
//!
//! - 子は [`Schema`] の宣言順に巡回する
//! - 複数の親から到達する種別は、最初に到達した位置に 1 ステップだけ置き、
//!   ID の取得元にはプラン内で削除されるすべての親を列挙する
//! - `Nullify` 辺は再帰せず、親の削除ステップより前に NULL 更新ステップを置く
//!
//! `Cascade` 辺に循環がある場合はプランを拒否する（[`PlanError::CyclicDependency`]）。
//! `Nullify` 辺は外部キーを外すだけなので循環判定の対象外。

use std::collections::{HashMap, HashSet};

use strum::IntoEnumIterator;

use super::{
    PlanError,
    plan::{DeletionPlan, DeletionStep, IdSource, ParentLink, StepAction},
};
use crate::{
    entity::EntityKind,
    schema::{EdgeAction, Schema},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

/// 巡回中に積むステップ（ID 取得元は巡回完了後に確定する）
#[derive(Debug, Clone, Copy)]
enum PendingStep {
    Delete(EntityKind),
    Nullify(ParentLink, EntityKind),
}

/// 削除プランナー
#[derive(Debug, Clone, Default)]
pub struct DeletionPlanner {
    schema: Schema,
}

impl DeletionPlanner {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// ルート種別の削除プランを生成する
    pub fn plan_for(&self, root: EntityKind) -> Result<DeletionPlan, PlanError> {
        let mut state = HashMap::new();
        let mut path = Vec::new();
        let mut pending = Vec::new();
        self.visit(root, root, &mut state, &mut path, &mut pending)?;

        let deleted: HashSet<EntityKind> = pending
            .iter()
            .filter_map(|step| match step {
                PendingStep::Delete(kind) => Some(*kind),
                PendingStep::Nullify(..) => None,
            })
            .collect();

        let steps = pending
            .into_iter()
            .map(|step| match step {
                PendingStep::Delete(kind) => DeletionStep {
                    kind,
                    action: StepAction::Delete,
                    source: self.delete_source(root, kind, &deleted),
                    references: kind.reference_columns(),
                },
                PendingStep::Nullify(link, kind) => DeletionStep {
                    kind,
                    action: StepAction::Nullify {
                        column: link.foreign_key,
                    },
                    source: IdSource::ChildrenOf(vec![link]),
                    references: &[],
                },
            })
            .collect();

        Ok(DeletionPlan::new(root, steps))
    }

    /// 全種別のプランを生成し、循環がないことを検証する
    ///
    /// 起動時とテストで呼び出す。
    pub fn validate_all(&self) -> Result<(), PlanError> {
        for kind in EntityKind::iter() {
            self.plan_for(kind)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        root: EntityKind,
        kind: EntityKind,
        state: &mut HashMap<EntityKind, VisitState>,
        path: &mut Vec<EntityKind>,
        pending: &mut Vec<PendingStep>,
    ) -> Result<(), PlanError> {
        match state.get(&kind) {
            Some(VisitState::Done) => return Ok(()),
            Some(VisitState::InProgress) => {
                let start = path.iter().position(|k| *k == kind).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(kind);
                return Err(PlanError::CyclicDependency { root, cycle });
            }
            None => {}
        }

        state.insert(kind, VisitState::InProgress);
        path.push(kind);

        for edge in self.schema.children_of(kind) {
            match edge.action {
                EdgeAction::Cascade => self.visit(root, edge.child, state, path, pending)?,
                EdgeAction::Nullify => pending.push(PendingStep::Nullify(
                    ParentLink {
                        parent:      kind,
                        foreign_key: edge.foreign_key,
                    },
                    edge.child,
                )),
            }
        }

        path.pop();
        state.insert(kind, VisitState::Done);
        pending.push(PendingStep::Delete(kind));
        Ok(())
    }

    fn delete_source(
        &self,
        root: EntityKind,
        kind: EntityKind,
        deleted: &HashSet<EntityKind>,
    ) -> IdSource {
        if kind == root {
            return IdSource::Root;
        }
        let links = self
            .schema
            .parents_of(kind)
            .filter(|e| e.action == EdgeAction::Cascade && deleted.contains(&e.parent))
            .map(|e| ParentLink {
                parent:      e.parent,
                foreign_key: e.foreign_key,
            })
            .collect();
        IdSource::ChildrenOf(links)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::schema::DependencyEdge;

    fn planner() -> DeletionPlanner {
        DeletionPlanner::new(Schema::course_platform())
    }

    fn step_names(plan: &DeletionPlan) -> Vec<String> {
        plan.steps().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_コースのプランは子から親の順に並ぶ() {
        let plan = planner().plan_for(EntityKind::Course).unwrap();

        assert_eq!(
            step_names(&plan),
            vec![
                "delete assignment_submission",
                "delete assignment",
                "delete resource",
                "delete lesson_progress",
                "delete lesson",
                "delete chapter",
                "delete enrollment",
                "nullify live_lesson.course_id",
                "delete course",
            ]
        );
    }

    #[test]
    fn test_ユーザーのプランは所有コースを先に処理しsessionとaccountを最後に削除する() {
        let plan = planner().plan_for(EntityKind::User).unwrap();

        use EntityKind::*;
        assert_eq!(
            plan.delete_order(),
            vec![
                AssignmentSubmission,
                Assignment,
                Resource,
                LessonProgress,
                Lesson,
                Chapter,
                Enrollment,
                Course,
                Page,
                LiveLessonAttendee,
                LiveLesson,
                UserSettings,
                SecurityEvent,
                DeviceLog,
                DeviceTracking,
                PaymentLog,
                CodeRedemption,
                Session,
                Account,
                User,
            ]
        );
    }

    #[test]
    fn test_カテゴリのプランはコースを削除せず外部キーを外す() {
        let plan = planner().plan_for(EntityKind::Category).unwrap();

        assert_eq!(
            step_names(&plan),
            vec!["nullify course.category_id", "delete category"]
        );
        assert_eq!(
            plan.steps()[0].source,
            IdSource::ChildrenOf(vec![ParentLink {
                parent:      EntityKind::Category,
                foreign_key: "category_id",
            }])
        );
        assert!(plan.steps()[0].references.is_empty());
    }

    #[test]
    fn test_複数の親を持つ種別はプラン内のすべての親からidを集める() {
        let plan = planner().plan_for(EntityKind::User).unwrap();
        let step = &plan.steps()[plan.position_of(EntityKind::LessonProgress).unwrap()];

        assert_eq!(
            step.source,
            IdSource::ChildrenOf(vec![
                ParentLink {
                    parent:      EntityKind::User,
                    foreign_key: "user_id",
                },
                ParentLink {
                    parent:      EntityKind::Lesson,
                    foreign_key: "lesson_id",
                },
            ])
        );
    }

    #[test]
    fn test_プラン外の親はidの取得元に含めない() {
        let plan = planner().plan_for(EntityKind::Course).unwrap();
        let step = &plan.steps()[plan.position_of(EntityKind::Enrollment).unwrap()];

        assert_eq!(
            step.source,
            IdSource::ChildrenOf(vec![ParentLink {
                parent:      EntityKind::Course,
                foreign_key: "course_id",
            }])
        );
    }

    #[rstest]
    #[case(EntityKind::User)]
    #[case(EntityKind::Course)]
    #[case(EntityKind::Chapter)]
    #[case(EntityKind::LiveLesson)]
    #[case(EntityKind::Category)]
    fn test_すべての辺で子の削除が親の削除より前に来る(#[case] root: EntityKind) {
        let schema = Schema::course_platform();
        let plan = DeletionPlanner::new(schema.clone()).plan_for(root).unwrap();

        for edge in schema.edges() {
            let (Some(parent), Some(child)) = (
                plan.position_of(edge.parent),
                plan.position_of(edge.child),
            ) else {
                continue;
            };
            if edge.action == EdgeAction::Cascade {
                assert!(child < parent, "{} は {} より前に削除されるべき", edge.child, edge.parent);
            }
        }
    }

    #[test]
    fn test_ルートの削除ステップが最後に来る() {
        for kind in EntityKind::iter() {
            let plan = planner().plan_for(kind).unwrap();
            let last = plan.steps().last().unwrap();

            assert_eq!(last.kind, kind);
            assert!(last.is_delete());
            assert_eq!(last.source, IdSource::Root);
        }
    }

    #[test]
    fn test_葉の種別はルート単体のプランになる() {
        let plan = planner().plan_for(EntityKind::Session).unwrap();

        assert_eq!(step_names(&plan), vec!["delete session"]);
    }

    #[test]
    fn test_外部参照カラムが削除ステップに引き継がれる() {
        let plan = planner().plan_for(EntityKind::Chapter).unwrap();
        let step = &plan.steps()[plan.position_of(EntityKind::Lesson).unwrap()];

        assert_eq!(step.references, EntityKind::Lesson.reference_columns());
    }

    #[test]
    fn test_コースプラットフォームのスキーマは検証を通過する() {
        assert!(planner().validate_all().is_ok());
    }

    #[test]
    fn test_循環するスキーマはプランを拒否する() {
        let schema = Schema::new(vec![
            DependencyEdge::cascade(EntityKind::Course, EntityKind::Chapter, "course_id"),
            DependencyEdge::cascade(EntityKind::Chapter, EntityKind::Lesson, "chapter_id"),
            DependencyEdge::cascade(EntityKind::Lesson, EntityKind::Course, "lesson_id"),
        ]);
        let planner = DeletionPlanner::new(schema);

        let err = planner.plan_for(EntityKind::Chapter).unwrap_err();

        assert_eq!(
            err,
            PlanError::CyclicDependency {
                root:  EntityKind::Chapter,
                cycle: vec![
                    EntityKind::Chapter,
                    EntityKind::Lesson,
                    EntityKind::Course,
                    EntityKind::Chapter,
                ],
            }
        );
        assert!(planner.validate_all().is_err());
    }

    #[test]
    fn test_nullify辺は循環判定の対象外() {
        let schema = Schema::new(vec![
            DependencyEdge::cascade(EntityKind::Course, EntityKind::Chapter, "course_id"),
            DependencyEdge::nullify(EntityKind::Chapter, EntityKind::Course, "featured_chapter_id"),
        ]);

        let plan = DeletionPlanner::new(schema).plan_for(EntityKind::Course).unwrap();

        assert_eq!(
            step_names(&plan),
            vec!["nullify course.featured_chapter_id", "delete chapter", "delete course"]
        );
    }
}
