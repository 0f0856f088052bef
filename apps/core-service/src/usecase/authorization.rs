//! # 削除の認可
//!
//! カスケード削除を要求した操作者が対象を削除してよいかを判定する。
//!
//! 認可は `delete_entity` の入口で 1 回だけ行い、カスケード実行器は認可を意識しない。
//! 操作者の情報は BFF が `X-Actor-Id` / `X-Actor-Role` ヘッダーで渡す。

use learnhub_domain::{
    DomainError,
    entity::{EntityId, EntityRef},
};
use serde::Serialize;
use strum::{Display, EnumString};

/// 操作者のロール
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ActorRole {
    /// 内部サービス（バッチ、他サービスからの呼び出し）
    Service,
    /// プラットフォーム管理者
    Admin,
    /// 一般ユーザー（講師・受講者）
    Member,
}

/// 削除を要求した操作者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id:   Option<EntityId>,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: Option<EntityId>, role: ActorRole) -> Self {
        Self { id, role }
    }

    /// 内部サービスとしての操作者
    pub fn service() -> Self {
        Self::new(None, ActorRole::Service)
    }
}

/// 認可ポリシー
pub trait AuthorizationPolicy: Send + Sync {
    /// `actor` が `target` を削除してよければ `Ok(())`
    ///
    /// # Errors
    ///
    /// - `DomainError::Forbidden`: 削除が許可されていない
    fn authorize(&self, actor: &Actor, target: &EntityRef) -> Result<(), DomainError>;
}

/// すべての削除を許可するポリシー
///
/// サービス間呼び出しのみを受け付ける構成で使用する。
pub struct AllowAllPolicy;

impl AuthorizationPolicy for AllowAllPolicy {
    fn authorize(&self, _actor: &Actor, _target: &EntityRef) -> Result<(), DomainError> {
        Ok(())
    }
}

/// 管理者と内部サービスにのみ削除を許可するポリシー
pub struct AdminOnlyPolicy;

impl AuthorizationPolicy for AdminOnlyPolicy {
    fn authorize(&self, actor: &Actor, target: &EntityRef) -> Result<(), DomainError> {
        match actor.role {
            ActorRole::Service | ActorRole::Admin => Ok(()),
            ActorRole::Member => Err(DomainError::Forbidden(format!(
                "{target} の削除には管理者権限が必要です"
            ))),
        }
    }
}
