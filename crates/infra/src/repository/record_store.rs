//! # RecordStore
//!
//! カスケード削除が必要とするレコード操作（検索、一括削除、外部キーの NULL 更新）を提供する。
//!
//! ## 設計方針
//!
//! - **実行時クエリ**: テーブル名・カラム名が種別ごとに変わるため、`sqlx::query!` ではなく
//!   `sqlx::query` で SQL を組み立てる。埋め込む識別子は [`EntityKind::table_name`] と
//!   スキーマ宣言の `&'static str` に限られ、さらに [`validate_identifier`] で検証する
//! - **一括操作**: ID の集合は `= ANY($1)` で 1 回のクエリにまとめる
//! - **参照整合性**: PostgreSQL の外部キー制約に任せる。
//!   削除順序の誤りは `InfraErrorKind::ForeignKeyViolation` として検出される

use std::collections::HashSet;

use async_trait::async_trait;
use learnhub_domain::{
    entity::{EntityId, EntityKind, EntityRef},
    reference::{ExternalReference, OwnedReference, ReferenceColumn},
};
use sqlx::{PgPool, Row};
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::error::InfraError;

/// レコードストアトレイト
///
/// カスケード削除と孤立ファイル掃除が使用するレコード操作を定義する。
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// レコードを ID で検索する
    ///
    /// # 戻り値
    ///
    /// - `Ok(Some(_))`: レコードが存在する
    /// - `Ok(None)`: レコードが存在しない
    async fn find_one(&self, kind: EntityKind, id: &EntityId)
    -> Result<Option<EntityRef>, InfraError>;

    /// `foreign_key` カラムが `parent_ids` のいずれかを参照する子レコードの ID を返す
    async fn find_child_ids(
        &self,
        kind: EntityKind,
        foreign_key: &str,
        parent_ids: &[EntityId],
    ) -> Result<Vec<EntityId>, InfraError>;

    /// レコードが保持する外部参照を返す
    ///
    /// NULL と空文字列のカラムは含めない。
    async fn find_references(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
        columns: &[ReferenceColumn],
    ) -> Result<Vec<OwnedReference>, InfraError>;

    /// レコードを一括削除し、削除件数を返す
    async fn delete_many(&self, kind: EntityKind, ids: &[EntityId]) -> Result<u64, InfraError>;

    /// `column` を NULL に更新し、更新件数を返す
    async fn nullify_many(
        &self,
        kind: EntityKind,
        column: &str,
        ids: &[EntityId],
    ) -> Result<u64, InfraError>;

    /// 現存するレコードが参照している外部参照キーをすべて返す
    ///
    /// 孤立ファイル掃除で、保存済みキーとの差分を取るために使う。
    async fn list_referenced_keys(&self) -> Result<HashSet<String>, InfraError>;
}

/// SQL に埋め込む識別子を検証する
///
/// 小文字英字で始まり、小文字英数字とアンダースコアのみを含む場合に許可する。
pub fn validate_identifier(identifier: &str) -> Result<(), InfraError> {
    let mut chars = identifier.chars();
    let valid_head = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let valid_tail = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid_head && valid_tail {
        Ok(())
    } else {
        Err(InfraError::invalid_input(format!(
            "不正な識別子です: {identifier:?}"
        )))
    }
}

/// 外部キー制約違反を [`InfraError::foreign_key_violation`] に変換する
fn foreign_key_violation_or(kind: EntityKind, error: sqlx::Error) -> InfraError {
    match error.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => InfraError::foreign_key_violation(
            kind.table_name(),
            format!(
                "{} から参照されています: {}",
                db.table().unwrap_or("不明なテーブル"),
                db.message()
            ),
        ),
        _ => InfraError::from(error),
    }
}

fn to_uuids(ids: &[EntityId]) -> Vec<Uuid> {
    ids.iter().map(|id| *id.as_uuid()).collect()
}

/// PostgreSQL 実装の RecordStore
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// 新しいレコードストアを作成する
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    #[tracing::instrument(skip(self), level = "debug", fields(%kind, %id))]
    async fn find_one(
        &self,
        kind: EntityKind,
        id: &EntityId,
    ) -> Result<Option<EntityRef>, InfraError> {
        let sql = format!("SELECT id FROM {} WHERE id = $1", kind.table_name());
        let found: Option<Uuid> = sqlx::query_scalar(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.map(|uuid| EntityRef::new(kind, EntityId::from_uuid(uuid))))
    }

    #[tracing::instrument(skip(self, parent_ids), level = "debug", fields(%kind, parents = parent_ids.len()))]
    async fn find_child_ids(
        &self,
        kind: EntityKind,
        foreign_key: &str,
        parent_ids: &[EntityId],
    ) -> Result<Vec<EntityId>, InfraError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        validate_identifier(foreign_key)?;

        let sql = format!(
            "SELECT id FROM {} WHERE {foreign_key} = ANY($1) ORDER BY id",
            kind.table_name()
        );
        let ids: Vec<Uuid> = sqlx::query_scalar(&sql)
            .bind(to_uuids(parent_ids))
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.into_iter().map(EntityId::from_uuid).collect())
    }

    #[tracing::instrument(skip(self, ids, columns), level = "debug", fields(%kind, ids = ids.len()))]
    async fn find_references(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
        columns: &[ReferenceColumn],
    ) -> Result<Vec<OwnedReference>, InfraError> {
        if ids.is_empty() || columns.is_empty() {
            return Ok(Vec::new());
        }
        for column in columns {
            validate_identifier(column.column)?;
        }

        let selected = columns
            .iter()
            .map(|c| c.column)
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT id, {selected} FROM {} WHERE id = ANY($1) ORDER BY id",
            kind.table_name()
        );
        let rows = sqlx::query(&sql)
            .bind(to_uuids(ids))
            .fetch_all(&self.pool)
            .await?;

        let mut references = Vec::new();
        for row in rows {
            let id: Uuid = row.try_get("id")?;
            for column in columns {
                let key: Option<String> = row.try_get(column.column)?;
                let Some(key) = key else { continue };
                let reference = ExternalReference::new(column.kind, key);
                if reference.is_empty() {
                    continue;
                }
                references.push(OwnedReference {
                    owner: EntityRef::new(kind, EntityId::from_uuid(id)),
                    column: column.column,
                    reference,
                });
            }
        }

        Ok(references)
    }

    #[tracing::instrument(skip(self, ids), fields(%kind, ids = ids.len()))]
    async fn delete_many(&self, kind: EntityKind, ids: &[EntityId]) -> Result<u64, InfraError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let sql = format!("DELETE FROM {} WHERE id = ANY($1)", kind.table_name());
        let result = sqlx::query(&sql)
            .bind(to_uuids(ids))
            .execute(&self.pool)
            .await
            .map_err(|e| foreign_key_violation_or(kind, e))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, ids), fields(%kind, ids = ids.len()))]
    async fn nullify_many(
        &self,
        kind: EntityKind,
        column: &str,
        ids: &[EntityId],
    ) -> Result<u64, InfraError> {
        if ids.is_empty() {
            return Ok(0);
        }
        validate_identifier(column)?;

        let sql = format!(
            "UPDATE {} SET {column} = NULL WHERE id = ANY($1) AND {column} IS NOT NULL",
            kind.table_name()
        );
        let result = sqlx::query(&sql)
            .bind(to_uuids(ids))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self))]
    async fn list_referenced_keys(&self) -> Result<HashSet<String>, InfraError> {
        let mut keys = HashSet::new();

        for kind in EntityKind::iter() {
            for column in kind.reference_columns() {
                validate_identifier(column.column)?;
                let sql = format!(
                    "SELECT {col} FROM {table} WHERE {col} IS NOT NULL AND btrim({col}) <> ''",
                    col = column.column,
                    table = kind.table_name()
                );
                let values: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
                keys.extend(values);
            }
        }

        Ok(keys)
    }
}
