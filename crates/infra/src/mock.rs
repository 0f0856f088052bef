//! # テスト用モック
//!
//! ユースケーステストで使用するインメモリのレコードストアと外部ストレージ。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! learnhub-infra = { workspace = true, features = ["test-utils"] }
//! ```
//!
//! [`InMemoryRecordStore`] は PostgreSQL の外部キー制約を再現する。
//! 子レコードが残っている親を削除しようとすると `ForeignKeyViolation` を返すため、
//! 削除順序の誤りをテストで検出できる。

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learnhub_domain::{
    entity::{EntityId, EntityKind, EntityRef},
    reference::{ExternalReference, OwnedReference, ReferenceColumn},
    schema::Schema,
};

use crate::{
    error::InfraError,
    repository::RecordStore,
    storage::{DeleteResult, ListPage, ObjectStorage, StoredObject, VideoService},
};

// ===== InMemoryRecordStore =====

/// 挿入用のレコード
#[derive(Debug, Clone)]
pub struct Record {
    kind:         EntityKind,
    id:           EntityId,
    foreign_keys: HashMap<&'static str, Option<EntityId>>,
    references:   HashMap<&'static str, String>,
}

impl Record {
    pub fn new(kind: EntityKind, id: &EntityId) -> Self {
        Self {
            kind,
            id: id.clone(),
            foreign_keys: HashMap::new(),
            references: HashMap::new(),
        }
    }

    /// 外部キーを設定する
    pub fn with_parent(mut self, foreign_key: &'static str, parent: &EntityId) -> Self {
        self.foreign_keys.insert(foreign_key, Some(parent.clone()));
        self
    }

    /// 外部参照カラムを設定する
    pub fn with_reference(mut self, column: &'static str, key: impl Into<String>) -> Self {
        self.references.insert(column, key.into());
        self
    }
}

/// レコードストアに対して実行された書き込み操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    Delete {
        kind:  EntityKind,
        count: u64,
    },
    Nullify {
        kind:   EntityKind,
        column: &'static str,
        count:  u64,
    },
}

#[derive(Default)]
struct StoreState {
    rows:            BTreeMap<EntityKind, Vec<Record>>,
    operations:      Vec<StoreOperation>,
    failing_deletes: HashSet<EntityKind>,
    key_snapshots:   VecDeque<HashSet<String>>,
}

impl StoreState {
    fn find(&self, kind: EntityKind, id: &EntityId) -> Option<&Record> {
        self.rows.get(&kind)?.iter().find(|r| &r.id == id)
    }

    /// `kind` の行 `id` を外部キーで参照している行があればそのテーブル名を返す
    fn referencing_table(
        &self,
        schema: &Schema,
        kind: EntityKind,
        id: &EntityId,
    ) -> Option<&'static str> {
        schema.children_of(kind).find_map(|edge| {
            let referenced = self.rows.get(&edge.child)?.iter().any(|row| {
                row.foreign_keys
                    .get(edge.foreign_key)
                    .is_some_and(|fk| fk.as_ref() == Some(id))
            });
            referenced.then_some(edge.child.table_name())
        })
    }
}

/// インメモリのレコードストア
///
/// スキーマの依存辺から外部キー制約を導出する。
#[derive(Clone)]
pub struct InMemoryRecordStore {
    schema: Schema,
    state:  Arc<Mutex<StoreState>>,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::with_schema(Schema::course_platform())
    }

    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            state: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    /// レコードを挿入する
    ///
    /// # Panics
    ///
    /// 外部キーの参照先が存在しない場合（フィクスチャの誤り）
    pub fn insert(&self, record: Record) {
        let mut state = self.state.lock().unwrap();
        for (foreign_key, parent_id) in &record.foreign_keys {
            let Some(parent_id) = parent_id else { continue };
            let edge = self
                .schema
                .parents_of(record.kind)
                .find(|e| e.foreign_key == *foreign_key)
                .unwrap_or_else(|| panic!("{}.{foreign_key} は宣言されていない外部キー", record.kind));
            assert!(
                state.find(edge.parent, parent_id).is_some(),
                "{}.{foreign_key} の参照先 {}:{parent_id} が存在しない",
                record.kind,
                edge.parent
            );
        }
        state.rows.entry(record.kind).or_default().push(record);
    }

    /// 指定種別の `delete_many` を失敗させる
    pub fn fail_delete_on(&self, kind: EntityKind) {
        self.state.lock().unwrap().failing_deletes.insert(kind);
    }

    /// 外部参照カラムの値を書き換える
    pub fn set_reference(&self, kind: EntityKind, id: &EntityId, column: &'static str, key: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state
            .rows
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|r| &r.id == id))
        {
            row.references.insert(column, key.to_string());
        }
    }

    /// 次回の `list_referenced_keys` が返す集合を差し込む
    ///
    /// 差し込んだ集合がなくなると、保存済みの行から計算する。
    pub fn push_referenced_keys_snapshot(&self, keys: HashSet<String>) {
        self.state.lock().unwrap().key_snapshots.push_back(keys);
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.state.lock().unwrap().rows.get(&kind).map_or(0, Vec::len)
    }

    pub fn total_count(&self) -> usize {
        self.state.lock().unwrap().rows.values().map(Vec::len).sum()
    }

    pub fn contains(&self, kind: EntityKind, id: &EntityId) -> bool {
        self.state.lock().unwrap().find(kind, id).is_some()
    }

    /// 外部キーの現在値（NULL 更新済みなら `None`）
    pub fn foreign_key(&self, kind: EntityKind, id: &EntityId, column: &str) -> Option<EntityId> {
        self.state
            .lock()
            .unwrap()
            .find(kind, id)
            .and_then(|r| r.foreign_keys.get(column).cloned().flatten())
    }

    /// 実行された書き込み操作（実行順）
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// 保存済みの行が持つ外部参照キーごとの所有者
    pub fn reference_owners(&self) -> BTreeMap<String, Vec<EntityRef>> {
        let state = self.state.lock().unwrap();
        let mut owners: BTreeMap<String, Vec<EntityRef>> = BTreeMap::new();
        for row in state.rows.values().flatten() {
            for key in row.references.values().filter(|key| !key.trim().is_empty()) {
                owners
                    .entry(key.clone())
                    .or_default()
                    .push(EntityRef::new(row.kind, row.id.clone()));
            }
        }
        owners
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_one(
        &self,
        kind: EntityKind,
        id: &EntityId,
    ) -> Result<Option<EntityRef>, InfraError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .find(kind, id)
            .map(|r| EntityRef::new(kind, r.id.clone())))
    }

    async fn find_child_ids(
        &self,
        kind: EntityKind,
        foreign_key: &str,
        parent_ids: &[EntityId],
    ) -> Result<Vec<EntityId>, InfraError> {
        let state = self.state.lock().unwrap();
        let Some(rows) = state.rows.get(&kind) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter(|r| {
                r.foreign_keys
                    .get(foreign_key)
                    .and_then(Option::as_ref)
                    .is_some_and(|fk| parent_ids.contains(fk))
            })
            .map(|r| r.id.clone())
            .collect())
    }

    async fn find_references(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
        columns: &[ReferenceColumn],
    ) -> Result<Vec<OwnedReference>, InfraError> {
        let state = self.state.lock().unwrap();
        let mut references = Vec::new();
        for id in ids {
            let Some(row) = state.find(kind, id) else { continue };
            for column in columns {
                let Some(key) = row.references.get(column.column) else {
                    continue;
                };
                let reference = ExternalReference::new(column.kind, key.clone());
                if reference.is_empty() {
                    continue;
                }
                references.push(OwnedReference {
                    owner: EntityRef::new(kind, id.clone()),
                    column: column.column,
                    reference,
                });
            }
        }
        Ok(references)
    }

    async fn delete_many(&self, kind: EntityKind, ids: &[EntityId]) -> Result<u64, InfraError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(&kind) {
            return Err(InfraError::unexpected(format!(
                "{} の削除で障害が発生しました",
                kind.table_name()
            )));
        }
        if ids.is_empty() {
            return Ok(0);
        }
        for id in ids {
            if let Some(table) = state.referencing_table(&self.schema, kind, id) {
                return Err(InfraError::foreign_key_violation(
                    kind.table_name(),
                    format!("{kind}:{id} は {table} から参照されています"),
                ));
            }
        }

        let rows = state.rows.entry(kind).or_default();
        let before = rows.len();
        rows.retain(|r| !ids.contains(&r.id));
        let count = (before - rows.len()) as u64;
        state.operations.push(StoreOperation::Delete { kind, count });
        Ok(count)
    }

    async fn nullify_many(
        &self,
        kind: EntityKind,
        column: &str,
        ids: &[EntityId],
    ) -> Result<u64, InfraError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.lock().unwrap();
        let mut count = 0;
        let mut nullified_column = None;
        for row in state.rows.entry(kind).or_default() {
            if !ids.contains(&row.id) {
                continue;
            }
            let Some((name, value)) = row.foreign_keys.iter_mut().find(|(name, _)| **name == column)
            else {
                continue;
            };
            if value.take().is_some() {
                nullified_column = Some(*name);
                count += 1;
            }
        }
        if let Some(column) = nullified_column {
            state.operations.push(StoreOperation::Nullify {
                kind,
                column,
                count,
            });
        }
        Ok(count)
    }

    async fn list_referenced_keys(&self) -> Result<HashSet<String>, InfraError> {
        let mut state = self.state.lock().unwrap();
        if let Some(snapshot) = state.key_snapshots.pop_front() {
            return Ok(snapshot);
        }
        Ok(state
            .rows
            .values()
            .flatten()
            .flat_map(|r| r.references.values())
            .filter(|key| !key.trim().is_empty())
            .cloned()
            .collect())
    }
}

// ===== MockObjectStorage / MockVideoService =====

#[derive(Default)]
struct BucketState {
    stored:   BTreeMap<String, DateTime<Utc>>,
    failures: HashMap<String, DeleteResult>,
    calls:    Vec<String>,
}

/// 外部ストレージモックの共通実装
#[derive(Clone, Default)]
struct MockBucket {
    state:     Arc<Mutex<BucketState>>,
    delay:     Option<Duration>,
    page_size: Option<usize>,
}

impl MockBucket {
    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn delete(&self, key: &str) -> DeleteResult {
        self.wait().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(key.to_string());
        if let Some(failure) = state.failures.get(key) {
            return failure.clone();
        }
        match state.stored.remove(key) {
            Some(_) => DeleteResult::Ok,
            None => DeleteResult::NotFound,
        }
    }

    /// キー順で `cursor` より後ろの 1 ページを返す
    ///
    /// カーソルはページ最後のキー。
    async fn list_page(&self, prefix: &str, cursor: Option<&str>) -> ListPage {
        self.wait().await;
        let state = self.state.lock().unwrap();
        let page_size = self.page_size.unwrap_or(usize::MAX);
        let mut remaining = state
            .stored
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| cursor.is_none_or(|cursor| key.as_str() > cursor));

        let objects: Vec<StoredObject> = remaining
            .by_ref()
            .take(page_size)
            .map(|(key, at)| StoredObject::new(key.clone(), *at))
            .collect();
        let next_cursor = match (remaining.next(), objects.last()) {
            (Some(_), Some(last)) => Some(last.key.clone()),
            _ => None,
        };
        ListPage {
            objects,
            next_cursor,
        }
    }

    fn put(&self, key: &str, last_modified: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .stored
            .insert(key.to_string(), last_modified);
    }

    fn fail_key(&self, key: &str, result: DeleteResult) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(key.to_string(), result);
    }

    fn contains(&self, key: &str) -> bool {
        self.state.lock().unwrap().stored.contains_key(key)
    }

    fn delete_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

/// オブジェクトストレージのモック
///
/// 保存済みのキーを削除すると `Ok`、存在しないキーは `NotFound` を返す。
#[derive(Clone, Default)]
pub struct MockObjectStorage {
    bucket: MockBucket,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 各呼び出し（一覧は 1 ページごと）の前に待機する
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.bucket.delay = Some(delay);
        self
    }

    /// 一覧の 1 ページの件数を指定する
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.bucket.page_size = Some(page_size);
        self
    }

    pub fn put(&self, key: &str, last_modified: DateTime<Utc>) {
        self.bucket.put(key, last_modified);
    }

    /// 指定キーの削除を常に `result` で失敗させる
    pub fn fail_key(&self, key: &str, result: DeleteResult) {
        self.bucket.fail_key(key, result);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.bucket.contains(key)
    }

    /// 削除呼び出しを受けたキー（呼び出し順）
    pub fn delete_calls(&self) -> Vec<String> {
        self.bucket.delete_calls()
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn delete_object(&self, key: &str) -> DeleteResult {
        self.bucket.delete(key).await
    }

    async fn list_objects_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
    ) -> Result<ListPage, InfraError> {
        Ok(self.bucket.list_page(prefix, cursor).await)
    }
}

/// 動画配信サービスのモック
#[derive(Clone, Default)]
pub struct MockVideoService {
    bucket: MockBucket,
}

impl MockVideoService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 各呼び出し（一覧は 1 ページごと）の前に待機する
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.bucket.delay = Some(delay);
        self
    }

    /// 一覧の 1 ページの件数を指定する
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.bucket.page_size = Some(page_size);
        self
    }

    pub fn put(&self, video_id: &str, uploaded_at: DateTime<Utc>) {
        self.bucket.put(video_id, uploaded_at);
    }

    /// 指定動画の削除を常に `result` で失敗させる
    pub fn fail_key(&self, video_id: &str, result: DeleteResult) {
        self.bucket.fail_key(video_id, result);
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.bucket.contains(video_id)
    }

    /// 削除呼び出しを受けた動画 ID（呼び出し順）
    pub fn delete_calls(&self) -> Vec<String> {
        self.bucket.delete_calls()
    }
}

#[async_trait]
impl VideoService for MockVideoService {
    async fn delete_video(&self, video_id: &str) -> DeleteResult {
        self.bucket.delete(video_id).await
    }

    async fn list_videos_page(&self, cursor: Option<&str>) -> Result<ListPage, InfraError> {
        Ok(self.bucket.list_page("", cursor).await)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::InfraErrorKind;

    #[tokio::test]
    async fn test_子レコードが残る親の削除は外部キー違反になる() {
        let store = InMemoryRecordStore::new();
        let course = EntityId::new();
        let chapter = EntityId::new();
        let owner = EntityId::new();
        store.insert(Record::new(EntityKind::User, &owner));
        store.insert(Record::new(EntityKind::Course, &course).with_parent("owner_id", &owner));
        store.insert(Record::new(EntityKind::Chapter, &chapter).with_parent("course_id", &course));

        let err = store
            .delete_many(EntityKind::Course, &[course.clone()])
            .await
            .unwrap_err();

        assert!(matches!(
            err.kind(),
            InfraErrorKind::ForeignKeyViolation { table: "courses", .. }
        ));
        assert!(store.contains(EntityKind::Course, &course));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn test_nullify後は親を削除できる() {
        let store = InMemoryRecordStore::new();
        let owner = EntityId::new();
        let category = EntityId::new();
        let course = EntityId::new();
        store.insert(Record::new(EntityKind::User, &owner));
        store.insert(Record::new(EntityKind::Category, &category));
        store.insert(
            Record::new(EntityKind::Course, &course)
                .with_parent("owner_id", &owner)
                .with_parent("category_id", &category),
        );

        let nullified = store
            .nullify_many(EntityKind::Course, "category_id", &[course.clone()])
            .await
            .unwrap();
        let deleted = store
            .delete_many(EntityKind::Category, &[category])
            .await
            .unwrap();

        assert_eq!(nullified, 1);
        assert_eq!(deleted, 1);
        assert_eq!(store.foreign_key(EntityKind::Course, &course, "category_id"), None);
        assert_eq!(
            store.operations(),
            vec![
                StoreOperation::Nullify {
                    kind:   EntityKind::Course,
                    column: "category_id",
                    count:  1,
                },
                StoreOperation::Delete {
                    kind:  EntityKind::Category,
                    count: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_空キーは参照として返さない() {
        let store = InMemoryRecordStore::new();
        let user = EntityId::new();
        store.insert(Record::new(EntityKind::User, &user).with_reference("avatar_key", " "));

        let references = store
            .find_references(
                EntityKind::User,
                &[user],
                EntityKind::User.reference_columns(),
            )
            .await
            .unwrap();

        assert!(references.is_empty());
        assert!(store.list_referenced_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_存在しないキーの削除はnot_foundを返す() {
        let storage = MockObjectStorage::new();
        storage.put("a.png", Utc::now());

        assert_eq!(storage.delete_object("a.png").await, DeleteResult::Ok);
        assert_eq!(storage.delete_object("a.png").await, DeleteResult::NotFound);
        assert_eq!(storage.delete_calls(), vec!["a.png", "a.png"]);
    }
}
