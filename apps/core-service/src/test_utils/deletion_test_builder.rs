//! カスケード削除テストビルダー
//!
//! インメモリのレコードストアと外部ストレージのモックで、削除ユースケースと
//! 孤立ファイル掃除を組み立てる。フィクスチャの投入ヘルパーも提供する。

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use learnhub_domain::{
    clock::{Clock, ManualClock},
    deletion::DeletionPlanner,
    entity::{EntityId, EntityKind},
    schema::Schema,
};
use learnhub_infra::{
    InProcessCascadeLock,
    StorageGateway,
    mock::{InMemoryRecordStore, MockObjectStorage, MockVideoService, Record},
    storage::ReferenceBackend,
};

use crate::usecase::{
    AllowAllPolicy,
    AuthorizationPolicy,
    CascadeExecutor,
    DeletionUseCaseImpl,
    EntityGraphReader,
    OrphanSweeper,
};

/// カスケード削除テストのセットアップデータ
///
/// DeletionTestBuilder が生成する SUT とモックのセット。
/// モックはクローンしても状態を共有するため、SUT に渡したものをそのまま検証に使える。
pub struct DeletionTestSetup {
    pub usecase: Arc<DeletionUseCaseImpl>,
    pub sweeper: Arc<OrphanSweeper>,
    pub store:   Arc<InMemoryRecordStore>,
    pub objects: MockObjectStorage,
    pub videos:  MockVideoService,
    pub lock:    InProcessCascadeLock,
    pub clock:   Arc<ManualClock>,
}

/// コースのフィクスチャ
#[derive(Debug, Clone)]
pub struct CourseFixture {
    pub course:   EntityId,
    pub chapters: Vec<EntityId>,
    /// チャプター順に並んだレッスン
    pub lessons:  Vec<EntityId>,
}

/// カスケード削除テストビルダー
///
/// # 使用例
///
/// ```ignore
/// use learnhub_core_service::test_utils::DeletionTestBuilder;
///
/// #[tokio::test]
/// async fn test_example() {
///     let setup = DeletionTestBuilder::new().build();
///     let owner = setup.seed_user();
///     let course = setup.seed_course(&owner, 2, 3);
///
///     let outcome = setup
///         .usecase
///         .delete_entity(&Actor::service(), EntityKind::Course, course.course)
///         .await
///         .unwrap();
/// }
/// ```
pub struct DeletionTestBuilder {
    schema:        Schema,
    policy:        Arc<dyn AuthorizationPolicy>,
    concurrency:   usize,
    call_timeout:  Duration,
    storage_delay: Option<Duration>,
    now:           DateTime<Utc>,
    sweep_prefix:  String,
    sweep_grace:   Duration,
}

impl DeletionTestBuilder {
    /// デフォルト値で新しいビルダーを作成
    pub fn new() -> Self {
        Self {
            schema:        Schema::course_platform(),
            policy:        Arc::new(AllowAllPolicy),
            concurrency:   4,
            call_timeout:  Duration::from_secs(1),
            storage_delay: None,
            now:           Utc
                .with_ymd_and_hms(2026, 4, 1, 9, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            sweep_prefix:  String::new(),
            sweep_grace:   Duration::from_secs(24 * 60 * 60),
        }
    }

    /// 認可ポリシーを指定
    pub fn with_policy(mut self, policy: Arc<dyn AuthorizationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// スキーマを指定
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// 外部参照削除の並行数を指定
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// 外部ストレージの応答を遅延させ、呼び出しタイムアウトを指定
    pub fn with_slow_storage(mut self, delay: Duration, call_timeout: Duration) -> Self {
        self.storage_delay = Some(delay);
        self.call_timeout = call_timeout;
        self
    }

    /// 孤立ファイル掃除の対象プレフィックスを指定
    pub fn with_sweep_prefix(mut self, prefix: &str) -> Self {
        self.sweep_prefix = prefix.to_string();
        self
    }

    /// ビルダーの now を取得
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// SUT とモックを構築
    pub fn build(&self) -> DeletionTestSetup {
        let store = Arc::new(InMemoryRecordStore::with_schema(self.schema.clone()));
        let (objects, videos) = match self.storage_delay {
            Some(delay) => (
                MockObjectStorage::new().with_delay(delay),
                MockVideoService::new().with_delay(delay),
            ),
            None => (MockObjectStorage::new(), MockVideoService::new()),
        };
        let storage = StorageGateway::new(
            Arc::new(objects.clone()),
            Arc::new(videos.clone()),
            self.call_timeout,
        );
        let lock = InProcessCascadeLock::new();
        let clock = Arc::new(ManualClock::new(self.now));

        let usecase = DeletionUseCaseImpl::new(
            DeletionPlanner::new(self.schema.clone()),
            EntityGraphReader::new(store.clone()),
            CascadeExecutor::new(store.clone(), storage.clone(), self.concurrency),
            self.policy.clone(),
            Arc::new(lock.clone()),
        );
        let sweeper = OrphanSweeper::new(
            store.clone(),
            storage,
            clock.clone(),
            self.sweep_prefix.clone(),
            self.sweep_grace,
        );

        DeletionTestSetup {
            usecase: Arc::new(usecase),
            sweeper: Arc::new(sweeper),
            store,
            objects,
            videos,
            lock,
            clock,
        }
    }
}

impl Default for DeletionTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeletionTestSetup {
    /// ユーザーを投入する
    pub fn seed_user(&self) -> EntityId {
        let id = EntityId::new();
        self.store.insert(Record::new(EntityKind::User, &id));
        id
    }

    /// 外部参照を持たないコースを、チャプターとレッスン付きで投入する
    pub fn seed_course(
        &self,
        owner: &EntityId,
        chapters: usize,
        lessons_per_chapter: usize,
    ) -> CourseFixture {
        let course = EntityId::new();
        self.store
            .insert(Record::new(EntityKind::Course, &course).with_parent("owner_id", owner));

        let mut fixture = CourseFixture {
            course,
            chapters: Vec::new(),
            lessons: Vec::new(),
        };
        for _ in 0..chapters {
            let chapter = EntityId::new();
            self.store.insert(
                Record::new(EntityKind::Chapter, &chapter).with_parent("course_id", &fixture.course),
            );
            for _ in 0..lessons_per_chapter {
                let lesson = EntityId::new();
                self.store
                    .insert(Record::new(EntityKind::Lesson, &lesson).with_parent("chapter_id", &chapter));
                fixture.lessons.push(lesson);
            }
            fixture.chapters.push(chapter);
        }
        fixture
    }

    /// 受講登録を投入する
    pub fn seed_enrollment(&self, course: &EntityId, user: &EntityId) -> EntityId {
        let id = EntityId::new();
        self.store.insert(
            Record::new(EntityKind::Enrollment, &id)
                .with_parent("course_id", course)
                .with_parent("user_id", user),
        );
        id
    }

    /// レコードの外部参照を設定し、同じキーのファイルを外部ストレージに保存する
    ///
    /// UUID 形式のキーは動画サービス、それ以外はオブジェクトストレージに保存する。
    ///
    /// # Panics
    ///
    /// 別のレコードが既に同じキーを参照している場合（参照は 1 レコードが専有する）
    pub fn attach(&self, kind: EntityKind, id: &EntityId, column: &'static str, key: &str) {
        if let Some(owners) = self.store.reference_owners().get(key) {
            panic!("{key} は既に {owners:?} が参照している");
        }
        self.store.set_reference(kind, id, column, key);
        let uploaded_at = self.clock.now();
        match ReferenceBackend::detect(key) {
            ReferenceBackend::VideoService => self.videos.put(key, uploaded_at),
            ReferenceBackend::ObjectStorage => self.objects.put(key, uploaded_at),
        }
    }
}
