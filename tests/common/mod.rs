//! 集成测试公共设施
//!
//! MemoryStore 快捷构造 + 故障注入存储包装器

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ielts_test_builder::error::{AppError, AppResult, StoreError};
use ielts_test_builder::infrastructure::{EntityStore, MemoryStore};
use ielts_test_builder::models::{
    EntityData, EntityId, EntityRecord, EntitySummary, ListFilter, QuestionType, SectionKind,
    TestMetadata, VersionToken,
};
use ielts_test_builder::services::QuestionDraft;

/// 新建空的进程内存储
pub fn new_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// 创建一张试卷记录
pub async fn create_test<S: EntityStore>(store: &S, title: &str) -> EntityRecord {
    store
        .create(EntityData::Test {
            title: title.to_string(),
            metadata: TestMetadata::default(),
            sections: Default::default(),
        })
        .await
        .expect("创建试卷失败")
}

/// 创建一个未链接的 Section 记录
pub async fn create_section<S: EntityStore>(
    store: &S,
    kind: SectionKind,
    title: &str,
) -> EntityRecord {
    store
        .create(EntityData::Section {
            section_kind: kind,
            title: title.to_string(),
            payload_ref: None,
            part_ids: Vec::new(),
            test_id: None,
        })
        .await
        .expect("创建 Section 失败")
}

/// 创建一个未链接的 Part 记录
pub async fn create_part<S: EntityStore>(
    store: &S,
    kind: SectionKind,
    title: &str,
) -> EntityRecord {
    store
        .create(EntityData::Part {
            section_kind: kind,
            title: title.to_string(),
            question_ids: Vec::new(),
            groups: Vec::new(),
            section_id: None,
        })
        .await
        .expect("创建 Part 失败")
}

/// 创建一个写作任务记录
pub async fn create_writing_task<S: EntityStore>(store: &S, prompt: &str) -> EntityRecord {
    store
        .create(EntityData::WritingTask {
            writing_id: None,
            prompt: prompt.to_string(),
        })
        .await
        .expect("创建写作任务失败")
}

/// 构建题目草稿
pub fn draft(stem: &str) -> QuestionDraft {
    QuestionDraft {
        question_type: QuestionType::FillBlank,
        stem: stem.to_string(),
        answer_key: serde_json::Value::Null,
        imgs: None,
    }
}

/// 读取父节点当前的有序子 ID 列表
pub async fn child_ids<S: EntityStore>(store: &S, parent_id: &EntityId) -> Vec<EntityId> {
    store
        .get(parent_id)
        .await
        .expect("读取父节点失败")
        .data
        .child_ids()
}

/// 故障注入存储
///
/// 包装 MemoryStore，按开关让指定操作返回存储层错误，
/// 用于验证部分失败时的恢复顺序（回滚、CreatedButUnlinked）。
pub struct FailingStore {
    inner: MemoryStore,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
    fail_delete: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_create: AtomicBool::new(false),
            fail_update: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn fail_create(&self, on: bool) {
        self.fail_create.store(on, Ordering::SeqCst);
    }

    pub fn fail_update(&self, on: bool) {
        self.fail_update.store(on, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, on: bool) {
        self.fail_delete.store(on, Ordering::SeqCst);
    }

    fn injected(endpoint: &str) -> AppError {
        AppError::Store(StoreError::BadResponse {
            endpoint: endpoint.to_string(),
            code: Some(500),
            message: Some("注入的存储故障".to_string()),
        })
    }
}

impl EntityStore for FailingStore {
    async fn create(&self, data: EntityData) -> AppResult<EntityRecord> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::injected("entity/create"));
        }
        self.inner.create(data).await
    }

    async fn get(&self, id: &EntityId) -> AppResult<EntityRecord> {
        self.inner.get(id).await
    }

    async fn update(
        &self,
        id: &EntityId,
        data: EntityData,
        version: VersionToken,
    ) -> AppResult<EntityRecord> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(Self::injected("entity/update"));
        }
        self.inner.update(id, data, version).await
    }

    async fn delete(&self, id: &EntityId) -> AppResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::injected("entity/delete"));
        }
        self.inner.delete(id).await
    }

    async fn list(
        &self,
        parent_id: Option<&EntityId>,
        filter: &ListFilter,
    ) -> AppResult<Vec<EntitySummary>> {
        self.inner.list(parent_id, filter).await
    }
}
