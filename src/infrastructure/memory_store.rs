//! 进程内实体存储 - 基础设施层
//!
//! 以 ID 为键的竞技场式存储（arena）：实体记录放在一张映射表里，
//! 父子关系只通过记录内的有序 ID 列表表达。
//! 测试与离线草稿会话使用，版本语义与远端存储一致。

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infrastructure::entity_store::EntityStore;
use crate::models::{EntityData, EntityId, EntityRecord, EntitySummary, ListFilter, VersionToken};

/// 进程内实体存储
pub struct MemoryStore {
    records: Mutex<HashMap<EntityId, EntityRecord>>,
}

impl MemoryStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// 当前记录总数
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    fn matches_filter(record: &EntityRecord, filter: &ListFilter) -> bool {
        if let Some(kind) = filter.entity_kind {
            if record.data.kind() != kind {
                return false;
            }
        }
        if let Some(keyword) = &filter.title_contains {
            if !record.data.title().contains(keyword.as_str()) {
                return false;
            }
        }
        true
    }

    fn summarize(record: &EntityRecord) -> EntitySummary {
        EntitySummary {
            id: record.id.clone(),
            entity_kind: record.data.kind(),
            title: record.data.title().to_string(),
            version: record.version,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore for MemoryStore {
    async fn create(&self, data: EntityData) -> AppResult<EntityRecord> {
        let now = Utc::now();
        let record = EntityRecord {
            id: EntityId::mint(),
            version: VersionToken::initial(),
            created_at: now,
            updated_at: now,
            data,
        };

        debug!("创建实体: {} ({})", record.id, record.data.kind());

        let mut records = self.records.lock().await;
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &EntityId) -> AppResult<EntityRecord> {
        let records = self.records.lock().await;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::store_not_found(id.as_str()))
    }

    async fn update(
        &self,
        id: &EntityId,
        data: EntityData,
        version: VersionToken,
    ) -> AppResult<EntityRecord> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| AppError::store_not_found(id.as_str()))?;

        // 乐观并发：令牌不一致即拒绝
        if record.version != version {
            return Err(AppError::stale_version(
                id.as_str(),
                version.0,
                record.version.0,
            ));
        }

        record.data = data;
        record.version = record.version.next();
        record.updated_at = Utc::now();

        debug!("更新实体: {} -> 版本 {}", id, record.version.0);

        Ok(record.clone())
    }

    async fn delete(&self, id: &EntityId) -> AppResult<()> {
        let mut records = self.records.lock().await;
        if records.remove(id).is_none() {
            return Err(AppError::store_not_found(id.as_str()));
        }
        debug!("删除实体: {}", id);
        Ok(())
    }

    async fn list(
        &self,
        parent_id: Option<&EntityId>,
        filter: &ListFilter,
    ) -> AppResult<Vec<EntitySummary>> {
        let records = self.records.lock().await;

        match parent_id {
            Some(parent_id) => {
                let parent = records
                    .get(parent_id)
                    .ok_or_else(|| AppError::store_not_found(parent_id.as_str()))?;

                // 按父节点的有序子列表返回，列表顺序即展示顺序
                let summaries = parent
                    .data
                    .child_ids()
                    .iter()
                    .filter_map(|child_id| records.get(child_id))
                    .filter(|record| Self::matches_filter(record, filter))
                    .map(Self::summarize)
                    .collect();
                Ok(summaries)
            }
            None => {
                let mut summaries: Vec<EntitySummary> = records
                    .values()
                    .filter(|record| Self::matches_filter(record, filter))
                    .map(Self::summarize)
                    .collect();
                // 全量扫描没有固有顺序，按 ID 排序保证稳定输出
                summaries.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
                Ok(summaries)
            }
        }
    }
}
