//! 组合图管理服务 - 业务能力层
//!
//! 维护 Test / Section / Part / WritingTask 之间的有序父子链接：
//! - `link` / `unlink`：在父节点的有序引用列表中插入 / 移除子节点 ID
//! - `reorder`：整体替换父节点的子节点顺序
//! - `detach_and_delete`：解除链接并删除子节点，失败时回滚链接
//! - `delete_entity`：删除实体并级联处理子节点的反向引用
//!
//! 题目在 Part 内的排序不在本服务职责内，见 `OrderingService`。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, LinkError, OrderError};
use crate::infrastructure::entity_store::EntityStore;
use crate::models::{
    EntityData, EntityId, EntityRecord, RequestToken, SectionKind,
};

/// 幂等令牌缓存容量
const APPLIED_TOKEN_CAPACITY: usize = 256;

/// 组合图管理服务
pub struct CompositionService<S: EntityStore> {
    store: Arc<S>,
    /// 已确认成功的链接请求令牌（有界 FIFO）
    applied_tokens: Mutex<AppliedTokens>,
}

/// 有界的链接请求令牌缓存
struct AppliedTokens {
    order: VecDeque<String>,
    entries: HashMap<String, (EntityId, EntityId)>,
}

impl AppliedTokens {
    fn new() -> Self {
        Self {
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn contains(&self, token: &RequestToken, parent_id: &EntityId, child_id: &EntityId) -> bool {
        self.entries
            .get(token.as_str())
            .map(|(p, c)| p == parent_id && c == child_id)
            .unwrap_or(false)
    }

    fn record(&mut self, token: &RequestToken, parent_id: &EntityId, child_id: &EntityId) {
        if self.entries.len() >= APPLIED_TOKEN_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(token.as_str().to_string());
        self.entries.insert(
            token.as_str().to_string(),
            (parent_id.clone(), child_id.clone()),
        );
    }
}

impl<S: EntityStore> CompositionService<S> {
    /// 创建新的组合图管理服务
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            applied_tokens: Mutex::new(AppliedTokens::new()),
        }
    }

    /// 将子节点插入父节点的有序引用列表
    ///
    /// # 参数
    /// - `parent_id`: 父节点 ID
    /// - `child_id`: 子节点 ID
    /// - `position`: 插入位置，None 表示追加到末尾
    /// - `token`: 链接请求令牌；携带已确认令牌的重试按幂等成功处理
    pub async fn link(
        &self,
        parent_id: &EntityId,
        child_id: &EntityId,
        position: Option<usize>,
        token: Option<&RequestToken>,
    ) -> AppResult<()> {
        // 幂等重试：同一逻辑请求重复提交时直接返回成功
        if let Some(token) = token {
            let applied = self
                .applied_tokens
                .lock()
                .map(|cache| cache.contains(token, parent_id, child_id))
                .unwrap_or(false);
            if applied {
                debug!("链接请求已应用过，幂等返回: {} -> {}", parent_id, child_id);
                return Ok(());
            }
        }

        let parent = self.store.get(parent_id).await?;
        let child = self.store.get(child_id).await?;

        // 成环检查先于一切修改；这里任何命中都意味着调用流程有程序错误
        self.ensure_acyclic(&parent, &child).await?;

        check_link_rules(&parent, &child)?;

        let mut parent_data = parent.data.clone();
        insert_child(&mut parent_data, &child, position)?;

        // 恢复顺序：先写父节点的有序列表（权威数据），再写子节点反向引用
        self.store
            .update(parent_id, parent_data, parent.version)
            .await?;

        if let Err(e) = self.write_back_ref(&child, Some(parent_id.clone())).await {
            // 子节点反向引用写入失败：回滚父节点列表，保证不出现半链接状态
            warn!(
                "子节点 {} 反向引用写入失败，回滚父节点 {} 的链接: {}",
                child_id, parent_id, e
            );
            self.rollback_unlink(parent_id, child_id).await;
            return Err(e);
        }

        if let Some(token) = token {
            if let Ok(mut cache) = self.applied_tokens.lock() {
                cache.record(token, parent_id, child_id);
            }
        }

        info!("✓ 已链接: {} -> {}", parent_id, child_id);
        Ok(())
    }

    /// 从父节点的有序引用列表中移除子节点
    ///
    /// 只解除链接，不删除子实体。
    pub async fn unlink(&self, parent_id: &EntityId, child_id: &EntityId) -> AppResult<()> {
        let parent = self.store.get(parent_id).await?;

        let mut parent_data = parent.data.clone();
        if remove_child(&mut parent_data, child_id).is_none() {
            return Err(AppError::not_linked(parent_id.as_str(), child_id.as_str()));
        }

        self.store
            .update(parent_id, parent_data, parent.version)
            .await?;

        // 清除反向引用；子实体可能已被外部删除，容忍 NotFound
        match self.store.get(child_id).await {
            Ok(child) => {
                if child.data.parent_ref() == Some(parent_id) {
                    if let Err(e) = self.write_back_ref(&child, None).await {
                        warn!("子节点 {} 反向引用清除失败: {}", child_id, e);
                    }
                }
            }
            Err(AppError::Store(crate::error::StoreError::NotFound { .. })) => {}
            Err(e) => return Err(e),
        }

        info!("✓ 已解除链接: {} -x- {}", parent_id, child_id);
        Ok(())
    }

    /// 整体替换父节点的子节点顺序
    ///
    /// 提交的 ID 集合必须与当前子节点集合完全一致（防止通过重排路径
    /// 静默增删子节点），否则返回 `InvalidOrder` 且状态不变。
    pub async fn reorder(
        &self,
        parent_id: &EntityId,
        ordered_child_ids: &[EntityId],
    ) -> AppResult<()> {
        let parent = self.store.get(parent_id).await?;

        let supplied: HashSet<&EntityId> = ordered_child_ids.iter().collect();
        if supplied.len() != ordered_child_ids.len() {
            return Err(AppError::Order(OrderError::InvalidOrder {
                parent_id: parent_id.to_string(),
                reason: "提交的顺序中存在重复 ID".to_string(),
            }));
        }

        let mut parent_data = parent.data.clone();
        replace_order(&mut parent_data, parent_id, ordered_child_ids, &supplied)?;

        self.store
            .update(parent_id, parent_data, parent.version)
            .await?;

        info!(
            "✓ 已重排: {} ({} 个子节点)",
            parent_id,
            ordered_child_ids.len()
        );
        Ok(())
    }

    /// 解除链接并永久删除子节点
    ///
    /// 从管理器视角是原子操作：删除失败时恢复原位置的链接。
    pub async fn detach_and_delete(
        &self,
        parent_id: &EntityId,
        child_id: &EntityId,
    ) -> AppResult<()> {
        let parent = self.store.get(parent_id).await?;

        let mut parent_data = parent.data.clone();
        let removed_position = remove_child(&mut parent_data, child_id)
            .ok_or_else(|| AppError::not_linked(parent_id.as_str(), child_id.as_str()))?;

        self.store
            .update(parent_id, parent_data, parent.version)
            .await?;

        if let Err(e) = self.delete_detached(child_id).await {
            // 删除失败：恢复原位置的链接，保证两步要么都成功要么都回滚
            warn!(
                "删除子节点 {} 失败，恢复其在父节点 {} 中的链接: {}",
                child_id, parent_id, e
            );
            self.rollback_relink(parent_id, child_id, removed_position)
                .await;
            return Err(e);
        }

        info!("✓ 已解除链接并删除: {} -x- {}", parent_id, child_id);
        Ok(())
    }

    /// 删除实体并级联处理
    ///
    /// 级联规则：
    /// - Test / Section 删除时只解除子节点的反向引用（级联脱链，不级联删除）
    /// - Part 删除时连带删除其独占的题目
    /// - 已链接到父节点的实体先从父节点解除链接
    pub async fn delete_entity(&self, id: &EntityId) -> AppResult<()> {
        let record = self.store.get(id).await?;

        // 先从父节点解除链接
        if let Some(parent_id) = record.data.parent_ref().cloned() {
            match self.unlink(&parent_id, id).await {
                Ok(()) => {}
                // 反向引用指向的父节点已不存在或未实际持有链接，直接继续删除
                Err(AppError::Store(crate::error::StoreError::NotFound { .. }))
                | Err(AppError::Link(LinkError::NotFound { .. })) => {}
                Err(e) => return Err(e),
            }
        }

        self.delete_detached(id).await
    }

    /// 删除一个已经不被任何父节点引用的实体（含级联）
    async fn delete_detached(&self, id: &EntityId) -> AppResult<()> {
        let record = match self.store.get(id).await {
            Ok(record) => record,
            Err(AppError::Store(crate::error::StoreError::NotFound { .. })) => {
                return Err(AppError::store_not_found(id.as_str()))
            }
            Err(e) => return Err(e),
        };

        match &record.data {
            EntityData::Test { sections, .. } => {
                let child_ids: Vec<EntityId> = sections
                    .all()
                    .flat_map(|(_, ids)| ids.iter().cloned())
                    .collect();
                self.clear_back_refs(&child_ids).await?;
            }
            EntityData::Section { part_ids, .. } => {
                self.clear_back_refs(part_ids).await?;
            }
            EntityData::Part { question_ids, .. } => {
                // 题目被 Part 独占，删除 Part 时成为孤儿，级联删除
                let deletes = question_ids.iter().map(|question_id| async move {
                    match self.store.delete(question_id).await {
                        Ok(()) => Ok(()),
                        Err(AppError::Store(crate::error::StoreError::NotFound { .. })) => Ok(()),
                        Err(e) => Err(e),
                    }
                });
                try_join_all(deletes).await?;
            }
            EntityData::Question { .. } | EntityData::WritingTask { .. } => {}
        }

        self.store.delete(id).await?;
        info!("✓ 已删除实体: {} ({})", id, record.data.kind());
        Ok(())
    }

    /// 并发清除一组子节点的反向引用（级联脱链）
    async fn clear_back_refs(&self, child_ids: &[EntityId]) -> AppResult<()> {
        let clears = child_ids.iter().map(|child_id| async move {
            match self.store.get(child_id).await {
                Ok(child) => match self.write_back_ref(&child, None).await {
                    Ok(()) => Ok(()),
                    // 脱链是幂等操作，冲突时由调用方重试整个删除
                    Err(e) => Err(e),
                },
                Err(AppError::Store(crate::error::StoreError::NotFound { .. })) => Ok(()),
                Err(e) => Err(e),
            }
        });
        try_join_all(clears).await?;
        Ok(())
    }

    /// 写入（或清除）子节点的反向引用
    async fn write_back_ref(
        &self,
        child: &EntityRecord,
        parent_id: Option<EntityId>,
    ) -> AppResult<()> {
        let mut data = child.data.clone();
        let changed = match &mut data {
            EntityData::Section { test_id, .. } => {
                *test_id = parent_id;
                true
            }
            EntityData::Part { section_id, .. } => {
                *section_id = parent_id;
                true
            }
            EntityData::Question { part_id, .. } => {
                *part_id = parent_id;
                true
            }
            EntityData::WritingTask { writing_id, .. } => {
                *writing_id = parent_id;
                true
            }
            EntityData::Test { .. } => false,
        };

        if !changed {
            return Ok(());
        }

        self.store.update(&child.id, data, child.version).await?;
        Ok(())
    }

    /// 成环检查：child 的后代中不允许出现 parent
    ///
    /// 当前类型层级（Test → Section → Part）不存在递归包含，
    /// 但契约要求拒绝任何把祖先挂为后代的调用。
    async fn ensure_acyclic(
        &self,
        parent: &EntityRecord,
        child: &EntityRecord,
    ) -> AppResult<()> {
        if parent.id == child.id {
            return Err(AppError::cycle_detected(
                parent.id.as_str(),
                child.id.as_str(),
            ));
        }

        // 对当前图做纯遍历，不依赖语言层面的别名约束
        let mut queue: VecDeque<EntityId> = child.data.child_ids().into();
        let mut visited: HashSet<EntityId> = HashSet::new();

        while let Some(id) = queue.pop_front() {
            if id == parent.id {
                return Err(AppError::cycle_detected(
                    parent.id.as_str(),
                    child.id.as_str(),
                ));
            }
            if !visited.insert(id.clone()) {
                continue;
            }
            match self.store.get(&id).await {
                Ok(record) => queue.extend(record.data.child_ids()),
                // 悬空引用不参与成环判断
                Err(AppError::Store(crate::error::StoreError::NotFound { .. })) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// 尽力回滚：把刚插入的子节点从父节点列表中移除
    async fn rollback_unlink(&self, parent_id: &EntityId, child_id: &EntityId) {
        let rollback = async {
            let parent = self.store.get(parent_id).await?;
            let mut parent_data = parent.data.clone();
            if remove_child(&mut parent_data, child_id).is_some() {
                self.store
                    .update(parent_id, parent_data, parent.version)
                    .await?;
            }
            Ok::<(), AppError>(())
        };
        if let Err(e) = rollback.await {
            warn!("链接回滚失败 ({} -> {}): {}", parent_id, child_id, e);
        }
    }

    /// 尽力回滚：把删除失败的子节点放回原位置
    async fn rollback_relink(&self, parent_id: &EntityId, child_id: &EntityId, position: usize) {
        let rollback = async {
            let parent = self.store.get(parent_id).await?;
            let child = self.store.get(child_id).await?;
            let mut parent_data = parent.data.clone();
            insert_child(&mut parent_data, &child, Some(position))?;
            self.store
                .update(parent_id, parent_data, parent.version)
                .await?;
            Ok::<(), AppError>(())
        };
        if let Err(e) = rollback.await {
            warn!("恢复链接失败 ({} -> {}): {}", parent_id, child_id, e);
        }
    }
}

// ========== 图结构纯函数 ==========

/// 校验父子类型组合与独占所有权
fn check_link_rules(parent: &EntityRecord, child: &EntityRecord) -> AppResult<()> {
    match (&parent.data, &child.data) {
        (EntityData::Test { sections, .. }, EntityData::Section { section_kind, test_id, .. }) => {
            // 独占所有权：一个 Section 同一时刻至多属于一个 Test
            if let Some(owner) = test_id {
                if owner != &parent.id {
                    return Err(AppError::already_linked(owner.as_str(), child.id.as_str()));
                }
            }
            if sections.list(*section_kind).contains(&child.id) {
                return Err(AppError::already_linked(
                    parent.id.as_str(),
                    child.id.as_str(),
                ));
            }
            Ok(())
        }
        (
            EntityData::Section {
                section_kind: parent_kind,
                part_ids,
                ..
            },
            EntityData::Part {
                section_kind: child_kind,
                section_id,
                ..
            },
        ) => {
            if *parent_kind == SectionKind::Writing {
                return Err(kind_mismatch(parent, child, "writing_task"));
            }
            if parent_kind != child_kind {
                return Err(AppError::Link(LinkError::KindMismatch {
                    parent_id: parent.id.to_string(),
                    child_id: child.id.to_string(),
                    expected: parent_kind.as_str().to_string(),
                    actual: child_kind.as_str().to_string(),
                }));
            }
            if let Some(owner) = section_id {
                if owner != &parent.id {
                    return Err(AppError::already_linked(owner.as_str(), child.id.as_str()));
                }
            }
            if part_ids.contains(&child.id) {
                return Err(AppError::already_linked(
                    parent.id.as_str(),
                    child.id.as_str(),
                ));
            }
            Ok(())
        }
        (
            EntityData::Section {
                section_kind,
                part_ids,
                ..
            },
            EntityData::WritingTask { writing_id, .. },
        ) => {
            if *section_kind != SectionKind::Writing {
                return Err(kind_mismatch(parent, child, "part"));
            }
            if let Some(owner) = writing_id {
                if owner != &parent.id {
                    return Err(AppError::already_linked(owner.as_str(), child.id.as_str()));
                }
            }
            if part_ids.contains(&child.id) {
                return Err(AppError::already_linked(
                    parent.id.as_str(),
                    child.id.as_str(),
                ));
            }
            Ok(())
        }
        // 题目的插入 / 排序由 OrderingService 负责
        _ => Err(kind_mismatch(parent, child, "section | part | writing_task")),
    }
}

fn kind_mismatch(parent: &EntityRecord, child: &EntityRecord, expected: &str) -> AppError {
    AppError::Link(LinkError::KindMismatch {
        parent_id: parent.id.to_string(),
        child_id: child.id.to_string(),
        expected: expected.to_string(),
        actual: child.data.kind().as_str().to_string(),
    })
}

/// 将子节点 ID 插入父节点数据的对应有序列表
fn insert_child(
    parent_data: &mut EntityData,
    child: &EntityRecord,
    position: Option<usize>,
) -> AppResult<()> {
    let list = match (parent_data, &child.data) {
        (EntityData::Test { sections, .. }, EntityData::Section { section_kind, .. }) => {
            sections.list_mut(*section_kind)
        }
        (EntityData::Section { part_ids, .. }, EntityData::Part { .. })
        | (EntityData::Section { part_ids, .. }, EntityData::WritingTask { .. }) => part_ids,
        // check_link_rules 已拦截其余组合
        _ => {
            return Err(AppError::Other(format!(
                "无法将 {} 插入该父节点",
                child.data.kind()
            )))
        }
    };

    let position = position.unwrap_or(list.len());
    if position > list.len() {
        return Err(AppError::out_of_range(position, list.len()));
    }
    list.insert(position, child.id.clone());
    Ok(())
}

/// 从父节点数据的所有有序列表中移除子节点 ID，返回原位置
fn remove_child(parent_data: &mut EntityData, child_id: &EntityId) -> Option<usize> {
    match parent_data {
        EntityData::Test { sections, .. } => {
            for kind in SectionKind::all() {
                let list = sections.list_mut(kind);
                if let Some(position) = list.iter().position(|id| id == child_id) {
                    list.remove(position);
                    return Some(position);
                }
            }
            None
        }
        EntityData::Section { part_ids, .. } => {
            let position = part_ids.iter().position(|id| id == child_id)?;
            part_ids.remove(position);
            Some(position)
        }
        _ => None,
    }
}

/// 整体替换父节点数据中的子节点顺序
fn replace_order(
    parent_data: &mut EntityData,
    parent_id: &EntityId,
    ordered: &[EntityId],
    supplied: &HashSet<&EntityId>,
) -> AppResult<()> {
    match parent_data {
        EntityData::Test { sections, .. } => {
            // 试卷按类型分区排序：提交的集合必须与某一分区完全一致
            for kind in SectionKind::all() {
                let list = sections.list_mut(kind);
                let current: HashSet<&EntityId> = list.iter().collect();
                if current == *supplied {
                    *list = ordered.to_vec();
                    return Ok(());
                }
            }
            Err(AppError::Order(OrderError::InvalidOrder {
                parent_id: parent_id.to_string(),
                reason: "提交的 ID 集合与任何类型分区的当前子节点集合都不一致".to_string(),
            }))
        }
        EntityData::Section { part_ids, .. } => {
            let current: HashSet<&EntityId> = part_ids.iter().collect();
            if current != *supplied {
                return Err(AppError::Order(OrderError::InvalidOrder {
                    parent_id: parent_id.to_string(),
                    reason: "提交的 ID 集合与当前子节点集合不一致".to_string(),
                }));
            }
            *part_ids = ordered.to_vec();
            Ok(())
        }
        _ => Err(AppError::Order(OrderError::InvalidOrder {
            parent_id: parent_id.to_string(),
            reason: "该实体类型不支持子节点重排".to_string(),
        })),
    }
}
