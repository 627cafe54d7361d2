//! 题目排序服务 - 业务能力层
//!
//! 管理单个 Part 内题目的有序列表：插入、移除、移动、分组。
//! 题目的排序下标就是它在所属 Part 有序列表中的位置（0 起始），
//! 每次成功操作后保持连续无空洞；失败的操作不改变任何状态。
//!
//! 聚合一次性从存储加载（`PartQuestions`），在内存中完成校验与变更，
//! 再以单次带版本令牌的更新写回，天然满足「要么全部生效要么全部不生效」。

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, OrderError};
use crate::infrastructure::entity_store::EntityStore;
use crate::models::{
    EntityData, EntityId, QuestionGroup, QuestionType, SectionKind, VersionToken,
};

/// 新题目草稿
///
/// 调用方提交的题目内容，排序下标由服务按插入位置分配。
#[derive(Debug, Clone)]
pub struct QuestionDraft {
    pub question_type: QuestionType,
    pub stem: String,
    pub answer_key: Value,
    pub imgs: Option<Vec<String>>,
}

/// Part 内题目聚合
///
/// 从存储加载的有序题目列表与分组区间，纯内存操作：
/// 先校验后变更，任何错误都不会留下半改状态。
#[derive(Debug, Clone)]
pub struct PartQuestions {
    question_ids: Vec<EntityId>,
    groups: Vec<QuestionGroup>,
}

impl PartQuestions {
    fn new(question_ids: Vec<EntityId>, groups: Vec<QuestionGroup>) -> Self {
        Self {
            question_ids,
            groups,
        }
    }

    pub fn question_ids(&self) -> &[EntityId] {
        &self.question_ids
    }

    pub fn groups(&self) -> &[QuestionGroup] {
        &self.groups
    }

    /// 在指定位置插入题目 ID，返回实际插入位置
    ///
    /// `position` 为 None 时追加到末尾。插入点严格位于某个分组区间
    /// 内部时，该分组随之扩展；位于分组之前的插入整体平移分组。
    fn insert_at(&mut self, question_id: EntityId, position: Option<usize>) -> AppResult<usize> {
        let len = self.question_ids.len();
        let position = position.unwrap_or(len);
        if position > len {
            return Err(AppError::out_of_range(position, len));
        }

        self.question_ids.insert(position, question_id);
        for group in &mut self.groups {
            if position <= group.start {
                group.start += 1;
                group.end += 1;
            } else if position <= group.end {
                group.end += 1;
            }
        }
        Ok(position)
    }

    /// 移除题目 ID，返回其原位置
    ///
    /// 覆盖该位置的分组区间收缩，收缩为空的分组随之解散。
    fn remove_id(&mut self, part_id: &EntityId, question_id: &EntityId) -> AppResult<usize> {
        let position = self
            .question_ids
            .iter()
            .position(|id| id == question_id)
            .ok_or_else(|| AppError::not_linked(part_id.as_str(), question_id.as_str()))?;

        self.question_ids.remove(position);
        self.groups.retain_mut(|group| {
            if position < group.start {
                group.start -= 1;
                group.end -= 1;
            } else if position <= group.end {
                if group.start == group.end {
                    return false;
                }
                group.end -= 1;
            }
            true
        });
        Ok(position)
    }

    /// 把题目移动到新位置
    ///
    /// 起点或落点位于某个分组区间内（含边界）的移动会撕裂分组，
    /// 返回 `InvalidRange` 并保持状态不变；分组只能整体平移。
    fn move_to(
        &mut self,
        part_id: &EntityId,
        question_id: &EntityId,
        new_position: usize,
    ) -> AppResult<(usize, usize)> {
        let len = self.question_ids.len();
        if new_position >= len {
            return Err(AppError::out_of_range(new_position, len));
        }
        let from = self
            .question_ids
            .iter()
            .position(|id| id == question_id)
            .ok_or_else(|| AppError::not_linked(part_id.as_str(), question_id.as_str()))?;

        if from == new_position {
            return Ok((from, new_position));
        }

        for group in &self.groups {
            if group.covers(from) || group.covers(new_position) {
                return Err(AppError::Order(OrderError::InvalidRange {
                    start: group.start,
                    end: group.end,
                    len,
                }));
            }
        }

        let id = self.question_ids.remove(from);
        self.question_ids.insert(new_position, id);

        // 起落点都不在分组内，夹在中间的分组只需整体平移
        for group in &mut self.groups {
            if from < group.start && group.end < new_position {
                group.start -= 1;
                group.end -= 1;
            } else if new_position <= group.start && group.end < from {
                group.start += 1;
                group.end += 1;
            }
        }
        Ok((from, new_position))
    }

    /// 把闭区间 [start, end] 标记为共享同一段提示语的分组
    fn group_range(&mut self, start: usize, end: usize, prompt: String) -> AppResult<()> {
        let len = self.question_ids.len();
        if start > end || end >= len {
            return Err(AppError::Order(OrderError::InvalidRange { start, end, len }));
        }
        for group in &self.groups {
            if group.overlaps(start, end) {
                return Err(AppError::Order(OrderError::OverlappingGroup {
                    start,
                    end,
                    existing_start: group.start,
                    existing_end: group.end,
                }));
            }
        }

        self.groups.push(QuestionGroup { start, end, prompt });
        self.groups.sort_by_key(|group| group.start);
        Ok(())
    }

    /// 解散以 `start` 为起点的分组
    fn ungroup(&mut self, start: usize) -> AppResult<()> {
        let len = self.question_ids.len();
        let position = self
            .groups
            .iter()
            .position(|group| group.start == start)
            .ok_or(AppError::Order(OrderError::InvalidRange {
                start,
                end: start,
                len,
            }))?;
        self.groups.remove(position);
        Ok(())
    }
}

/// 题目排序服务
pub struct OrderingService<S: EntityStore> {
    store: Arc<S>,
}

impl<S: EntityStore> OrderingService<S> {
    /// 创建新的题目排序服务
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 读取 Part 的题目聚合
    pub async fn part_questions(&self, part_id: &EntityId) -> AppResult<PartQuestions> {
        let (aggregate, _, _) = self.load(part_id).await?;
        Ok(aggregate)
    }

    /// 在 Part 中插入新题目
    ///
    /// 创建题目实体并写入 Part 的有序列表，返回新题目的 ID 与位置。
    /// Part 写入失败时回滚删除刚创建的题目，不留孤儿。
    pub async fn insert(
        &self,
        part_id: &EntityId,
        draft: QuestionDraft,
        position: Option<usize>,
    ) -> AppResult<(EntityId, usize)> {
        let (mut aggregate, version, shell) = self.load(part_id).await?;

        // 先校验插入位置，再创建实体，尽量少走回滚路径
        let len = aggregate.question_ids.len();
        if let Some(position) = position {
            if position > len {
                return Err(AppError::out_of_range(position, len));
            }
        }

        let question = self
            .store
            .create(EntityData::Question {
                part_id: Some(part_id.clone()),
                question_type: draft.question_type,
                stem: draft.stem,
                answer_key: draft.answer_key,
                imgs: draft.imgs,
            })
            .await?;

        let inserted_at = aggregate.insert_at(question.id.clone(), position)?;

        if let Err(e) = self.save(part_id, &aggregate, version, shell).await {
            // Part 写入失败：删除刚创建的题目，保证全有或全无
            warn!(
                "Part {} 写入失败，回滚删除题目 {}: {}",
                part_id, question.id, e
            );
            if let Err(rollback_err) = self.store.delete(&question.id).await {
                warn!("题目 {} 回滚删除失败: {}", question.id, rollback_err);
            }
            return Err(e);
        }

        info!(
            "✓ 已插入题目: {} -> {} (位置 {})",
            part_id, question.id, inserted_at
        );
        Ok((question.id, inserted_at))
    }

    /// 从 Part 中移除题目并删除题目实体
    ///
    /// 题目被 Part 独占，移除后即成孤儿，随之删除；
    /// 删除失败时把题目写回原位置。
    pub async fn remove(&self, part_id: &EntityId, question_id: &EntityId) -> AppResult<()> {
        let (original, version, shell) = self.load(part_id).await?;

        let mut aggregate = original.clone();
        aggregate.remove_id(part_id, question_id)?;

        self.save(part_id, &aggregate, version, shell).await?;

        match self.store.delete(question_id).await {
            Ok(()) => {}
            // 题目实体已被外部删除，列表清理本身已完成
            Err(AppError::Store(crate::error::StoreError::NotFound { .. })) => {}
            Err(e) => {
                // 删除失败：恢复原有的列表与分组
                warn!(
                    "题目 {} 删除失败，恢复 Part {} 的原有顺序: {}",
                    question_id, part_id, e
                );
                self.rollback(part_id, &original).await;
                return Err(e);
            }
        }

        info!("✓ 已移除题目: {} -x- {}", part_id, question_id);
        Ok(())
    }

    /// 把题目移动到新位置
    pub async fn move_question(
        &self,
        part_id: &EntityId,
        question_id: &EntityId,
        new_position: usize,
    ) -> AppResult<()> {
        let (mut aggregate, version, shell) = self.load(part_id).await?;
        let (from, to) = aggregate.move_to(part_id, question_id, new_position)?;

        if from == to {
            return Ok(());
        }

        self.save(part_id, &aggregate, version, shell).await?;

        info!("✓ 已移动题目: {} ({} -> {})", question_id, from, to);
        Ok(())
    }

    /// 把连续题目区间标记为共享提示语的分组
    pub async fn group_range(
        &self,
        part_id: &EntityId,
        start: usize,
        end: usize,
        prompt: &str,
    ) -> AppResult<()> {
        let (mut aggregate, version, shell) = self.load(part_id).await?;
        aggregate.group_range(start, end, prompt.to_string())?;

        self.save(part_id, &aggregate, version, shell).await?;

        info!("✓ 已创建分组: {} [{}, {}]", part_id, start, end);
        Ok(())
    }

    /// 解散以 `start` 为起点的分组
    pub async fn ungroup(&self, part_id: &EntityId, start: usize) -> AppResult<()> {
        let (mut aggregate, version, shell) = self.load(part_id).await?;
        aggregate.ungroup(start)?;

        self.save(part_id, &aggregate, version, shell).await?;

        info!("✓ 已解散分组: {} (起点 {})", part_id, start);
        Ok(())
    }

    /// 加载 Part 聚合（列表、分组、版本令牌与类型）
    async fn load(
        &self,
        part_id: &EntityId,
    ) -> AppResult<(PartQuestions, VersionToken, PartShell)> {
        let record = self.store.get(part_id).await?;
        match record.data {
            EntityData::Part {
                section_kind,
                title,
                question_ids,
                groups,
                section_id,
            } => Ok((
                PartQuestions::new(question_ids, groups),
                record.version,
                PartShell {
                    section_kind,
                    title,
                    section_id,
                },
            )),
            other => Err(AppError::Other(format!(
                "实体 {} 不是 Part，而是 {}",
                part_id,
                other.kind()
            ))),
        }
    }

    /// 以单次更新把聚合写回存储
    async fn save(
        &self,
        part_id: &EntityId,
        aggregate: &PartQuestions,
        version: VersionToken,
        shell: PartShell,
    ) -> AppResult<()> {
        self.store
            .update(
                part_id,
                EntityData::Part {
                    section_kind: shell.section_kind,
                    title: shell.title,
                    question_ids: aggregate.question_ids.clone(),
                    groups: aggregate.groups.clone(),
                    section_id: shell.section_id,
                },
                version,
            )
            .await?;
        Ok(())
    }

    /// 尽力回滚：把 Part 恢复为给定聚合
    async fn rollback(&self, part_id: &EntityId, original: &PartQuestions) {
        let rollback = async {
            let (_, version, shell) = self.load(part_id).await?;
            self.save(part_id, original, version, shell).await
        };
        if let Err(e) = rollback.await {
            warn!("Part {} 顺序回滚失败: {}", part_id, e);
        }
    }
}

/// Part 记录中聚合以外的字段，写回时原样保留
struct PartShell {
    section_kind: SectionKind,
    title: String,
    section_id: Option<EntityId>,
}
