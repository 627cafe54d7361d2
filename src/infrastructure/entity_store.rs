//! 实体存储能力
//!
//! 核心层把存储视为远端服务：按实体类型提供 CRUD + 查询操作，
//! 读取时返回版本令牌，更新时必须带回令牌（乐观并发）。

use crate::error::AppResult;
use crate::models::{EntityData, EntityId, EntityRecord, EntitySummary, ListFilter, VersionToken};

/// 实体存储能力接口
///
/// 实现方：
/// - `StoreClient` —— 远端 HTTP 存储服务
/// - `MemoryStore` —— 进程内存储，测试与离线草稿会话使用
#[allow(async_fn_in_trait)]
pub trait EntityStore {
    /// 创建实体，返回完整记录（含分配的 ID 与初始版本令牌）
    async fn create(&self, data: EntityData) -> AppResult<EntityRecord>;

    /// 按 ID 读取实体；不存在时返回 `StoreError::NotFound`
    async fn get(&self, id: &EntityId) -> AppResult<EntityRecord>;

    /// 带版本令牌更新实体
    ///
    /// 令牌与当前版本不一致时返回 `StoreError::StaleVersion`，
    /// 调用方必须重新读取后重试，绝不静默覆盖。
    async fn update(
        &self,
        id: &EntityId,
        data: EntityData,
        version: VersionToken,
    ) -> AppResult<EntityRecord>;

    /// 删除实体；不存在时返回 `StoreError::NotFound`
    async fn delete(&self, id: &EntityId) -> AppResult<()>;

    /// 列表查询
    ///
    /// # 参数
    /// - `parent_id`: 给定时按父节点的有序子列表返回；否则全量扫描
    /// - `filter`: 类型 / 标题过滤条件
    async fn list(
        &self,
        parent_id: Option<&EntityId>,
        filter: &ListFilter,
    ) -> AppResult<Vec<EntitySummary>>;
}
