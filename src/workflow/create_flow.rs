//! 创建流程 - 流程层
//!
//! 核心职责：把「创建即链接」定义为一个逻辑单元
//!
//! 流程顺序：
//! 1. 在存储中创建实体
//! 2. 有预填父级时，把新实体链接到父级的有序列表
//! 3. 链接失败不丢弃新实体：保持未链接状态并作为部分成功上报

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::entity_store::EntityStore;
use crate::models::{
    EntityData, EntityId, EntityRecord, QuestionType, SectionBlueprint, SectionKind,
    TestBlueprint, TestMetadata,
};
use crate::routing::PrefillParent;
use crate::services::{CompositionService, OrderingService, QuestionDraft};
use crate::utils::logging::truncate_text;
use crate::workflow::builder_ctx::BuilderCtx;

/// 创建流程的结果
///
/// 部分成功（创建成功但链接失败）与硬失败分开上报，
/// 调用方可以只重试链接而不必重新创建。
#[derive(Debug)]
pub enum CreateOutcome {
    /// 创建成功；有预填父级时也已完成链接
    Created(EntityRecord),
    /// 创建成功但链接失败，实体保持未链接状态
    CreatedButUnlinked {
        record: EntityRecord,
        reason: AppError,
    },
}

impl CreateOutcome {
    /// 新创建实体的记录
    pub fn record(&self) -> &EntityRecord {
        match self {
            CreateOutcome::Created(record) => record,
            CreateOutcome::CreatedButUnlinked { record, .. } => record,
        }
    }

    /// 是否为部分成功（需要提示「重试链接」而非「重试创建」）
    pub fn is_partial(&self) -> bool {
        matches!(self, CreateOutcome::CreatedButUnlinked { .. })
    }
}

/// 蓝图播种统计
#[derive(Debug, Default)]
pub struct SeedReport {
    /// 创建出的试卷 ID
    pub test_id: Option<EntityId>,
    /// 成功创建的节点数（含试卷本身）
    pub created: usize,
    /// 成功链接的节点数
    pub linked: usize,
    /// 创建成功但链接失败的节点
    pub partial_nodes: Vec<EntityId>,
    /// 创建失败的节点数
    pub failed: usize,
}

/// 创建流程
///
/// - 编排「创建 -> 链接」这一逻辑单元
/// - 不持有任何稀缺资源
/// - 只依赖业务能力（services）与存储能力
pub struct CreateFlow<S: EntityStore> {
    store: Arc<S>,
    composition: Arc<CompositionService<S>>,
    ordering: Arc<OrderingService<S>>,
    verbose_logging: bool,
}

impl<S: EntityStore> CreateFlow<S> {
    /// 创建新的创建流程
    pub fn new(
        store: Arc<S>,
        composition: Arc<CompositionService<S>>,
        ordering: Arc<OrderingService<S>>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            composition,
            ordering,
            verbose_logging: config.verbose_logging,
        }
    }

    /// 创建实体；上下文带预填父级时随即链接
    ///
    /// 链接失败时新实体保持未链接状态，以 `CreatedButUnlinked`
    /// 上报给调用方，绝不静默丢弃。
    pub async fn create(&self, data: EntityData, ctx: &BuilderCtx) -> Result<CreateOutcome> {
        let record = self
            .store
            .create(data)
            .await
            .with_context(|| format!("{} 创建实体失败", ctx))?;

        if self.verbose_logging {
            info!(
                "{} 已创建实体 {} ({}): {}",
                ctx,
                record.id,
                record.data.kind(),
                truncate_text(record.data.title(), 40)
            );
        }

        let Some(prefill) = &ctx.prefill else {
            return Ok(CreateOutcome::Created(record));
        };

        match self
            .composition
            .link(
                prefill.parent_id(),
                &record.id,
                None,
                Some(&ctx.request_token),
            )
            .await
        {
            Ok(()) => {
                // 链接改写了新实体的反向引用，重新读取保持记录新鲜
                let fresh = self.store.get(&record.id).await.unwrap_or(record);
                Ok(CreateOutcome::Created(fresh))
            }
            Err(reason) => {
                warn!(
                    "{} ⚠️ 实体 {} 已创建但链接失败: {}",
                    ctx, record.id, reason
                );
                Ok(CreateOutcome::CreatedButUnlinked { record, reason })
            }
        }
    }

    /// 按蓝图播种整卷
    ///
    /// 逐节点执行「创建即链接」，单个节点失败不中止整批：
    /// 创建失败计入 failed，链接失败的节点计入 partial_nodes。
    pub async fn seed_blueprint(&self, blueprint: &TestBlueprint) -> Result<SeedReport> {
        info!(
            "📋 开始播种蓝图: {} ({} 个节点)",
            blueprint.name,
            blueprint.node_count()
        );

        let mut report = SeedReport::default();

        let test = self
            .store
            .create(EntityData::Test {
                title: blueprint.name.clone(),
                metadata: TestMetadata {
                    province: blueprint.province.clone(),
                    year: blueprint.year.clone(),
                    remark: None,
                },
                sections: Default::default(),
            })
            .await
            .with_context(|| format!("创建试卷失败: {}", blueprint.name))?;
        report.created += 1;
        report.test_id = Some(test.id.clone());

        for section_bp in &blueprint.sections {
            let Some(kind) = SectionKind::from_str_name(&section_bp.kind) else {
                warn!(
                    "⚠️ 蓝图 {} 中的 Section 类型无法识别: {}，跳过",
                    blueprint.name, section_bp.kind
                );
                report.failed += 1;
                continue;
            };

            let section_ctx = BuilderCtx::new(
                crate::routing::section_create_path(kind),
                Some(PrefillParent::Test(test.id.clone())),
            );
            let section_data = EntityData::Section {
                section_kind: kind,
                title: section_bp.title.clone(),
                payload_ref: section_bp.payload_ref.clone(),
                part_ids: Vec::new(),
                test_id: None,
            };

            let section_id = match self.create(section_data, &section_ctx).await {
                Ok(outcome) => {
                    report.created += 1;
                    let id = outcome.record().id.clone();
                    if outcome.is_partial() {
                        report.partial_nodes.push(id.clone());
                    } else {
                        report.linked += 1;
                    }
                    id
                }
                Err(e) => {
                    warn!("⚠️ Section 创建失败: {} ({})", section_bp.title, e);
                    report.failed += 1;
                    continue;
                }
            };

            self.seed_section_children(kind, &section_id, section_bp, &mut report)
                .await;
        }

        info!(
            "✓ 蓝图播种完成: {} (创建 {} / 链接 {} / 部分 {} / 失败 {})",
            blueprint.name,
            report.created,
            report.linked,
            report.partial_nodes.len(),
            report.failed
        );
        Ok(report)
    }

    /// 播种 Section 之下的 Part / 题目 / 写作任务
    async fn seed_section_children(
        &self,
        kind: SectionKind,
        section_id: &EntityId,
        section_bp: &SectionBlueprint,
        report: &mut SeedReport,
    ) {
        // 写作 Section 直接挂任务，不经过 Part 层
        for task_bp in &section_bp.tasks {
            let task_ctx = BuilderCtx::new(
                crate::routing::linked_tasks_path(section_id),
                Some(PrefillParent::Section(kind, section_id.clone())),
            );
            let task_data = EntityData::WritingTask {
                writing_id: None,
                prompt: task_bp.prompt.clone(),
            };
            match self.create(task_data, &task_ctx).await {
                Ok(outcome) => {
                    report.created += 1;
                    if outcome.is_partial() {
                        report.partial_nodes.push(outcome.record().id.clone());
                    } else {
                        report.linked += 1;
                    }
                }
                Err(e) => {
                    warn!("⚠️ 写作任务创建失败: {}", e);
                    report.failed += 1;
                }
            }
        }

        for part_bp in &section_bp.parts {
            let part_ctx = BuilderCtx::new(
                crate::routing::linked_parts_path(kind, section_id),
                Some(PrefillParent::Section(kind, section_id.clone())),
            );
            let part_data = EntityData::Part {
                section_kind: kind,
                title: part_bp.title.clone(),
                question_ids: Vec::new(),
                groups: Vec::new(),
                section_id: None,
            };

            let part_id = match self.create(part_data, &part_ctx).await {
                Ok(outcome) => {
                    report.created += 1;
                    let id = outcome.record().id.clone();
                    if outcome.is_partial() {
                        report.partial_nodes.push(id.clone());
                    } else {
                        report.linked += 1;
                    }
                    id
                }
                Err(e) => {
                    warn!("⚠️ Part 创建失败: {} ({})", part_bp.title, e);
                    report.failed += 1;
                    continue;
                }
            };

            // 题目经由排序服务插入，排序下标由服务分配
            for question_bp in &part_bp.stemlist {
                let draft = QuestionDraft {
                    question_type: QuestionType::from_str(&question_bp.question_type),
                    stem: question_bp.stem.clone(),
                    answer_key: question_bp.answer.clone(),
                    imgs: None,
                };
                match self.ordering.insert(&part_id, draft, None).await {
                    Ok((question_id, _)) => {
                        report.created += 1;
                        report.linked += 1;
                        if self.verbose_logging {
                            info!("✓ 已插入题目: {}", question_id);
                        }
                    }
                    Err(e) => {
                        warn!("⚠️ 题目插入失败: {}", e);
                        report.failed += 1;
                    }
                }
            }
        }
    }
}
