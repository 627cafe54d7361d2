//! 编排会话 - 编排层
//!
//! ## 职责
//!
//! 本模块是编排台页面驱动的统一门面，负责会话生命周期与资源装配。
//!
//! ## 核心功能
//!
//! 1. **会话初始化**：初始化日志文件、装配服务与导航载体
//! 2. **认证门控**：`loading` 为 true 期间拒绝一切数据与前进导航操作
//! 3. **控制流**：导航 -> CRUD -> 更新链接 -> 导航（页面的标准动作序列）
//! 4. **蓝图播种**：批量加载蓝图文件并逐卷播种，汇总全局统计
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个实体的细节，向下委托 workflow / services
//! - **资源所有者**：唯一持有导航载体与服务实例的模块
//! - **向下依赖**：编排层 -> workflow -> services -> infrastructure

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::entity_store::EntityStore;
use crate::models::{AuthState, EntityData, EntityId};
use crate::navigation::{NavContext, NavReturn, NavigateOptions, NavigationCarrier};
use crate::services::{CompositionService, OrderingService};
use crate::utils::logging::init_log_file;
use crate::workflow::{BuilderCtx, CreateFlow, CreateOutcome};

/// 蓝图播种的全局统计
#[derive(Debug, Default)]
pub struct SeedStats {
    /// 处理的蓝图数
    pub blueprints: usize,
    /// 播种成功的蓝图数
    pub succeeded: usize,
    /// 播种失败的蓝图数
    pub failed: usize,
    /// 创建的节点总数
    pub created: usize,
    /// 链接的节点总数
    pub linked: usize,
    /// 创建成功但链接失败的节点总数
    pub partial: usize,
}

/// 编排会话
pub struct BuilderSession<S: EntityStore> {
    config: Config,
    auth: AuthState,
    nav: NavigationCarrier,
    store: Arc<S>,
    composition: Arc<CompositionService<S>>,
    ordering: Arc<OrderingService<S>>,
    create_flow: CreateFlow<S>,
}

impl<S: EntityStore> BuilderSession<S> {
    /// 初始化会话
    ///
    /// 认证状态初始为加载中，外部认证模块就绪后经 `update_auth` 写入。
    pub fn initialize(config: Config, store: Arc<S>) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(&config);

        let composition = Arc::new(CompositionService::new(Arc::clone(&store)));
        let ordering = Arc::new(OrderingService::new(Arc::clone(&store)));
        let create_flow = CreateFlow::new(
            Arc::clone(&store),
            Arc::clone(&composition),
            Arc::clone(&ordering),
            &config,
        );
        let nav = NavigationCarrier::new(config.nav_stack_depth);

        Ok(Self {
            config,
            auth: AuthState::loading(),
            nav,
            store,
            composition,
            ordering,
            create_flow,
        })
    }

    /// 写入外部认证模块提供的最新会话状态
    pub fn update_auth(&mut self, auth: AuthState) {
        self.auth = auth;
    }

    /// 组合图管理服务
    pub fn composition(&self) -> &CompositionService<S> {
        &self.composition
    }

    /// 题目排序服务
    pub fn ordering(&self) -> &OrderingService<S> {
        &self.ordering
    }

    /// 实体存储
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// 导航状态载体
    pub fn navigation(&self) -> &NavigationCarrier {
        &self.nav
    }

    /// 前进导航：保存返回上下文并转移到目标页面
    pub fn open(&self, target: &str, context: NavContext) -> Result<String> {
        self.ensure_ready()?;
        Ok(self.nav.navigate(
            target,
            NavigateOptions {
                context,
                replace: false,
            },
        ))
    }

    /// 打开创建页面并构建页面上下文（解析预填查询参数）
    pub fn open_create(&self, path: &str, query: &str, context: NavContext) -> Result<BuilderCtx> {
        self.ensure_ready()?;
        self.nav.navigate(
            path,
            NavigateOptions {
                context,
                replace: false,
            },
        );
        Ok(BuilderCtx::from_route(path, query))
    }

    /// 返回导航：恢复上一个列表页的上下文
    ///
    /// 导航永不失败；无帧可恢复时返回空上下文。
    pub fn go_back(&self, current_path: &str) -> NavReturn {
        self.nav.go_back(current_path)
    }

    /// 创建实体（上下文带预填父级时随即链接）
    pub async fn create_entity(
        &self,
        data: EntityData,
        ctx: &BuilderCtx,
    ) -> Result<CreateOutcome> {
        self.ensure_writable()?;
        self.create_flow.create(data, ctx).await
    }

    /// 删除实体并级联处理反向引用
    pub async fn delete_entity(&self, id: &EntityId) -> Result<()> {
        self.ensure_writable()?;
        self.composition.delete_entity(id).await?;
        Ok(())
    }

    /// 扫描蓝图目录并逐卷播种，返回全局统计
    pub async fn run_seeding(&self) -> Result<SeedStats> {
        self.ensure_writable()?;

        info!("\n📁 正在扫描待播种的蓝图...");
        let blueprints =
            crate::models::load_all_blueprints(&self.config.blueprint_folder).await?;

        if blueprints.is_empty() {
            warn!("⚠️ 没有找到待播种的蓝图文件");
            return Ok(SeedStats::default());
        }

        info!("✓ 找到 {} 个待播种的蓝图", blueprints.len());

        let mut stats = SeedStats {
            blueprints: blueprints.len(),
            ..Default::default()
        };

        for blueprint in &blueprints {
            match self.create_flow.seed_blueprint(blueprint).await {
                Ok(report) => {
                    stats.succeeded += 1;
                    stats.created += report.created;
                    stats.linked += report.linked;
                    stats.partial += report.partial_nodes.len();
                }
                Err(e) => {
                    warn!("❌ 蓝图播种失败: {} ({})", blueprint.name, e);
                    stats.failed += 1;
                }
            }
        }

        print_final_stats(&stats, &self.config);
        Ok(stats)
    }

    /// 认证门控：加载完成且已认证才放行
    fn ensure_ready(&self) -> Result<()> {
        if self.auth.loading {
            bail!("认证状态尚未就绪，拒绝执行操作");
        }
        if !self.auth.ready() {
            bail!("会话未认证，拒绝执行操作");
        }
        Ok(())
    }

    /// 写操作门控：在认证门控之上要求可写角色
    fn ensure_writable(&self) -> Result<()> {
        self.ensure_ready()?;
        match self.auth.role {
            Some(role) if role.can_write() => Ok(()),
            _ => bail!("当前角色无写权限，拒绝执行操作"),
        }
    }
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 会话启动 - 试卷编排模式");
    info!("📊 导航栈深度: {}", config.nav_stack_depth);
    info!("{}", "=".repeat(60));
}

fn print_final_stats(stats: &SeedStats, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部播种完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", stats.succeeded, stats.blueprints);
    info!("❌ 失败: {}", stats.failed);
    info!(
        "📦 节点: 创建 {} / 链接 {} / 待重试链接 {}",
        stats.created, stats.linked, stats.partial
    );
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", config.output_log_file);
}
