//! # IELTS Test Builder
//!
//! 一个用于考试内容编排的 Rust 核心库
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 定义存储能力，只暴露接口
//! - `EntityStore` - 实体 CRUD + 查询能力（乐观并发版本令牌）
//! - `MemoryStore` - 进程内实现，测试与离线草稿会话使用
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个聚合
//! - `CompositionService` - 有序父子链接能力（link / unlink / reorder）
//! - `OrderingService` - Part 内题目排序能力（插入 / 移动 / 分组）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次创建"的完整处理流程
//! - `BuilderCtx` - 上下文封装（路径 + 预填父级 + 请求令牌）
//! - `CreateFlow` - 流程编排（创建 -> 链接 -> 部分成功上报）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/builder_session` - 会话门面，认证门控与蓝图播种
//!
//! ## 横切模块
//!
//! - `navigation/` - 导航状态载体（有界帧栈 + 纪元守卫）
//! - `routing/` - 路由路径与预填查询参数约定
//! - `clients/` - 远端实体存储服务的 HTTP 客户端

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod navigation;
pub mod orchestrator;
pub mod routing;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::StoreClient;
pub use config::Config;
pub use error::{AppError, AppResult, LinkError, OrderError, StoreError};
pub use infrastructure::{EntityStore, MemoryStore};
pub use models::{EntityData, EntityId, EntityRecord, RequestToken, SectionKind};
pub use navigation::{NavContext, NavigationCarrier};
pub use orchestrator::{BuilderSession, SeedStats};
pub use routing::PrefillParent;
pub use services::{CompositionService, OrderingService, QuestionDraft};
pub use workflow::{BuilderCtx, CreateFlow, CreateOutcome};
