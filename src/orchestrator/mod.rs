//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层是编排台页面驱动的统一入口，负责会话装配和流程调度。
//!
//! ## 模块划分
//!
//! ### `builder_session` - 编排会话
//! - 管理会话生命周期（初始化、认证门控）
//! - 装配服务与导航载体
//! - 实现页面的标准动作序列（导航 -> CRUD -> 更新链接 -> 导航）
//! - 批量播种蓝图并输出全局统计
//!
//! ## 层次关系
//!
//! ```text
//! builder_session (会话门面)
//!     ↓
//! workflow::CreateFlow (创建即链接逻辑单元)
//!     ↓
//! services (能力层：composition / ordering)
//!     ↓
//! infrastructure (存储能力：EntityStore)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：会话只做装配、门控和调度，不做业务判断
//! 2. **资源隔离**：只有编排层持有导航载体与服务实例
//! 3. **向下依赖**：编排层 -> workflow -> services -> infrastructure

pub mod builder_session;

// 重新导出主要类型
pub use builder_session::{BuilderSession, SeedStats};
