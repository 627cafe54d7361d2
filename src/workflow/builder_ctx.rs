//! 编排页面上下文
//!
//! 封装"我在哪个页面、带着哪个预填父级"这一信息

use std::fmt::Display;

use crate::models::RequestToken;
use crate::routing::{self, PrefillParent};

/// 编排页面上下文
///
/// 一个创建页面的一次逻辑动作对应一个上下文：路由路径、解析好的
/// 预填父级，以及为本次动作铸造的链接请求令牌。令牌按逻辑动作
/// 铸造一次，网络重试复用同一令牌，借此区分幂等重试与重复链接。
#[derive(Debug, Clone)]
pub struct BuilderCtx {
    /// 当前页面路径
    pub path: String,

    /// 预填父级（创建页面的 `xxxId` 查询参数解析结果）
    pub prefill: Option<PrefillParent>,

    /// 本次逻辑动作的链接请求令牌
    pub request_token: RequestToken,
}

impl BuilderCtx {
    /// 创建新的页面上下文
    pub fn new(path: impl Into<String>, prefill: Option<PrefillParent>) -> Self {
        Self {
            path: path.into(),
            prefill,
            request_token: RequestToken::mint(),
        }
    }

    /// 从路由路径与查询字符串构建上下文
    ///
    /// 查询参数存在但无法解析时按无预填处理（路由边界契约）。
    pub fn from_route(path: &str, query: &str) -> Self {
        Self::new(path, routing::parse_prefill(query))
    }
}

impl Display for BuilderCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.prefill {
            Some(prefill) => write!(f, "[页面 {} 预填父级#{}]", self.path, prefill.parent_id()),
            None => write!(f, "[页面 {} 无预填]", self.path),
        }
    }
}
