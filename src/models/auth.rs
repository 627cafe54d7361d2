use serde::{Deserialize, Serialize};

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 管理员
    Admin,
    /// 内容编辑
    Editor,
    /// 只读
    Viewer,
}

impl Role {
    /// 是否允许写操作
    pub fn can_write(self) -> bool {
        matches!(self, Role::Admin | Role::Editor)
    }
}

/// 外部认证模块提供的会话状态
///
/// loading 为 true 期间，核心层的任何数据 / 导航操作都不会被调用。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthState {
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub loading: bool,
}

impl AuthState {
    /// 认证信息尚未就绪
    pub fn loading() -> Self {
        Self {
            is_authenticated: false,
            role: None,
            loading: true,
        }
    }

    /// 已完成认证
    pub fn authenticated(role: Role) -> Self {
        Self {
            is_authenticated: true,
            role: Some(role),
            loading: false,
        }
    }

    /// 是否可以发起数据操作
    pub fn ready(&self) -> bool {
        !self.loading && self.is_authenticated
    }
}
