use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 实体存储错误
    Store(StoreError),
    /// 组合链接错误
    Link(LinkError),
    /// 题目排序错误
    Order(OrderError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Store(e) => write!(f, "存储错误: {}", e),
            AppError::Link(e) => write!(f, "链接错误: {}", e),
            AppError::Order(e) => write!(f, "排序错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Store(e) => Some(e),
            AppError::Link(e) => Some(e),
            AppError::Order(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 实体存储错误
#[derive(Debug)]
pub enum StoreError {
    /// 实体不存在
    NotFound {
        id: String,
    },
    /// 版本令牌过期（乐观并发冲突）
    StaleVersion {
        id: String,
        supplied: u64,
        current: u64,
    },
    /// 网络请求失败
    RequestFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 存储服务返回错误响应
    BadResponse {
        endpoint: String,
        code: Option<u64>,
        message: Option<String>,
    },
    /// 请求频率限制
    RateLimited {
        endpoint: String,
        retry_after: Option<u64>,
    },
    /// JSON 解析失败
    JsonParseFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { id } => write!(f, "实体不存在: {}", id),
            StoreError::StaleVersion {
                id,
                supplied,
                current,
            } => {
                write!(
                    f,
                    "版本令牌过期 (实体: {}): 提交版本 {}, 当前版本 {}",
                    id, supplied, current
                )
            }
            StoreError::RequestFailed { endpoint, source } => {
                write!(f, "存储请求失败 ({}): {}", endpoint, source)
            }
            StoreError::BadResponse {
                endpoint,
                code,
                message,
            } => {
                write!(
                    f,
                    "存储服务返回错误响应 ({}): code={:?}, message={:?}",
                    endpoint, code, message
                )
            }
            StoreError::RateLimited {
                endpoint,
                retry_after,
            } => {
                write!(
                    f,
                    "存储请求频率限制 ({}), 建议等待: {:?}秒",
                    endpoint, retry_after
                )
            }
            StoreError::JsonParseFailed { source } => {
                write!(f, "JSON解析失败: {}", source)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::RequestFailed { source, .. } | StoreError::JsonParseFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 组合链接错误
#[derive(Debug)]
pub enum LinkError {
    /// 父子对未链接（unlink 时找不到该子节点）
    NotFound {
        parent_id: String,
        child_id: String,
    },
    /// 子节点已链接到父节点
    AlreadyLinked {
        parent_id: String,
        child_id: String,
    },
    /// 链接会形成环（调用方的程序错误，任何 UI 路径都不应触发）
    CycleDetected {
        parent_id: String,
        child_id: String,
    },
    /// 父子类型不匹配（如阅读 Part 链接到听力 Section）
    KindMismatch {
        parent_id: String,
        child_id: String,
        expected: String,
        actual: String,
    },
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::NotFound {
                parent_id,
                child_id,
            } => {
                write!(f, "父节点 {} 下未链接子节点 {}", parent_id, child_id)
            }
            LinkError::AlreadyLinked {
                parent_id,
                child_id,
            } => {
                write!(f, "子节点 {} 已链接到父节点 {}", child_id, parent_id)
            }
            LinkError::CycleDetected {
                parent_id,
                child_id,
            } => {
                write!(
                    f,
                    "链接 {} -> {} 会形成环，调用流程存在程序错误",
                    parent_id, child_id
                )
            }
            LinkError::KindMismatch {
                parent_id,
                child_id,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "类型不匹配: 父节点 {} 要求 {}, 子节点 {} 实际为 {}",
                    parent_id, expected, child_id, actual
                )
            }
        }
    }
}

impl std::error::Error for LinkError {}

/// 题目排序错误
#[derive(Debug)]
pub enum OrderError {
    /// reorder 提交的 id 集合与当前子节点集合不一致
    InvalidOrder {
        parent_id: String,
        reason: String,
    },
    /// 目标位置超出列表长度
    OutOfRange {
        position: usize,
        len: usize,
    },
    /// 分组区间非法（start > end 或越界，或破坏已有分组）
    InvalidRange {
        start: usize,
        end: usize,
        len: usize,
    },
    /// 分组区间与已有分组重叠
    OverlappingGroup {
        start: usize,
        end: usize,
        existing_start: usize,
        existing_end: usize,
    },
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderError::InvalidOrder { parent_id, reason } => {
                write!(f, "非法排序 (父节点: {}): {}", parent_id, reason)
            }
            OrderError::OutOfRange { position, len } => {
                write!(f, "位置 {} 超出范围 [0, {})", position, len)
            }
            OrderError::InvalidRange { start, end, len } => {
                write!(f, "分组区间 [{}, {}] 非法 (列表长度: {})", start, end, len)
            }
            OrderError::OverlappingGroup {
                start,
                end,
                existing_start,
                existing_end,
            } => {
                write!(
                    f,
                    "分组区间 [{}, {}] 与已有分组 [{}, {}] 重叠",
                    start, end, existing_start, existing_end
                )
            }
        }
    }
}

impl std::error::Error for OrderError {}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 环境变量不存在
    EnvVarNotFound {
        var_name: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::EnvVarNotFound { var_name } => {
                write!(f, "环境变量 {} 不存在", var_name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// 因为 anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Store(StoreError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Store(StoreError::RequestFailed {
            endpoint: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_default(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建实体不存在错误
    pub fn store_not_found(id: impl Into<String>) -> Self {
        AppError::Store(StoreError::NotFound { id: id.into() })
    }

    /// 创建版本令牌过期错误
    pub fn stale_version(id: impl Into<String>, supplied: u64, current: u64) -> Self {
        AppError::Store(StoreError::StaleVersion {
            id: id.into(),
            supplied,
            current,
        })
    }

    /// 创建已链接错误
    pub fn already_linked(parent_id: impl Into<String>, child_id: impl Into<String>) -> Self {
        AppError::Link(LinkError::AlreadyLinked {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
        })
    }

    /// 创建未链接错误
    pub fn not_linked(parent_id: impl Into<String>, child_id: impl Into<String>) -> Self {
        AppError::Link(LinkError::NotFound {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
        })
    }

    /// 创建成环错误
    pub fn cycle_detected(parent_id: impl Into<String>, child_id: impl Into<String>) -> Self {
        AppError::Link(LinkError::CycleDetected {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
        })
    }

    /// 创建位置越界错误
    pub fn out_of_range(position: usize, len: usize) -> Self {
        AppError::Order(OrderError::OutOfRange { position, len })
    }

    /// 判断当前错误是否为版本冲突，调用方应重新读取后重试
    pub fn is_stale_version(&self) -> bool {
        matches!(self, AppError::Store(StoreError::StaleVersion { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
