use serde::{Deserialize, Serialize};

/// Section 类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    /// 听力
    Listening = 1,
    /// 阅读
    Reading = 2,
    /// 写作
    Writing = 3,
}

impl SectionKind {
    /// 获取类型代码
    pub fn code(self) -> i16 {
        self as i16
    }

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            SectionKind::Listening => "听力",
            SectionKind::Reading => "阅读",
            SectionKind::Writing => "写作",
        }
    }

    /// 获取英文标识（蓝图文件和路由中使用）
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Listening => "listening",
            SectionKind::Reading => "reading",
            SectionKind::Writing => "writing",
        }
    }

    /// 创建页面预填父级 ID 的查询参数名
    pub fn prefill_param(self) -> &'static str {
        match self {
            SectionKind::Listening => "listeningId",
            SectionKind::Reading => "readingId",
            SectionKind::Writing => "writingId",
        }
    }

    /// 从代码解析类型
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(SectionKind::Listening),
            2 => Some(SectionKind::Reading),
            3 => Some(SectionKind::Writing),
            _ => None,
        }
    }

    /// 从英文标识解析类型
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "listening" => Some(SectionKind::Listening),
            "reading" => Some(SectionKind::Reading),
            "writing" => Some(SectionKind::Writing),
            _ => None,
        }
    }

    /// 全部类型，按试卷展示顺序
    pub fn all() -> [SectionKind; 3] {
        [
            SectionKind::Listening,
            SectionKind::Reading,
            SectionKind::Writing,
        ]
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
