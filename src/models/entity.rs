use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::question_type::QuestionType;
use crate::models::section_kind::SectionKind;

/// 实体 ID
///
/// 存储服务分配的不透明 ID，格式限定为 `[A-Za-z0-9_-]{1,64}`。
/// 路由边界收到的非法 ID 一律解析为 None，不会进入核心层。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// 解析并校验 ID 字符串
    pub fn parse(raw: &str) -> Option<Self> {
        if let Ok(re) = Regex::new(r"^[A-Za-z0-9_-]{1,64}$") {
            if re.is_match(raw) {
                return Some(Self(raw.to_string()));
            }
        }
        None
    }

    /// 生成新的实体 ID（UUID v4）
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 版本令牌
///
/// 存储服务在读取时返回、更新时校验的乐观并发令牌。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(pub u64);

impl VersionToken {
    pub fn initial() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// 链接请求令牌
///
/// 每个逻辑链接动作生成一次（而非每次网络重试生成一次），
/// 用于区分幂等重试与真正的重复链接。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(String);

impl RequestToken {
    /// 生成新的请求令牌（UUID v4）
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 实体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Test,
    Section,
    Part,
    Question,
    WritingTask,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Test => "test",
            EntityKind::Section => "section",
            EntityKind::Part => "part",
            EntityKind::Question => "question",
            EntityKind::WritingTask => "writing_task",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 试卷元信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

/// 按 Section 类型划分的有序引用列表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionRefs {
    #[serde(default)]
    pub listening: Vec<EntityId>,
    #[serde(default)]
    pub reading: Vec<EntityId>,
    #[serde(default)]
    pub writing: Vec<EntityId>,
}

impl SectionRefs {
    pub fn list(&self, kind: SectionKind) -> &Vec<EntityId> {
        match kind {
            SectionKind::Listening => &self.listening,
            SectionKind::Reading => &self.reading,
            SectionKind::Writing => &self.writing,
        }
    }

    pub fn list_mut(&mut self, kind: SectionKind) -> &mut Vec<EntityId> {
        match kind {
            SectionKind::Listening => &mut self.listening,
            SectionKind::Reading => &mut self.reading,
            SectionKind::Writing => &mut self.writing,
        }
    }

    /// 遍历全部三类引用列表
    pub fn all(&self) -> impl Iterator<Item = (SectionKind, &Vec<EntityId>)> {
        [
            (SectionKind::Listening, &self.listening),
            (SectionKind::Reading, &self.reading),
            (SectionKind::Writing, &self.writing),
        ]
        .into_iter()
    }
}

/// 题目分组（共享同一段提示语的连续题目区间，闭区间）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionGroup {
    pub start: usize,
    pub end: usize,
    pub prompt: String,
}

impl QuestionGroup {
    /// 判断分组是否覆盖指定下标
    pub fn covers(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    /// 判断两个闭区间是否相交
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start <= end && start <= self.end
    }
}

/// 实体负载数据
///
/// 所有实体共用一个信封类型存入存储服务，kind 字段作为判别标签。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityData {
    Test {
        title: String,
        #[serde(default)]
        metadata: TestMetadata,
        #[serde(default)]
        sections: SectionRefs,
    },
    Section {
        section_kind: SectionKind,
        title: String,
        /// 音频 / 文章素材引用
        #[serde(skip_serializing_if = "Option::is_none")]
        payload_ref: Option<String>,
        #[serde(default)]
        part_ids: Vec<EntityId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        test_id: Option<EntityId>,
    },
    Part {
        section_kind: SectionKind,
        title: String,
        #[serde(default)]
        question_ids: Vec<EntityId>,
        #[serde(default)]
        groups: Vec<QuestionGroup>,
        #[serde(skip_serializing_if = "Option::is_none")]
        section_id: Option<EntityId>,
    },
    Question {
        #[serde(skip_serializing_if = "Option::is_none")]
        part_id: Option<EntityId>,
        question_type: QuestionType,
        stem: String,
        #[serde(default)]
        answer_key: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        imgs: Option<Vec<String>>,
    },
    WritingTask {
        #[serde(skip_serializing_if = "Option::is_none")]
        writing_id: Option<EntityId>,
        prompt: String,
    },
}

impl EntityData {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Test { .. } => EntityKind::Test,
            EntityData::Section { .. } => EntityKind::Section,
            EntityData::Part { .. } => EntityKind::Part,
            EntityData::Question { .. } => EntityKind::Question,
            EntityData::WritingTask { .. } => EntityKind::WritingTask,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            EntityData::Test { title, .. } => title,
            EntityData::Section { title, .. } => title,
            EntityData::Part { title, .. } => title,
            EntityData::Question { stem, .. } => stem,
            EntityData::WritingTask { prompt, .. } => prompt,
        }
    }

    /// 有序子 ID 列表（试卷按听力、阅读、写作的展示顺序拼接）
    pub fn child_ids(&self) -> Vec<EntityId> {
        match self {
            EntityData::Test { sections, .. } => sections
                .all()
                .flat_map(|(_, ids)| ids.iter().cloned())
                .collect(),
            EntityData::Section { part_ids, .. } => part_ids.clone(),
            EntityData::Part { question_ids, .. } => question_ids.clone(),
            EntityData::Question { .. } | EntityData::WritingTask { .. } => Vec::new(),
        }
    }

    /// 指向父节点的反向引用
    pub fn parent_ref(&self) -> Option<&EntityId> {
        match self {
            EntityData::Test { .. } => None,
            EntityData::Section { test_id, .. } => test_id.as_ref(),
            EntityData::Part { section_id, .. } => section_id.as_ref(),
            EntityData::Question { part_id, .. } => part_id.as_ref(),
            EntityData::WritingTask { writing_id, .. } => writing_id.as_ref(),
        }
    }
}

/// 存储中的完整实体记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub version: VersionToken,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: EntityData,
}

/// 列表查询返回的实体摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: EntityId,
    pub entity_kind: EntityKind,
    pub title: String,
    pub version: VersionToken,
}

/// 列表查询过滤条件
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// 只返回该类型的实体
    pub entity_kind: Option<EntityKind>,
    /// 标题包含该关键字
    pub title_contains: Option<String>,
}
