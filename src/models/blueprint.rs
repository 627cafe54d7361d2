use serde::{Deserialize, Serialize};

/// 试卷蓝图
///
/// 从 TOML 草稿文件加载的整卷大纲，用于一次性创建并链接全部节点。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestBlueprint {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default)]
    pub sections: Vec<SectionBlueprint>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

/// Section 蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionBlueprint {
    /// listening / reading / writing
    pub kind: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_ref: Option<String>,
    #[serde(default)]
    pub parts: Vec<PartBlueprint>,
    /// 写作 Section 直接挂任务，不经过 Part 层
    #[serde(default)]
    pub tasks: Vec<WritingTaskBlueprint>,
}

/// Part 蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartBlueprint {
    pub title: String,
    #[serde(default)]
    pub stemlist: Vec<QuestionBlueprint>,
}

/// 题目蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBlueprint {
    pub stem: String,
    #[serde(default)]
    pub question_type: String,
    #[serde(default)]
    pub answer: serde_json::Value,
}

/// 写作任务蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritingTaskBlueprint {
    pub prompt: String,
}

impl TestBlueprint {
    /// 蓝图中的节点总数（试卷本身 + Section + Part + 题目 + 写作任务）
    pub fn node_count(&self) -> usize {
        let mut count = 1;
        for section in &self.sections {
            count += 1 + section.tasks.len();
            for part in &section.parts {
                count += 1 + part.stemlist.len();
            }
        }
        count
    }
}
