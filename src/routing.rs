//! 路由边界
//!
//! 编排台的每个页面由「实体 ID 参数化的路径」寻址；创建页面可以携带
//! 一个可选的查询参数指明预填父级（`testId` / `listeningId` /
//! `readingId` / `writingId`）。
//!
//! 该约定是严格契约：参数存在但无法解析时按「无预填」处理，绝不报错。

use crate::models::{EntityId, SectionKind};

/// 试卷列表页
pub const TESTS_PATH: &str = "/tests";
/// 试卷创建页
pub const TEST_CREATE_PATH: &str = "/tests/create";

/// 试卷编辑页路径
pub fn test_edit_path(id: &EntityId) -> String {
    format!("/tests/{}/edit", id)
}

/// Section 列表页路径（按类型）
pub fn section_list_path(kind: SectionKind) -> String {
    format!("/{}", kind.as_str())
}

/// Section 创建页路径
pub fn section_create_path(kind: SectionKind) -> String {
    format!("/{}/create", kind.as_str())
}

/// Section 编辑页路径
pub fn section_edit_path(kind: SectionKind, id: &EntityId) -> String {
    format!("/{}/{}/edit", kind.as_str(), id)
}

/// Section 的已链接 Part 管理页路径
pub fn linked_parts_path(kind: SectionKind, id: &EntityId) -> String {
    format!("/{}/{}/linked-parts", kind.as_str(), id)
}

/// Part 的题目管理页路径
pub fn part_questions_path(id: &EntityId) -> String {
    format!("/parts/{}/questions", id)
}

/// 写作 Section 的已链接任务管理页路径
pub fn linked_tasks_path(id: &EntityId) -> String {
    format!("/writing/{}/linked-tasks", id)
}

/// 预填父级
///
/// 查询参数解析出的强类型父级引用，创建页面用它执行「创建即链接」。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefillParent {
    /// 新 Section 预挂到该试卷
    Test(EntityId),
    /// 新 Part / 写作任务预挂到该 Section
    Section(SectionKind, EntityId),
}

impl PrefillParent {
    /// 父级实体 ID
    pub fn parent_id(&self) -> &EntityId {
        match self {
            PrefillParent::Test(id) => id,
            PrefillParent::Section(_, id) => id,
        }
    }
}

/// 从查询字符串解析预填父级
///
/// 识别的参数按 `testId`、`listeningId`、`readingId`、`writingId` 的
/// 固定优先级取第一个命中项。参数值非法（格式不符）时退化为无预填。
pub fn parse_prefill(query: &str) -> Option<PrefillParent> {
    let pairs = parse_query(query);

    let lookup = |name: &str| -> Option<EntityId> {
        pairs
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| EntityId::parse(value))
    };

    if let Some(id) = lookup("testId") {
        return Some(PrefillParent::Test(id));
    }
    for kind in SectionKind::all() {
        if let Some(id) = lookup(kind.prefill_param()) {
            return Some(PrefillParent::Section(kind, id));
        }
    }
    None
}

/// 解析查询字符串为键值对列表
///
/// 只做最小解析：按 `&` 分段、按第一个 `=` 分键值，保留原始顺序。
/// 允许前导 `?`，空段与无值的键被忽略。
fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|segment| {
            let (key, value) = segment.split_once('=')?;
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_test_prefill() {
        let prefill = parse_prefill("?testId=t-001").expect("应解析出预填父级");
        assert_eq!(prefill, PrefillParent::Test(EntityId::parse("t-001").unwrap()));
    }

    #[test]
    fn test_parse_section_prefill() {
        let prefill = parse_prefill("readingId=r_12").expect("应解析出预填父级");
        assert_eq!(
            prefill,
            PrefillParent::Section(SectionKind::Reading, EntityId::parse("r_12").unwrap())
        );
    }

    #[test]
    fn test_unparseable_prefill_degrades_to_none() {
        // 含空格的 ID 不符合格式
        assert_eq!(parse_prefill("?listeningId=bad id"), None);
        // 空值
        assert_eq!(parse_prefill("?writingId="), None);
        // 无关参数
        assert_eq!(parse_prefill("?page=2"), None);
    }

    #[test]
    fn test_prefill_priority() {
        let prefill = parse_prefill("listeningId=l-1&testId=t-1").expect("应解析出预填父级");
        assert_eq!(prefill, PrefillParent::Test(EntityId::parse("t-1").unwrap()));
    }
}
