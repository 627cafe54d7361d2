use serde::{Deserialize, Serialize};

/// 题目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// 单选
    MultipleChoice,
    /// 填空
    FillBlank,
    /// 匹配
    Matching,
    /// 判断（True / False / Not Given）
    TrueFalseNotGiven,
    /// 简答
    ShortAnswer,
    #[default]
    Other,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::FillBlank => "fill_blank",
            QuestionType::Matching => "matching",
            QuestionType::TrueFalseNotGiven => "true_false_not_given",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "multiple_choice" => QuestionType::MultipleChoice,
            "fill_blank" => QuestionType::FillBlank,
            "matching" => QuestionType::Matching,
            "true_false_not_given" => QuestionType::TrueFalseNotGiven,
            "short_answer" => QuestionType::ShortAnswer,
            _ => QuestionType::Other,
        }
    }
}
