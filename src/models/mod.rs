// 领域数据结构
// 题目、笔记、代码片段、徽章与目标状态，序列化字段沿用 camelCase 以兼容已有存储

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==================== 题目 ====================

/// 提交状态
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProblemStatus {
    AC,
    WA,
    TLE,
    MLE,
    RE,
    DOING,
}

/// 题目来源平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Codeforces,
    LeetCode,
    Beecrowd,
    AtCoder,
    Other,
}

/// 题目记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u32>,
    pub status: ProblemStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u32>,   // 分钟
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_note_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved_at: Option<DateTime<Utc>>,
}

impl Problem {
    pub fn is_accepted(&self) -> bool {
        self.status == ProblemStatus::AC
    }
}

/// 新建题目的输入（不含 id 与时间戳）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDraft {
    pub title: String,
    pub platform: Platform,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub difficulty: Option<u32>,
    pub status: ProblemStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub time_spent: Option<u32>,
    #[serde(default)]
    pub quick_notes: Option<String>,
    #[serde(default)]
    pub linked_note_id: Option<String>,
}

impl ProblemDraft {
    pub fn new(title: impl Into<String>, platform: Platform, status: ProblemStatus) -> Self {
        Self {
            title: title.into(),
            platform,
            link: None,
            difficulty: None,
            status,
            tags: Vec::new(),
            time_spent: None,
            quick_notes: None,
            linked_note_id: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        require_text("title", &self.title)
    }
}

/// 题目的部分更新，`Option<Option<T>>` 的外层 None 表示不修改
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemPatch {
    pub title: Option<String>,
    pub platform: Option<Platform>,
    pub link: Option<Option<String>>,
    pub difficulty: Option<Option<u32>>,
    pub status: Option<ProblemStatus>,
    pub tags: Option<Vec<String>>,
    pub time_spent: Option<Option<u32>>,
    pub quick_notes: Option<Option<String>>,
    pub linked_note_id: Option<Option<String>>,
}

impl ProblemPatch {
    pub fn validate(&self) -> AppResult<()> {
        optional_text("title", self.title.as_deref())
    }
}

// ==================== 笔记 ====================

/// Markdown 笔记
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            category: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        require_text("title", &self.title)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<Option<String>>,
}

impl NotePatch {
    pub fn validate(&self) -> AppResult<()> {
        optional_text("title", self.title.as_deref())
    }
}

// ==================== 代码片段 ====================

/// 代码片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: String,
    pub title: String,
    pub description: String,
    pub language: String,
    pub code: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SnippetDraft {
    pub fn validate(&self) -> AppResult<()> {
        require_text("title", &self.title)?;
        require_text("code", &self.code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub code: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl SnippetPatch {
    pub fn validate(&self) -> AppResult<()> {
        optional_text("title", self.title.as_deref())?;
        optional_text("code", self.code.as_deref())
    }
}

// ==================== 徽章 ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Milestone,
    Streak,
    Skill,
    Special,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    ProblemsSolved,
    StreakDays,
    AcCount,
    TagCount,
    NotesCount,
    Custom,
}

/// 徽章稀有度，决定解锁奖励的经验值
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(rename = "type")]
    pub kind: RequirementType,
    pub value: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: BadgeCategory,
    pub requirement: Requirement,
    pub rarity: Rarity,
    #[serde(default)]
    pub is_custom: bool,
}

/// 用户自定义徽章的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub icon: String,
    #[serde(default = "custom_category")]
    pub category: BadgeCategory,
    pub requirement: Requirement,
    pub rarity: Rarity,
}

fn custom_category() -> BadgeCategory {
    BadgeCategory::Custom
}

impl BadgeDraft {
    pub fn validate(&self) -> AppResult<()> {
        require_text("name", &self.name)?;
        if self.requirement.kind == RequirementType::TagCount && self.requirement.tag.is_none() {
            return Err(AppError::Validation(
                "tag_count requirement needs a tag".to_string(),
            ));
        }
        Ok(())
    }
}

// ==================== 目标与成就状态 ====================

/// 每日/每周目标状态（持久化键 goals）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalState {
    pub daily_target: u32,
    pub weekly_target: u32,
    #[serde(default)]
    pub completed_days: Vec<String>,
    /// 保留字段，当前没有任何规则会自动递增
    #[serde(default)]
    pub weekly_completions: u32,
}

impl Default for GoalState {
    fn default() -> Self {
        Self {
            daily_target: 3,
            weekly_target: 15,
            completed_days: Vec::new(),
            weekly_completions: 0,
        }
    }
}

/// 徽章解锁与经验状态（持久化键 badges）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeState {
    #[serde(default)]
    pub unlocked_badges: Vec<String>,
    #[serde(default)]
    pub custom_badges: Vec<Badge>,
    #[serde(rename = "totalXP", default)]
    pub total_xp: u32,
    #[serde(default = "first_level")]
    pub level: u32,
}

fn first_level() -> u32 {
    1
}

impl Default for BadgeState {
    fn default() -> Self {
        Self {
            unlocked_badges: Vec::new(),
            custom_badges: Vec::new(),
            total_xp: 0,
            level: 1,
        }
    }
}

// ==================== 辅助方法 ====================

/// 标签规范化：去空白、转小写、去空、去重（保留首次出现顺序）
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// 补丁中给出的字段同样不能为空
fn optional_text(field: &str, value: Option<&str>) -> AppResult<()> {
    value.map_or(Ok(()), |value| require_text(field, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(vec![" DP ", "graphs", "dp", "", "  ", "Graphs", "math"]);
        assert_eq!(tags, vec!["dp", "graphs", "math"]);
    }

    #[test]
    fn test_draft_validation_rejects_blank_title() {
        let draft = ProblemDraft::new("   ", Platform::Codeforces, ProblemStatus::AC);
        assert!(matches!(draft.validate(), Err(AppError::Validation(_))));

        let draft = ProblemDraft::new("Watermelon", Platform::Codeforces, ProblemStatus::AC);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_patch_validation_rejects_blank_fields() {
        assert!(ProblemPatch::default().validate().is_ok());

        let patch = ProblemPatch {
            title: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(patch.validate(), Err(AppError::Validation(_))));

        let patch = NotePatch {
            title: Some(String::new()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());

        let patch = SnippetPatch {
            code: Some("\n\t".to_string()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_problem_serializes_camel_case() {
        let created = "2026-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let problem = Problem {
            id: "p1".to_string(),
            title: "Two Sum".to_string(),
            platform: Platform::LeetCode,
            link: None,
            difficulty: Some(800),
            status: ProblemStatus::AC,
            tags: vec!["math".to_string()],
            time_spent: None,
            quick_notes: Some("hash map".to_string()),
            linked_note_id: None,
            created_at: created,
            solved_at: Some(created),
        };

        let value = serde_json::to_value(&problem).unwrap();
        assert_eq!(value["status"], "AC");
        assert_eq!(value["platform"], "LeetCode");
        assert_eq!(value["quickNotes"], "hash map");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("solvedAt").is_some());
        assert!(value.get("link").is_none());
    }

    #[test]
    fn test_badge_state_field_names() {
        let state: BadgeState =
            serde_json::from_str(r#"{"unlockedBadges":["first-ac"],"totalXP":120}"#).unwrap();
        assert_eq!(state.total_xp, 120);
        assert_eq!(state.level, 1);
        assert!(state.custom_badges.is_empty());

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["totalXP"], 120);
    }

    #[test]
    fn test_requirement_type_wire_names() {
        let req: Requirement =
            serde_json::from_str(r#"{"type":"tag_count","value":5,"tag":"dp"}"#).unwrap();
        assert_eq!(req.kind, RequirementType::TagCount);
        assert_eq!(req.tag.as_deref(), Some("dp"));
    }
}
