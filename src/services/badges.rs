//! 成就与经验系统
//!
//! 内置徽章是一张声明式规则表，评估逻辑只读取 [`BadgeStats`] 快照。
//! 解锁是单调的：除非删除自定义徽章本身，已解锁的 id 不会被移除。
//! 每次解锁按稀有度奖励经验，等级始终等于 `total_xp / 100 + 1`。

use crate::error::{AppError, AppResult};
use crate::models::{
    Badge, BadgeCategory, BadgeDraft, BadgeState, Rarity, Requirement, RequirementType,
};
use crate::services::stats::BadgeStats;
use crate::services::storage::{load_snapshot, persist_snapshot, SyncAdapter, BADGES_KEY};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

pub const XP_PER_LEVEL: u32 = 100;

/// 稀有度对应的经验奖励
pub fn xp_reward(rarity: Rarity) -> u32 {
    match rarity {
        Rarity::Legendary => 50,
        Rarity::Epic => 30,
        Rarity::Rare => 20,
        Rarity::Common => 10,
    }
}

pub fn level_for_xp(total_xp: u32) -> u32 {
    total_xp / XP_PER_LEVEL + 1
}

// ==================== 内置规则表 ====================

struct BadgeRule {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    category: BadgeCategory,
    kind: RequirementType,
    value: u32,
    tag: Option<&'static str>,
    rarity: Rarity,
}

#[allow(clippy::too_many_arguments)]
const fn rule(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    category: BadgeCategory,
    kind: RequirementType,
    value: u32,
    rarity: Rarity,
) -> BadgeRule {
    BadgeRule {
        id,
        name,
        description,
        icon,
        category,
        kind,
        value,
        tag: None,
        rarity,
    }
}

const fn tag_rule(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    tag: &'static str,
    value: u32,
    rarity: Rarity,
) -> BadgeRule {
    BadgeRule {
        id,
        name,
        description,
        icon,
        category: BadgeCategory::Skill,
        kind: RequirementType::TagCount,
        value,
        tag: Some(tag),
        rarity,
    }
}

use BadgeCategory::{Milestone, Special, Streak};
use Rarity::{Common, Epic, Legendary, Rare};
use RequirementType::{AcCount, Custom, NotesCount, ProblemsSolved, StreakDays};

#[rustfmt::skip]
const BUILTIN_RULES: &[BadgeRule] = &[
    // 里程碑
    rule("first-blood", "First Blood", "完成第一道题", "🎯", Milestone, ProblemsSolved, 1, Common),
    rule("getting-started", "Getting Started", "完成 5 道题", "🌱", Milestone, ProblemsSolved, 5, Common),
    rule("double-digits", "Double Digits", "完成 10 道题", "🔟", Milestone, ProblemsSolved, 10, Common),
    rule("quarter-century", "Quarter Century", "完成 25 道题", "🎖️", Milestone, ProblemsSolved, 25, Rare),
    rule("half-century", "Half Century", "完成 50 道题", "🏅", Milestone, ProblemsSolved, 50, Rare),
    rule("centurion", "Centurion", "完成 100 道题", "💯", Milestone, ProblemsSolved, 100, Epic),
    rule("grinder", "Grinder", "完成 200 道题", "⚙️", Milestone, ProblemsSolved, 200, Epic),
    rule("veteran", "Veteran", "完成 500 道题", "🎗️", Milestone, ProblemsSolved, 500, Legendary),
    rule("grandmaster", "Grandmaster", "完成 1000 道题", "👑", Milestone, ProblemsSolved, 1000, Legendary),
    // 连续打卡
    rule("streak-3", "On Fire", "连续 3 天", "🔥", Streak, StreakDays, 3, Common),
    rule("streak-7", "Week Warrior", "连续 7 天", "📅", Streak, StreakDays, 7, Rare),
    rule("streak-14", "Fortnight Fighter", "连续 14 天", "⚔️", Streak, StreakDays, 14, Rare),
    rule("streak-30", "Monthly Master", "连续 30 天", "🗓️", Streak, StreakDays, 30, Epic),
    rule("streak-60", "Discipline God", "连续 60 天", "🧘", Streak, StreakDays, 60, Epic),
    rule("streak-100", "Unstoppable", "连续 100 天", "💎", Streak, StreakDays, 100, Legendary),
    rule("streak-365", "Year of Code", "连续 365 天", "🏆", Streak, StreakDays, 365, Legendary),
    // AC 数量
    rule("first-ac", "Accepted!", "第一次 AC", "✅", Milestone, AcCount, 1, Common),
    rule("ac-10", "Green Machine", "10 次 AC", "🟢", Milestone, AcCount, 10, Common),
    rule("ac-50", "AC Collector", "50 次 AC", "🎯", Milestone, AcCount, 50, Rare),
    rule("ac-100", "AC Hunter", "100 次 AC", "🎖️", Milestone, AcCount, 100, Epic),
    rule("ac-500", "AC Legend", "500 次 AC", "🌟", Milestone, AcCount, 500, Legendary),
    // 专项（按标签计数）
    tag_rule("dp-beginner", "DP Initiate", "5 道 DP 题", "📊", "dp", 5, Common),
    tag_rule("dp-master", "DP Master", "25 道 DP 题", "📈", "dp", 25, Epic),
    tag_rule("graph-beginner", "Graph Explorer", "5 道图论题", "🕸️", "graphs", 5, Common),
    tag_rule("graph-master", "Graph Architect", "25 道图论题", "🏗️", "graphs", 25, Epic),
    tag_rule("math-beginner", "Math Enthusiast", "5 道数学题", "🔢", "math", 5, Common),
    tag_rule("math-master", "Mathematician", "25 道数学题", "🧮", "math", 25, Epic),
    tag_rule("greedy-beginner", "Greedy Thinker", "5 道贪心题", "💡", "greedy", 5, Common),
    tag_rule("greedy-master", "Optimization Guru", "25 道贪心题", "⚡", "greedy", 25, Epic),
    tag_rule("binary-search-pro", "Binary Search Pro", "10 道二分题", "🔍", "binary-search", 10, Rare),
    tag_rule("tree-climber", "Tree Climber", "10 道树题", "🌳", "trees", 10, Rare),
    tag_rule("string-master", "String Maestro", "15 道字符串题", "🎻", "strings", 15, Rare),
    tag_rule("segment-tree-pro", "Segment Tree Pro", "5 道线段树题", "🌲", "segment-tree", 5, Epic),
    // 特殊
    rule("note-taker", "Note Taker", "写下第一篇笔记", "📝", Special, NotesCount, 1, Common),
    rule("knowledge-base", "Knowledge Base", "写下 10 篇笔记", "📚", Special, NotesCount, 10, Rare),
    rule("grimoire-master", "Grimoire Master", "写下 50 篇笔记", "📖", Special, NotesCount, 50, Epic),
    rule("early-bird", "Early Bird", "8 点前完成一道题", "🐦", Special, Custom, 1, Rare),
    rule("night-owl", "Night Owl", "午夜后完成一道题", "🦉", Special, Custom, 1, Rare),
    rule("weekend-warrior", "Weekend Warrior", "周末完成 10 道题", "🎮", Special, Custom, 10, Rare),
];

/// 内置徽章目录，首次访问时由规则表构建
pub fn builtin_badges() -> &'static [Badge] {
    static CATALOG: OnceLock<Vec<Badge>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        BUILTIN_RULES
            .iter()
            .map(|r| Badge {
                id: r.id.to_string(),
                name: r.name.to_string(),
                description: r.description.to_string(),
                icon: r.icon.to_string(),
                category: r.category,
                requirement: Requirement {
                    kind: r.kind,
                    value: r.value,
                    tag: r.tag.map(str::to_string),
                },
                rarity: r.rarity,
                is_custom: false,
            })
            .collect()
    })
}

/// 判断规则是否满足；custom 类型从不自动满足
pub fn requirement_met(requirement: &Requirement, stats: &BadgeStats) -> bool {
    let target = requirement.value;
    match requirement.kind {
        RequirementType::ProblemsSolved => stats.problems_solved >= target,
        RequirementType::AcCount => stats.ac_count >= target,
        RequirementType::StreakDays => stats.streak_days >= target,
        RequirementType::NotesCount => stats.notes_count >= target,
        RequirementType::TagCount => match &requirement.tag {
            Some(tag) => {
                let tag = tag.trim().to_lowercase();
                stats.tag_counts.get(&tag).copied().unwrap_or(0) >= target
            }
            None => false,
        },
        RequirementType::Custom => false,
    }
}

/// 等级进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: u32,
    pub total_xp: u32,
    /// 当前等级内已获得的经验
    pub xp_into_level: u32,
    /// 升到下一级还需要的经验
    pub xp_to_next_level: u32,
}

// ==================== 容器 ====================

pub struct BadgeStore {
    state: BadgeState,
    adapter: Arc<SyncAdapter>,
}

impl BadgeStore {
    pub fn new(adapter: Arc<SyncAdapter>) -> Self {
        Self {
            state: BadgeState::default(),
            adapter,
        }
    }

    pub fn load(adapter: Arc<SyncAdapter>) -> Self {
        let snapshot = load_snapshot::<BadgeState>(&adapter, BADGES_KEY).unwrap_or_default();
        let mut store = Self::new(adapter);
        store.init(snapshot);
        store
    }

    /// 载入快照，等级按经验重新计算
    pub fn init(&mut self, mut snapshot: BadgeState) {
        snapshot.level = level_for_xp(snapshot.total_xp);
        self.state = snapshot;
    }

    pub fn reset(&mut self) {
        self.state = BadgeState::default();
    }

    pub fn state(&self) -> &BadgeState {
        &self.state
    }

    pub fn total_xp(&self) -> u32 {
        self.state.total_xp
    }

    pub fn level(&self) -> u32 {
        self.state.level
    }

    pub fn unlocked_ids(&self) -> &[String] {
        &self.state.unlocked_badges
    }

    pub fn custom_badges(&self) -> &[Badge] {
        &self.state.custom_badges
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.state.unlocked_badges.iter().any(|u| u == id)
    }

    /// 先查内置目录，再查自定义徽章
    pub fn get_badge_by_id(&self, id: &str) -> Option<&Badge> {
        builtin_badges()
            .iter()
            .find(|b| b.id == id)
            .or_else(|| self.state.custom_badges.iter().find(|b| b.id == id))
    }

    /// 完整目录：内置在前，自定义在后
    pub fn all_badges(&self) -> Vec<Badge> {
        builtin_badges()
            .iter()
            .chain(self.state.custom_badges.iter())
            .cloned()
            .collect()
    }

    pub fn level_progress(&self) -> LevelProgress {
        let xp_into_level = self.state.total_xp % XP_PER_LEVEL;
        LevelProgress {
            level: self.state.level,
            total_xp: self.state.total_xp,
            xp_into_level,
            xp_to_next_level: XP_PER_LEVEL - xp_into_level,
        }
    }

    pub fn add_xp(&mut self, amount: u32) -> AppResult<()> {
        self.grant_xp(amount);
        self.persist();
        Ok(())
    }

    fn grant_xp(&mut self, amount: u32) {
        self.state.total_xp = self.state.total_xp.saturating_add(amount);
        self.state.level = level_for_xp(self.state.total_xp);
    }

    /// 手动解锁（custom 类型的唯一途径），不奖励经验；返回是否新解锁
    pub fn unlock_badge(&mut self, id: &str) -> AppResult<bool> {
        if self.get_badge_by_id(id).is_none() {
            return Err(AppError::Validation(format!("unknown badge: {}", id)));
        }
        if self.is_unlocked(id) {
            return Ok(false);
        }

        self.state.unlocked_badges.push(id.to_string());
        log::info!("badge {} unlocked manually", id);
        self.persist();
        Ok(true)
    }

    pub fn add_custom_badge(&mut self, draft: BadgeDraft) -> AppResult<Badge> {
        draft.validate()?;

        let badge = Badge {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            description: draft.description,
            icon: draft.icon,
            category: draft.category,
            requirement: draft.requirement,
            rarity: draft.rarity,
            is_custom: true,
        };

        self.state.custom_badges.push(badge.clone());
        log::debug!("added custom badge {}", badge.id);
        self.persist();
        Ok(badge)
    }

    /// 从自定义目录与已解锁集合中同时移除
    pub fn delete_custom_badge(&mut self, id: &str) -> AppResult<bool> {
        let customs = self.state.custom_badges.len();
        let unlocked = self.state.unlocked_badges.len();
        self.state.custom_badges.retain(|b| b.id != id);
        self.state.unlocked_badges.retain(|u| u != id);

        let changed = customs != self.state.custom_badges.len()
            || unlocked != self.state.unlocked_badges.len();
        if !changed {
            return Ok(false);
        }

        log::debug!("deleted custom badge {}", id);
        self.persist();
        Ok(true)
    }

    /// 评估所有未解锁徽章，返回本轮新解锁的 id；整轮只持久化一次
    pub fn check_and_unlock_badges(&mut self, stats: &BadgeStats) -> AppResult<Vec<String>> {
        let newly_unlocked: Vec<(String, Rarity)> = builtin_badges()
            .iter()
            .chain(self.state.custom_badges.iter())
            .filter(|badge| !self.is_unlocked(&badge.id))
            .filter(|badge| requirement_met(&badge.requirement, stats))
            .map(|badge| (badge.id.clone(), badge.rarity))
            .collect();

        if newly_unlocked.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(newly_unlocked.len());
        for (id, rarity) in newly_unlocked {
            self.state.unlocked_badges.push(id.clone());
            self.grant_xp(xp_reward(rarity));
            log::info!("badge {} unlocked (+{} XP)", id, xp_reward(rarity));
            ids.push(id);
        }

        self.persist();
        Ok(ids)
    }

    fn persist(&self) -> bool {
        persist_snapshot(&self.adapter, BADGES_KEY, &self.state)
    }
}
