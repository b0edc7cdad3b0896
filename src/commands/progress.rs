// 进度类命令
// 统计、目标、徽章以及进度刷新

use crate::models::{Badge, BadgeDraft, GoalState};
use crate::services::{
    stats, AppServices, Dashboard, HeatmapDay, HeatmapRange, LevelProgress, ProgressReport,
    TagCount, WeekBucket,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tauri::State;

/// 徽章墙中的一项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeView {
    #[serde(flatten)]
    pub badge: Badge,
    pub unlocked: bool,
}

/// 徽章墙
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeOverview {
    pub badges: Vec<BadgeView>,
    pub unlocked_count: usize,
    pub progress: LevelProgress,
}

// ==================== 统计 ====================

#[tauri::command]
pub async fn get_dashboard(state: State<'_, AppServices>) -> Result<Dashboard, String> {
    state.dashboard().map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_heatmap(
    range: Option<HeatmapRange>,
    state: State<'_, AppServices>,
) -> Result<Vec<HeatmapDay>, String> {
    let problems = state.problems().map_err(|e| e.to_string())?;
    Ok(stats::heatmap(problems.all(), range.unwrap_or_default()))
}

#[tauri::command]
pub async fn get_tag_histogram(
    limit: Option<usize>,
    state: State<'_, AppServices>,
) -> Result<Vec<TagCount>, String> {
    let problems = state.problems().map_err(|e| e.to_string())?;
    Ok(match limit {
        Some(limit) => stats::top_tags(problems.all(), limit),
        None => stats::tag_histogram(problems.all()),
    })
}

#[tauri::command]
pub async fn get_weekly_chart(state: State<'_, AppServices>) -> Result<Vec<WeekBucket>, String> {
    let problems = state.problems().map_err(|e| e.to_string())?;
    Ok(stats::weekly_chart(problems.all(), Utc::now().date_naive()))
}

/// 记录变更后由前端调用：评估徽章并检查每日目标
#[tauri::command]
pub async fn refresh_progress(state: State<'_, AppServices>) -> Result<ProgressReport, String> {
    state.refresh_progress().map_err(|e| e.to_string())
}

// ==================== 目标 ====================

#[tauri::command]
pub async fn get_goals(state: State<'_, AppServices>) -> Result<GoalState, String> {
    let goals = state.goals().map_err(|e| e.to_string())?;
    Ok(goals.state().clone())
}

#[tauri::command]
pub async fn set_goal_targets(
    daily: Option<u32>,
    weekly: Option<u32>,
    state: State<'_, AppServices>,
) -> Result<GoalState, String> {
    let mut goals = state.goals().map_err(|e| e.to_string())?;
    if let Some(daily) = daily {
        goals.set_daily_target(daily).map_err(|e| e.to_string())?;
    }
    if let Some(weekly) = weekly {
        goals.set_weekly_target(weekly).map_err(|e| e.to_string())?;
    }
    Ok(goals.state().clone())
}

// ==================== 徽章 ====================

#[tauri::command]
pub async fn list_badges(state: State<'_, AppServices>) -> Result<BadgeOverview, String> {
    let badges = state.badges().map_err(|e| e.to_string())?;

    let views: Vec<BadgeView> = badges
        .all_badges()
        .into_iter()
        .map(|badge| BadgeView {
            unlocked: badges.is_unlocked(&badge.id),
            badge,
        })
        .collect();

    Ok(BadgeOverview {
        unlocked_count: views.iter().filter(|v| v.unlocked).count(),
        badges: views,
        progress: badges.level_progress(),
    })
}

#[tauri::command]
pub async fn add_custom_badge(
    draft: BadgeDraft,
    state: State<'_, AppServices>,
) -> Result<Badge, String> {
    let mut badges = state.badges().map_err(|e| e.to_string())?;
    badges.add_custom_badge(draft).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_custom_badge(id: String, state: State<'_, AppServices>) -> Result<bool, String> {
    let mut badges = state.badges().map_err(|e| e.to_string())?;
    badges.delete_custom_badge(&id).map_err(|e| e.to_string())
}

/// 手动解锁（custom 类型徽章）
#[tauri::command]
pub async fn unlock_badge(id: String, state: State<'_, AppServices>) -> Result<bool, String> {
    let mut badges = state.badges().map_err(|e| e.to_string())?;
    badges.unlock_badge(&id).map_err(|e| e.to_string())
}
