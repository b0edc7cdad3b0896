// 服务模块
// 各状态容器、统计与成就引擎，以及把它们组装在一起的 AppServices

pub mod backup;
pub mod badges;
pub mod goals;
pub mod notes;
pub mod problems;
pub mod snippets;
pub mod stats;
pub mod storage;

pub use backup::{backup_file_name, export_backup, import_backup, BackupData, ImportSummary};
pub use badges::{builtin_badges, level_for_xp, xp_reward, BadgeStore, LevelProgress};
pub use goals::{week_end, week_start, GoalStore};
pub use notes::{render_markdown, NoteStore};
pub use problems::ProblemStore;
pub use snippets::SnippetStore;
pub use stats::{BadgeStats, HeatmapDay, HeatmapRange, TagCount, WeekBucket, WeeklyStats};
pub use storage::{BridgedStore, Storage, SyncAdapter, KNOWN_KEYS};

use crate::config::AppConfig;
use crate::db::LocalStore;
use crate::error::{poisoned, AppResult};
use crate::models::Badge;
use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// 仪表盘展示的热门标签数量
const DASHBOARD_TOP_TAGS: usize = 5;

/// 一次进度刷新的结果，供前端弹出通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub newly_unlocked: Vec<Badge>,
    pub day_completed: bool,
    pub streak: u32,
    pub today_count: u32,
    pub weekly: WeeklyStats,
    pub weekly_goal_met: bool,
}

/// 仪表盘汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_problems: u32,
    pub ac_count: u32,
    pub accuracy: u32,
    pub streak: u32,
    pub today_count: u32,
    pub weekly: WeeklyStats,
    pub daily_target: u32,
    pub weekly_target: u32,
    pub completed_days: usize,
    pub top_tags: Vec<TagCount>,
    pub level: LevelProgress,
}

/// 应用服务对象图，启动时构建一次并交给命令层
pub struct AppServices {
    storage: Storage,
    adapter: Arc<SyncAdapter>,
    problems: Mutex<ProblemStore>,
    notes: Mutex<NoteStore>,
    snippets: Mutex<SnippetStore>,
    goals: Mutex<GoalStore>,
    badges: Mutex<BadgeStore>,
}

impl AppServices {
    /// 用已打开的存储构建服务，并从本地存储加载全部容器
    pub fn open(local: LocalStore, bridge: Option<BridgedStore>) -> Self {
        let storage = Storage::select(local.clone(), bridge.clone());
        let adapter = Arc::new(SyncAdapter::new(local, bridge));

        Self {
            storage,
            problems: Mutex::new(ProblemStore::load(adapter.clone())),
            notes: Mutex::new(NoteStore::load(adapter.clone())),
            snippets: Mutex::new(SnippetStore::load(adapter.clone())),
            goals: Mutex::new(GoalStore::load(adapter.clone())),
            badges: Mutex::new(BadgeStore::load(adapter.clone())),
            adapter,
        }
    }

    /// 打开磁盘上的存储，执行首次迁移后加载容器
    pub async fn bootstrap(config: &AppConfig) -> anyhow::Result<Self> {
        let local = LocalStore::open(&config.local_db_path())
            .with_context(|| format!("无法打开本地存储: {}", config.local_db_path().display()))?;

        let bridge = if config.desktop_bridge {
            let store = BridgedStore::open(config.bridge_store_path())
                .await
                .context("无法打开外部存储")?;
            Some(store)
        } else {
            None
        };

        let migrated = SyncAdapter::new(local.clone(), bridge.clone())
            .migrate_from_bridge()
            .await
            .context("迁移外部存储数据失败")?;

        let services = Self::open(local, bridge);
        log::info!(
            "services ready (bridged: {}, migrated: {:?})",
            services.storage.is_bridged(),
            migrated
        );
        Ok(services)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn adapter(&self) -> &SyncAdapter {
        &self.adapter
    }

    pub fn problems(&self) -> AppResult<MutexGuard<'_, ProblemStore>> {
        self.problems.lock().map_err(poisoned)
    }

    pub fn notes(&self) -> AppResult<MutexGuard<'_, NoteStore>> {
        self.notes.lock().map_err(poisoned)
    }

    pub fn snippets(&self) -> AppResult<MutexGuard<'_, SnippetStore>> {
        self.snippets.lock().map_err(poisoned)
    }

    pub fn goals(&self) -> AppResult<MutexGuard<'_, GoalStore>> {
        self.goals.lock().map_err(poisoned)
    }

    pub fn badges(&self) -> AppResult<MutexGuard<'_, BadgeStore>> {
        self.badges.lock().map_err(poisoned)
    }

    // ==================== 进度刷新 ====================

    pub fn refresh_progress(&self) -> AppResult<ProgressReport> {
        self.refresh_progress_at(Utc::now())
    }

    /// 重新派生统计 → 评估徽章 → 检查每日目标
    pub fn refresh_progress_at(&self, now: DateTime<Utc>) -> AppResult<ProgressReport> {
        let today = now.date_naive();

        let (badge_stats, today_count, weekly) = {
            let problems = self.problems()?;
            let notes = self.notes()?;
            (
                BadgeStats::collect_on(problems.all(), notes.all(), today),
                stats::today_count_on(problems.all(), today),
                stats::weekly_stats_at(problems.all(), now),
            )
        };

        let newly_unlocked: Vec<Badge> = {
            let mut badges = self.badges()?;
            let ids = badges.check_and_unlock_badges(&badge_stats)?;
            ids.iter()
                .filter_map(|id| badges.get_badge_by_id(id).cloned())
                .collect()
        };

        let (day_completed, weekly_goal_met) = {
            let mut goals = self.goals()?;
            (
                goals.check_daily_goal(today_count, today)?,
                goals.is_weekly_goal_met(weekly.total),
            )
        };

        Ok(ProgressReport {
            newly_unlocked,
            day_completed,
            streak: badge_stats.streak_days,
            today_count,
            weekly,
            weekly_goal_met,
        })
    }

    pub fn dashboard(&self) -> AppResult<Dashboard> {
        self.dashboard_at(Utc::now())
    }

    pub fn dashboard_at(&self, now: DateTime<Utc>) -> AppResult<Dashboard> {
        let today = now.date_naive();
        let problems = self.problems()?;
        let all = problems.all();
        let goals = self.goals()?;
        let level = self.badges()?.level_progress();

        Ok(Dashboard {
            total_problems: all.len() as u32,
            ac_count: stats::ac_count(all),
            accuracy: stats::accuracy_percent(all),
            streak: stats::streak_on(all, today),
            today_count: stats::today_count_on(all, today),
            weekly: stats::weekly_stats_at(all, now),
            daily_target: goals.daily_target(),
            weekly_target: goals.weekly_target(),
            completed_days: goals.total_completed_days(),
            top_tags: stats::top_tags(all, DASHBOARD_TOP_TAGS),
            level,
        })
    }

    // ==================== 数据管理 ====================

    /// 删除全部已知键（本地与外部存储），容器回到初始状态
    pub async fn clear_all_data(&self) -> AppResult<()> {
        let mut mirrors = Vec::new();
        for key in KNOWN_KEYS {
            mirrors.extend(self.adapter.remove_item(key)?);
        }
        for joined in join_all(mirrors).await {
            if let Err(e) = joined {
                log::warn!("clear mirror task aborted: {}", e);
            }
        }

        self.problems()?.init(Vec::new());
        self.notes()?.init(Vec::new());
        self.snippets()?.reset();
        self.goals()?.reset();
        self.badges()?.reset();

        log::info!("all data cleared");
        Ok(())
    }

    /// 退出前把本地数据推送到外部存储
    pub async fn shutdown(&self) {
        let results = self.adapter.flush_to_bridge().await;
        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        log::info!("flushed {} keys to bridged store ({} failed)", results.len(), failed);
    }
}
