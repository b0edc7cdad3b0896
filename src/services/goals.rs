//! 每日/每周目标
//! 达成每日目标的日期记录在 completed_days 中，只记录一次

use crate::error::AppResult;
use crate::models::GoalState;
use crate::services::storage::{load_snapshot, persist_snapshot, SyncAdapter, GOALS_KEY};
use chrono::{Datelike, Duration, NaiveDate};
use std::sync::Arc;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// 所在周的周一
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// 所在周的周日
pub fn week_end(date: NaiveDate) -> NaiveDate {
    week_start(date) + Duration::days(6)
}

pub struct GoalStore {
    state: GoalState,
    adapter: Arc<SyncAdapter>,
}

impl GoalStore {
    pub fn new(adapter: Arc<SyncAdapter>) -> Self {
        Self {
            state: GoalState::default(),
            adapter,
        }
    }

    pub fn load(adapter: Arc<SyncAdapter>) -> Self {
        let snapshot = load_snapshot::<GoalState>(&adapter, GOALS_KEY).unwrap_or_default();
        let mut store = Self::new(adapter);
        store.init(snapshot);
        store
    }

    /// 载入快照，并修正不合法的目标值
    pub fn init(&mut self, mut snapshot: GoalState) {
        snapshot.daily_target = snapshot.daily_target.max(1);
        snapshot.weekly_target = snapshot.weekly_target.max(1);
        self.state = snapshot;
    }

    pub fn reset(&mut self) {
        self.state = GoalState::default();
    }

    pub fn state(&self) -> &GoalState {
        &self.state
    }

    pub fn daily_target(&self) -> u32 {
        self.state.daily_target
    }

    pub fn weekly_target(&self) -> u32 {
        self.state.weekly_target
    }

    pub fn set_daily_target(&mut self, target: u32) -> AppResult<()> {
        self.state.daily_target = target.max(1);
        self.persist();
        Ok(())
    }

    pub fn set_weekly_target(&mut self, target: u32) -> AppResult<()> {
        self.state.weekly_target = target.max(1);
        self.persist();
        Ok(())
    }

    /// 记录完成日期，已存在时不做任何事；返回是否新增
    pub fn mark_day_complete(&mut self, date: NaiveDate) -> AppResult<bool> {
        let day = date.format(DATE_FORMAT).to_string();
        if self.state.completed_days.contains(&day) {
            return Ok(false);
        }

        self.state.completed_days.push(day);
        log::info!("daily goal completed on {}", date);
        self.persist();
        Ok(true)
    }

    pub fn is_day_complete(&self, date: NaiveDate) -> bool {
        let day = date.format(DATE_FORMAT).to_string();
        self.state.completed_days.contains(&day)
    }

    /// 今日数量达到目标时标记完成；仅在本次调用新完成时返回 true
    pub fn check_daily_goal(&mut self, today_count: u32, today: NaiveDate) -> AppResult<bool> {
        if today_count < self.state.daily_target {
            return Ok(false);
        }
        self.mark_day_complete(today)
    }

    pub fn is_weekly_goal_met(&self, weekly_total: u32) -> bool {
        weekly_total >= self.state.weekly_target
    }

    pub fn total_completed_days(&self) -> usize {
        self.state.completed_days.len()
    }

    /// 没有规则会自动调用，保留给外部使用
    pub fn increment_weekly_completions(&mut self) -> AppResult<()> {
        self.state.weekly_completions += 1;
        self.persist();
        Ok(())
    }

    fn persist(&self) -> bool {
        persist_snapshot(&self.adapter, GOALS_KEY, &self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LocalStore;

    fn adapter() -> Arc<SyncAdapter> {
        Arc::new(SyncAdapter::new(LocalStore::open_in_memory().unwrap(), None))
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_defaults() {
        let store = GoalStore::load(adapter());
        assert_eq!(store.daily_target(), 3);
        assert_eq!(store.weekly_target(), 15);
        assert_eq!(store.total_completed_days(), 0);
    }

    #[test]
    fn test_targets_clamped_and_persisted() {
        let adapter = adapter();
        let mut store = GoalStore::load(adapter.clone());
        store.set_daily_target(0).unwrap();
        store.set_weekly_target(20).unwrap();

        let reloaded = GoalStore::load(adapter);
        assert_eq!(reloaded.daily_target(), 1);
        assert_eq!(reloaded.weekly_target(), 20);
    }

    #[test]
    fn test_daily_goal_marks_day_once() {
        let mut store = GoalStore::load(adapter());
        let today = date("2026-10-16");

        assert!(!store.check_daily_goal(2, today).unwrap());
        assert!(store.check_daily_goal(3, today).unwrap());
        assert!(!store.check_daily_goal(4, today).unwrap());

        assert_eq!(store.state().completed_days, vec!["2026-10-16".to_string()]);
        assert!(store.is_day_complete(today));
    }

    #[test]
    fn test_weekly_goal_and_counter() {
        let mut store = GoalStore::load(adapter());
        assert!(!store.is_weekly_goal_met(14));
        assert!(store.is_weekly_goal_met(15));

        store.increment_weekly_completions().unwrap();
        assert_eq!(store.state().weekly_completions, 1);
    }

    #[test]
    fn test_week_bounds() {
        // 2026-10-16 是周五
        assert_eq!(week_start(date("2026-10-16")), date("2026-10-12"));
        assert_eq!(week_end(date("2026-10-16")), date("2026-10-18"));
        // 周日属于上一个周一开始的那一周
        assert_eq!(week_start(date("2026-10-18")), date("2026-10-12"));
        assert_eq!(week_start(date("2026-10-12")), date("2026-10-12"));
    }

    #[test]
    fn test_init_repairs_zero_targets() {
        let adapter = adapter();
        adapter
            .local()
            .set_raw(GOALS_KEY, r#"{"dailyTarget":0,"weeklyTarget":0}"#)
            .unwrap();

        let store = GoalStore::load(adapter);
        assert_eq!(store.daily_target(), 1);
        assert_eq!(store.weekly_target(), 1);
    }
}
