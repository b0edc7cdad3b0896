//! 统计与派生函数
//! 全部为题目集合上的纯函数；依赖“当前时间”的函数都提供显式传入日期的版本

use crate::models::{Note, Problem, ProblemStatus};
use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// 热力图单格的最高等级
const MAX_HEAT_LEVEL: u32 = 4;

/// 相对范围的上限（十年），超出的请求按上限截断
const MAX_RANGE_MONTHS: u32 = 120;
const MAX_RANGE_WEEKS: u32 = 522;

/// 题目创建日期（UTC 日历日）
fn created_on(problem: &Problem) -> NaiveDate {
    problem.created_at.date_naive()
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ==================== 连续天数与今日统计 ====================

/// 连续打卡天数
pub fn get_streak(problems: &[Problem]) -> u32 {
    streak_on(problems, today())
}

/// 从 `today` 往回数连续有记录的天数；今天没有记录不算中断，之后遇到空档即停止
pub fn streak_on(problems: &[Problem], today: NaiveDate) -> u32 {
    if problems.is_empty() {
        return 0;
    }

    let dates: HashSet<NaiveDate> = problems.iter().map(created_on).collect();

    let mut cursor = today;
    if !dates.contains(&cursor) {
        cursor = match cursor.pred_opt() {
            Some(day) => day,
            None => return 0,
        };
    }

    let mut streak = 0;
    while dates.contains(&cursor) {
        streak += 1;
        cursor = match cursor.pred_opt() {
            Some(day) => day,
            None => break,
        };
    }

    streak
}

/// 今日记录数
pub fn get_today_count(problems: &[Problem]) -> u32 {
    today_count_on(problems, today())
}

pub fn today_count_on(problems: &[Problem], day: NaiveDate) -> u32 {
    problems.iter().filter(|p| created_on(p) == day).count() as u32
}

/// 最近 7 天统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub total: u32,
    pub ac: u32,
}

pub fn get_weekly_stats(problems: &[Problem]) -> WeeklyStats {
    weekly_stats_at(problems, Utc::now())
}

/// 统计 `created_at >= now - 7 天` 的题目及其中 AC 的数量
pub fn weekly_stats_at(problems: &[Problem], now: DateTime<Utc>) -> WeeklyStats {
    let week_ago = now - Duration::days(7);

    let mut stats = WeeklyStats::default();
    for problem in problems.iter().filter(|p| p.created_at >= week_ago) {
        stats.total += 1;
        if problem.is_accepted() {
            stats.ac += 1;
        }
    }
    stats
}

// ==================== 热力图 ====================

/// 热力图时间范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum HeatmapRange {
    LastWeeks(u32),
    LastMonths(u32),
    LastYear,
    CalendarYear(i32),
}

impl Default for HeatmapRange {
    fn default() -> Self {
        HeatmapRange::LastWeeks(12)
    }
}

impl HeatmapRange {
    /// 闭区间 `[start, end]`
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match *self {
            HeatmapRange::LastWeeks(weeks) => {
                let days = u64::from(weeks.clamp(1, MAX_RANGE_WEEKS)) * 7;
                let start = today.checked_sub_days(Days::new(days - 1)).unwrap_or(today);
                (start, today)
            }
            HeatmapRange::LastMonths(months) => {
                let start = today
                    .checked_sub_months(Months::new(months.clamp(1, MAX_RANGE_MONTHS)))
                    .map(|d| d + Duration::days(1))
                    .unwrap_or(today);
                (start, today)
            }
            HeatmapRange::LastYear => {
                let start = today
                    .checked_sub_months(Months::new(12))
                    .map(|d| d + Duration::days(1))
                    .unwrap_or(today);
                (start, today)
            }
            HeatmapRange::CalendarYear(year) => {
                let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(today);
                let end = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(today);
                (start, end)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapDay {
    pub date: NaiveDate,
    pub count: u32,
    pub level: u32,
}

pub fn heatmap(problems: &[Problem], range: HeatmapRange) -> Vec<HeatmapDay> {
    heatmap_on(problems, range, today())
}

/// 范围内每个日历日一格，等级为 `min(count, 4)`
pub fn heatmap_on(problems: &[Problem], range: HeatmapRange, today: NaiveDate) -> Vec<HeatmapDay> {
    let (start, end) = range.bounds(today);

    let mut counts: HashMap<NaiveDate, u32> = HashMap::new();
    for problem in problems {
        let day = created_on(problem);
        if day >= start && day <= end {
            *counts.entry(day).or_insert(0) += 1;
        }
    }

    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|date| {
            let count = counts.get(&date).copied().unwrap_or(0);
            HeatmapDay {
                date,
                count,
                level: count.min(MAX_HEAT_LEVEL),
            }
        })
        .collect()
}

// ==================== 标签统计 ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u32,
}

pub fn tag_counts(problems: &[Problem]) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for problem in problems {
        for tag in &problem.tags {
            *counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// 标签直方图，按次数降序，次数相同时按标签名升序
pub fn tag_histogram(problems: &[Problem]) -> Vec<TagCount> {
    let mut histogram: Vec<TagCount> = tag_counts(problems)
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect();

    histogram.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    histogram
}

pub fn top_tags(problems: &[Problem], limit: usize) -> Vec<TagCount> {
    let mut histogram = tag_histogram(problems);
    histogram.truncate(limit);
    histogram
}

// ==================== 其他统计 ====================

pub fn ac_count(problems: &[Problem]) -> u32 {
    problems.iter().filter(|p| p.status == ProblemStatus::AC).count() as u32
}

/// AC 率（百分比，四舍五入）
pub fn accuracy_percent(problems: &[Problem]) -> u32 {
    if problems.is_empty() {
        return 0;
    }
    ((f64::from(ac_count(problems)) / problems.len() as f64) * 100.0).round() as u32
}

/// 周柱状图的一列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekBucket {
    pub label: String,
    pub start: NaiveDate,
    pub count: u32,
}

/// 最近 12 周（周日开始）每周的记录数，最早的一周在前
pub fn weekly_chart(problems: &[Problem], today: NaiveDate) -> Vec<WeekBucket> {
    let current_week_start =
        today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));

    (0..12i64)
        .rev()
        .map(|offset| {
            let start = current_week_start - Duration::weeks(offset);
            let end = start + Duration::days(6);
            let count = problems
                .iter()
                .filter(|p| {
                    let day = created_on(p);
                    day >= start && day <= end
                })
                .count() as u32;

            WeekBucket {
                label: format!("{}/{}", start.day(), start.month()),
                start,
                count,
            }
        })
        .collect()
}

// ==================== 徽章统计快照 ====================

/// 徽章评估所需的统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeStats {
    pub problems_solved: u32,
    pub ac_count: u32,
    pub streak_days: u32,
    pub notes_count: u32,
    pub tag_counts: HashMap<String, u32>,
}

impl BadgeStats {
    pub fn collect(problems: &[Problem], notes: &[Note]) -> Self {
        Self::collect_on(problems, notes, today())
    }

    /// problemsSolved 统计的是已记录的题目总数
    pub fn collect_on(problems: &[Problem], notes: &[Note], today: NaiveDate) -> Self {
        Self {
            problems_solved: problems.len() as u32,
            ac_count: ac_count(problems),
            streak_days: streak_on(problems, today),
            notes_count: notes.len() as u32,
            tag_counts: tag_counts(problems),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn problem_on(day: &str, status: ProblemStatus, tags: &[&str]) -> Problem {
        let created_at = format!("{}T12:00:00Z", day).parse::<DateTime<Utc>>().unwrap();
        Problem {
            id: uuid::Uuid::new_v4().to_string(),
            title: format!("problem {}", day),
            platform: Platform::Codeforces,
            link: None,
            difficulty: None,
            status,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            time_spent: None,
            quick_notes: None,
            linked_note_id: None,
            created_at,
            solved_at: None,
        }
    }

    #[test]
    fn test_streak_empty_is_zero() {
        assert_eq!(streak_on(&[], date("2026-05-10")), 0);
    }

    #[test]
    fn test_streak_consecutive_days_ending_today() {
        let problems = vec![
            problem_on("2026-05-10", ProblemStatus::AC, &[]),
            problem_on("2026-05-09", ProblemStatus::WA, &[]),
            problem_on("2026-05-09", ProblemStatus::AC, &[]),
            problem_on("2026-05-08", ProblemStatus::AC, &[]),
        ];
        assert_eq!(streak_on(&problems, date("2026-05-10")), 3);
    }

    #[test]
    fn test_streak_breaks_at_first_gap_after_today() {
        let problems = vec![
            problem_on("2026-05-10", ProblemStatus::AC, &[]),
            problem_on("2026-05-07", ProblemStatus::AC, &[]),
        ];
        assert_eq!(streak_on(&problems, date("2026-05-10")), 1);
    }

    #[test]
    fn test_streak_tolerates_missing_today() {
        let problems = vec![
            problem_on("2026-05-09", ProblemStatus::AC, &[]),
            problem_on("2026-05-08", ProblemStatus::AC, &[]),
        ];
        assert_eq!(streak_on(&problems, date("2026-05-10")), 2);

        // 昨天也没有记录则为 0
        assert_eq!(streak_on(&problems, date("2026-05-11")), 0);
    }

    #[test]
    fn test_today_count() {
        let problems = vec![
            problem_on("2026-05-10", ProblemStatus::AC, &[]),
            problem_on("2026-05-10", ProblemStatus::WA, &[]),
            problem_on("2026-05-09", ProblemStatus::AC, &[]),
        ];
        let count = today_count_on(&problems, date("2026-05-10"));
        assert_eq!(count, 2);
        assert!(count as usize <= problems.len());
        assert_eq!(today_count_on(&[], date("2026-05-10")), 0);
    }

    #[test]
    fn test_weekly_stats_window() {
        let now = "2026-05-10T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let problems = vec![
            problem_on("2026-05-10", ProblemStatus::AC, &[]),
            problem_on("2026-05-04", ProblemStatus::WA, &[]),
            // 恰好 7 天前，包含在内
            problem_on("2026-05-03", ProblemStatus::AC, &[]),
            problem_on("2026-05-02", ProblemStatus::AC, &[]),
        ];

        let stats = weekly_stats_at(&problems, now);
        assert_eq!(stats, WeeklyStats { total: 3, ac: 2 });
        assert!(stats.ac <= stats.total);
    }

    #[test]
    fn test_heatmap_last_twelve_weeks() {
        let today = date("2026-05-10");
        let problems = vec![
            problem_on("2026-05-10", ProblemStatus::AC, &[]),
            problem_on("2026-05-10", ProblemStatus::AC, &[]),
            problem_on("2026-05-10", ProblemStatus::AC, &[]),
            problem_on("2026-05-10", ProblemStatus::AC, &[]),
            problem_on("2026-05-10", ProblemStatus::AC, &[]),
            problem_on("2026-05-01", ProblemStatus::AC, &[]),
            problem_on("2025-01-01", ProblemStatus::AC, &[]),
        ];

        let cells = heatmap_on(&problems, HeatmapRange::default(), today);
        assert_eq!(cells.len(), 84);
        assert_eq!(cells.first().unwrap().date, date("2026-02-16"));

        let last = cells.last().unwrap();
        assert_eq!(last.date, today);
        assert_eq!(last.count, 5);
        assert_eq!(last.level, 4);

        let total: u32 = cells.iter().map(|c| c.count).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn test_heatmap_range_bounds() {
        let today = date("2026-05-10");
        assert_eq!(
            HeatmapRange::LastMonths(6).bounds(today),
            (date("2025-11-11"), today)
        );
        assert_eq!(HeatmapRange::LastYear.bounds(today), (date("2025-05-11"), today));

        let cells = heatmap_on(&[], HeatmapRange::CalendarYear(2024), today);
        assert_eq!(cells.len(), 366);
        assert_eq!(cells[0].date, date("2024-01-01"));
    }

    #[test]
    fn test_heatmap_range_bounds_clamp_extreme_input() {
        let today = date("2026-10-16");

        let (start, end) = HeatmapRange::LastWeeks(u32::MAX).bounds(today);
        assert_eq!(end, today);
        assert_eq!((end - start).num_days(), i64::from(MAX_RANGE_WEEKS) * 7 - 1);

        let cells = heatmap_on(&[], HeatmapRange::LastWeeks(u32::MAX), today);
        assert_eq!(cells.len(), MAX_RANGE_WEEKS as usize * 7);
        assert_eq!(cells.last().unwrap().date, today);

        // 0 周按 1 周处理
        assert_eq!(heatmap_on(&[], HeatmapRange::LastWeeks(0), today).len(), 7);

        let (start, _) = HeatmapRange::LastMonths(u32::MAX).bounds(today);
        assert_eq!(start, date("2016-10-17"));

        // 日期边界附近不溢出
        let edge = NaiveDate::MIN + Days::new(3);
        assert_eq!(HeatmapRange::LastWeeks(4).bounds(edge), (edge, edge));
        assert!(heatmap_on(&[], HeatmapRange::CalendarYear(i32::MAX), today).len() <= 1);
    }

    #[test]
    fn test_tag_histogram_sorted_desc() {
        let problems = vec![
            problem_on("2026-05-10", ProblemStatus::AC, &["dp", "math"]),
            problem_on("2026-05-09", ProblemStatus::AC, &["dp"]),
            problem_on("2026-05-08", ProblemStatus::AC, &["graphs", "dp", "math"]),
            problem_on("2026-05-07", ProblemStatus::AC, &["greedy"]),
        ];

        let histogram = tag_histogram(&problems);
        let tags: Vec<(&str, u32)> = histogram.iter().map(|t| (t.tag.as_str(), t.count)).collect();
        assert_eq!(tags, vec![("dp", 3), ("math", 2), ("graphs", 1), ("greedy", 1)]);

        assert_eq!(top_tags(&problems, 2).len(), 2);
    }

    #[test]
    fn test_accuracy_and_ac_count() {
        let problems = vec![
            problem_on("2026-05-10", ProblemStatus::AC, &[]),
            problem_on("2026-05-10", ProblemStatus::WA, &[]),
            problem_on("2026-05-10", ProblemStatus::TLE, &[]),
        ];
        assert_eq!(ac_count(&problems), 1);
        assert_eq!(accuracy_percent(&problems), 33);
        assert_eq!(accuracy_percent(&[]), 0);
    }

    #[test]
    fn test_weekly_chart_buckets() {
        // 2026-05-10 是周日
        let today = date("2026-05-10");
        let problems = vec![
            problem_on("2026-05-10", ProblemStatus::AC, &[]),
            problem_on("2026-05-09", ProblemStatus::AC, &[]),
            problem_on("2026-05-03", ProblemStatus::AC, &[]),
        ];

        let chart = weekly_chart(&problems, today);
        assert_eq!(chart.len(), 12);

        let current = chart.last().unwrap();
        assert_eq!(current.start, today);
        assert_eq!(current.label, "10/5");
        assert_eq!(current.count, 1);

        let previous = &chart[10];
        assert_eq!(previous.start, date("2026-05-03"));
        assert_eq!(previous.count, 2);
    }

    #[test]
    fn test_badge_stats_collect() {
        let today = date("2026-05-10");
        let problems = vec![
            problem_on("2026-05-10", ProblemStatus::AC, &["dp"]),
            problem_on("2026-05-09", ProblemStatus::WA, &["dp", "math"]),
        ];

        let stats = BadgeStats::collect_on(&problems, &[], today);
        assert_eq!(stats.problems_solved, 2);
        assert_eq!(stats.ac_count, 1);
        assert_eq!(stats.streak_days, 2);
        assert_eq!(stats.notes_count, 0);
        assert_eq!(stats.tag_counts.get("dp"), Some(&2));
    }
}
