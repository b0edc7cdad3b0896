//! 题目记录容器
//! 内存中按插入顺序保存题目，每次变更后整体持久化

use crate::error::AppResult;
use crate::models::{normalize_tags, Platform, Problem, ProblemDraft, ProblemPatch, ProblemStatus};
use crate::services::storage::{load_snapshot, persist_snapshot, SyncAdapter, PROBLEMS_KEY};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// 题目容器
pub struct ProblemStore {
    problems: Vec<Problem>,
    adapter: Arc<SyncAdapter>,
}

impl ProblemStore {
    /// 创建空容器，需调用 `init` 或 `load` 填充数据
    pub fn new(adapter: Arc<SyncAdapter>) -> Self {
        Self {
            problems: Vec::new(),
            adapter,
        }
    }

    /// 从持久化适配器加载
    pub fn load(adapter: Arc<SyncAdapter>) -> Self {
        let snapshot = load_snapshot::<Vec<Problem>>(&adapter, PROBLEMS_KEY).unwrap_or_default();
        let mut store = Self::new(adapter);
        store.init(snapshot);
        store
    }

    /// 用已持久化的快照初始化
    pub fn init(&mut self, snapshot: Vec<Problem>) {
        self.problems = snapshot;
    }

    pub fn all(&self) -> &[Problem] {
        &self.problems
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Problem> {
        self.problems.iter().find(|p| p.id == id)
    }

    // ==================== 变更操作 ====================

    /// 新增题目：生成 id、记录创建时间，状态为 AC 时记录通过时间
    pub fn add(&mut self, draft: ProblemDraft) -> AppResult<Problem> {
        draft.validate()?;

        let now = Utc::now();
        let problem = Problem {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            platform: draft.platform,
            link: draft.link,
            difficulty: draft.difficulty,
            status: draft.status,
            tags: normalize_tags(&draft.tags),
            time_spent: draft.time_spent,
            quick_notes: draft.quick_notes,
            linked_note_id: draft.linked_note_id,
            created_at: now,
            solved_at: (draft.status == ProblemStatus::AC).then_some(now),
        };

        self.problems.push(problem.clone());
        log::debug!("added problem {}", problem.id);
        self.persist();
        Ok(problem)
    }

    /// 合并部分字段；本次更新把状态设为 AC 时刷新通过时间，否则保留原值
    pub fn update(&mut self, id: &str, patch: ProblemPatch) -> AppResult<Option<Problem>> {
        patch.validate()?;

        let Some(problem) = self.problems.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        if let Some(title) = patch.title {
            problem.title = title;
        }
        if let Some(platform) = patch.platform {
            problem.platform = platform;
        }
        if let Some(link) = patch.link {
            problem.link = link;
        }
        if let Some(difficulty) = patch.difficulty {
            problem.difficulty = difficulty;
        }
        if let Some(tags) = patch.tags {
            problem.tags = normalize_tags(&tags);
        }
        if let Some(time_spent) = patch.time_spent {
            problem.time_spent = time_spent;
        }
        if let Some(quick_notes) = patch.quick_notes {
            problem.quick_notes = quick_notes;
        }
        if let Some(linked_note_id) = patch.linked_note_id {
            problem.linked_note_id = linked_note_id;
        }
        if let Some(status) = patch.status {
            problem.status = status;
            if status == ProblemStatus::AC {
                problem.solved_at = Some(Utc::now());
            }
        }

        let updated = problem.clone();
        log::debug!("updated problem {}", id);
        self.persist();
        Ok(Some(updated))
    }

    /// 删除题目，返回是否存在
    pub fn delete(&mut self, id: &str) -> AppResult<bool> {
        let before = self.problems.len();
        self.problems.retain(|p| p.id != id);
        if self.problems.len() == before {
            return Ok(false);
        }

        log::debug!("deleted problem {}", id);
        self.persist();
        Ok(true)
    }

    fn persist(&self) -> bool {
        persist_snapshot(&self.adapter, PROBLEMS_KEY, &self.problems)
    }

    // ==================== 查询 ====================

    pub fn by_date(&self, date: NaiveDate) -> Vec<&Problem> {
        self.problems
            .iter()
            .filter(|p| p.created_at.date_naive() == date)
            .collect()
    }

    pub fn by_tag(&self, tag: &str) -> Vec<&Problem> {
        let tag = tag.trim().to_lowercase();
        self.problems.iter().filter(|p| p.tags.contains(&tag)).collect()
    }

    pub fn by_status(&self, status: ProblemStatus) -> Vec<&Problem> {
        self.problems.iter().filter(|p| p.status == status).collect()
    }

    pub fn by_platform(&self, platform: Platform) -> Vec<&Problem> {
        self.problems.iter().filter(|p| p.platform == platform).collect()
    }

    /// 标题模糊搜索（不区分大小写）
    pub fn search(&self, query: &str) -> Vec<&Problem> {
        let query = query.to_lowercase();
        self.problems
            .iter()
            .filter(|p| p.title.to_lowercase().contains(&query))
            .collect()
    }
}
