//! 笔记容器（Grimoire）
//! Markdown 笔记的增删改查与渲染

use crate::error::AppResult;
use crate::models::{normalize_tags, Note, NoteDraft, NotePatch};
use crate::services::storage::{load_snapshot, persist_snapshot, SyncAdapter, NOTES_KEY};
use chrono::Utc;
use pulldown_cmark::{html, Options, Parser};
use std::sync::Arc;
use uuid::Uuid;

/// 把 Markdown 渲染为 HTML，启用表格、删除线与任务列表
pub fn render_markdown(content: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(content, options);
    let mut output = String::with_capacity(content.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

pub struct NoteStore {
    notes: Vec<Note>,
    adapter: Arc<SyncAdapter>,
}

impl NoteStore {
    pub fn new(adapter: Arc<SyncAdapter>) -> Self {
        Self {
            notes: Vec::new(),
            adapter,
        }
    }

    pub fn load(adapter: Arc<SyncAdapter>) -> Self {
        let snapshot = load_snapshot::<Vec<Note>>(&adapter, NOTES_KEY).unwrap_or_default();
        let mut store = Self::new(adapter);
        store.init(snapshot);
        store
    }

    pub fn init(&mut self, snapshot: Vec<Note>) {
        self.notes = snapshot;
    }

    pub fn all(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn add(&mut self, draft: NoteDraft) -> AppResult<Note> {
        draft.validate()?;

        let now = Utc::now();
        let note = Note {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            content: draft.content,
            tags: normalize_tags(&draft.tags),
            category: draft.category,
            created_at: now,
            updated_at: now,
        };

        self.notes.push(note.clone());
        log::debug!("added note {}", note.id);
        self.persist();
        Ok(note)
    }

    /// 合并字段并刷新 updated_at
    pub fn update(&mut self, id: &str, patch: NotePatch) -> AppResult<Option<Note>> {
        patch.validate()?;

        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return Ok(None);
        };

        if let Some(title) = patch.title {
            note.title = title;
        }
        if let Some(content) = patch.content {
            note.content = content;
        }
        if let Some(tags) = patch.tags {
            note.tags = normalize_tags(&tags);
        }
        if let Some(category) = patch.category {
            note.category = category;
        }
        note.updated_at = Utc::now();

        let updated = note.clone();
        log::debug!("updated note {}", id);
        self.persist();
        Ok(Some(updated))
    }

    pub fn delete(&mut self, id: &str) -> AppResult<bool> {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        if self.notes.len() == before {
            return Ok(false);
        }

        log::debug!("deleted note {}", id);
        self.persist();
        Ok(true)
    }

    fn persist(&self) -> bool {
        persist_snapshot(&self.adapter, NOTES_KEY, &self.notes)
    }

    pub fn by_tag(&self, tag: &str) -> Vec<&Note> {
        let tag = tag.trim().to_lowercase();
        self.notes.iter().filter(|n| n.tags.contains(&tag)).collect()
    }

    pub fn by_category(&self, category: &str) -> Vec<&Note> {
        self.notes
            .iter()
            .filter(|n| n.category.as_deref() == Some(category))
            .collect()
    }

    /// 标题或正文包含关键字（不区分大小写）
    pub fn search(&self, query: &str) -> Vec<&Note> {
        let query = query.to_lowercase();
        self.notes
            .iter()
            .filter(|n| {
                n.title.to_lowercase().contains(&query) || n.content.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn render_html(&self, id: &str) -> Option<String> {
        self.get(id).map(|note| render_markdown(&note.content))
    }
}
