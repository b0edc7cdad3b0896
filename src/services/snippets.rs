//! 代码片段容器
//! 首次运行时写入内置模板，之后与用户片段一视同仁（可修改、可删除）

use crate::error::AppResult;
use crate::models::{normalize_tags, Snippet, SnippetDraft, SnippetPatch};
use crate::services::storage::{load_snapshot, persist_snapshot, SyncAdapter, SNIPPETS_KEY};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// 内置模板定义
struct SeedSnippet {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    category: &'static str,
    tags: &'static [&'static str],
    code: &'static str,
}

const SEED_LANGUAGE: &str = "cpp";

const SEEDS: &[SeedSnippet] = &[
    SeedSnippet {
        id: "default-1",
        title: "Dijkstra (Priority Queue)",
        description: "基于堆的单源最短路。复杂度：O((V+E) log V)",
        category: "图论",
        tags: &["graphs", "shortest-path", "dijkstra"],
        code: include_str!("seeds/dijkstra.cpp"),
    },
    SeedSnippet {
        id: "default-2",
        title: "Segment Tree (Point Update)",
        description: "单点修改、区间查询的线段树。复杂度：O(log N)",
        category: "数据结构",
        tags: &["segment-tree", "data-structure", "range-query"],
        code: include_str!("seeds/segment_tree.cpp"),
    },
    SeedSnippet {
        id: "default-3",
        title: "Binary Search (Lower/Upper Bound)",
        description: "二分查找上下界，用于在有序数组中定位。",
        category: "算法",
        tags: &["binary-search", "searching"],
        code: include_str!("seeds/binary_search.cpp"),
    },
    SeedSnippet {
        id: "default-4",
        title: "Union Find (DSU)",
        description: "带路径压缩与按秩合并的并查集。复杂度：均摊 O(α(n))",
        category: "数据结构",
        tags: &["dsu", "union-find", "data-structure"],
        code: include_str!("seeds/dsu.cpp"),
    },
    SeedSnippet {
        id: "default-5",
        title: "BFS (Shortest Path Unweighted)",
        description: "无权图的广度优先搜索最短路。复杂度：O(V + E)",
        category: "图论",
        tags: &["bfs", "graphs", "shortest-path"],
        code: include_str!("seeds/bfs.cpp"),
    },
    SeedSnippet {
        id: "default-6",
        title: "Sieve of Eratosthenes",
        description: "埃氏筛求 N 以内全部质数。复杂度：O(N log log N)",
        category: "数学",
        tags: &["math", "primes", "number-theory", "sieve"],
        code: include_str!("seeds/sieve.cpp"),
    },
];

/// 生成内置片段，时间戳统一为 `now`
pub fn default_snippets(now: DateTime<Utc>) -> Vec<Snippet> {
    SEEDS
        .iter()
        .map(|seed| Snippet {
            id: seed.id.to_string(),
            title: seed.title.to_string(),
            description: seed.description.to_string(),
            language: SEED_LANGUAGE.to_string(),
            code: seed.code.to_string(),
            category: seed.category.to_string(),
            tags: seed.tags.iter().map(|t| t.to_string()).collect(),
            created_at: now,
            updated_at: now,
        })
        .collect()
}

pub struct SnippetStore {
    snippets: Vec<Snippet>,
    adapter: Arc<SyncAdapter>,
}

impl SnippetStore {
    pub fn new(adapter: Arc<SyncAdapter>) -> Self {
        Self {
            snippets: Vec::new(),
            adapter,
        }
    }

    /// 加载已存片段；从未持久化过时使用内置模板
    pub fn load(adapter: Arc<SyncAdapter>) -> Self {
        let snapshot = load_snapshot::<Vec<Snippet>>(&adapter, SNIPPETS_KEY)
            .unwrap_or_else(|| default_snippets(Utc::now()));
        let mut store = Self::new(adapter);
        store.init(snapshot);
        store
    }

    pub fn init(&mut self, snapshot: Vec<Snippet>) {
        self.snippets = snapshot;
    }

    /// 恢复为内置模板（清空数据后调用），不写入存储
    pub fn reset(&mut self) {
        self.snippets = default_snippets(Utc::now());
    }

    pub fn all(&self) -> &[Snippet] {
        &self.snippets
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Snippet> {
        self.snippets.iter().find(|s| s.id == id)
    }

    pub fn add(&mut self, draft: SnippetDraft) -> AppResult<Snippet> {
        draft.validate()?;

        let now = Utc::now();
        let snippet = Snippet {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            language: draft.language,
            code: draft.code,
            category: draft.category,
            tags: normalize_tags(&draft.tags),
            created_at: now,
            updated_at: now,
        };

        self.snippets.push(snippet.clone());
        log::debug!("added snippet {}", snippet.id);
        self.persist();
        Ok(snippet)
    }

    pub fn update(&mut self, id: &str, patch: SnippetPatch) -> AppResult<Option<Snippet>> {
        patch.validate()?;

        let Some(snippet) = self.snippets.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };

        if let Some(title) = patch.title {
            snippet.title = title;
        }
        if let Some(description) = patch.description {
            snippet.description = description;
        }
        if let Some(language) = patch.language {
            snippet.language = language;
        }
        if let Some(code) = patch.code {
            snippet.code = code;
        }
        if let Some(category) = patch.category {
            snippet.category = category;
        }
        if let Some(tags) = patch.tags {
            snippet.tags = normalize_tags(&tags);
        }
        snippet.updated_at = Utc::now();

        let updated = snippet.clone();
        log::debug!("updated snippet {}", id);
        self.persist();
        Ok(Some(updated))
    }

    pub fn delete(&mut self, id: &str) -> AppResult<bool> {
        let before = self.snippets.len();
        self.snippets.retain(|s| s.id != id);
        if self.snippets.len() == before {
            return Ok(false);
        }

        log::debug!("deleted snippet {}", id);
        self.persist();
        Ok(true)
    }

    fn persist(&self) -> bool {
        persist_snapshot(&self.adapter, SNIPPETS_KEY, &self.snippets)
    }

    pub fn by_language(&self, language: &str) -> Vec<&Snippet> {
        self.snippets
            .iter()
            .filter(|s| s.language.eq_ignore_ascii_case(language))
            .collect()
    }

    pub fn by_category(&self, category: &str) -> Vec<&Snippet> {
        self.snippets.iter().filter(|s| s.category == category).collect()
    }

    /// 在标题、描述与标签中搜索
    pub fn search(&self, query: &str) -> Vec<&Snippet> {
        let query = query.to_lowercase();
        self.snippets
            .iter()
            .filter(|s| {
                s.title.to_lowercase().contains(&query)
                    || s.description.to_lowercase().contains(&query)
                    || s.tags.iter().any(|t| t.contains(&query))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LocalStore;

    fn adapter() -> Arc<SyncAdapter> {
        Arc::new(SyncAdapter::new(LocalStore::open_in_memory().unwrap(), None))
    }

    fn draft(title: &str, language: &str) -> SnippetDraft {
        SnippetDraft {
            title: title.to_string(),
            description: String::new(),
            language: language.to_string(),
            code: "int main() {}".to_string(),
            category: "模板".to_string(),
            tags: vec!["io".to_string()],
        }
    }

    #[test]
    fn test_seeds_installed_on_first_run() {
        let store = SnippetStore::load(adapter());
        let ids: Vec<&str> = store.all().iter().map(|s| s.id.as_str()).collect();

        assert_eq!(
            ids,
            vec!["default-1", "default-2", "default-3", "default-4", "default-5", "default-6"]
        );
        assert!(store.all().iter().all(|s| s.language == "cpp" && !s.code.is_empty()));
        assert!(store.get("default-1").unwrap().code.contains("priority_queue"));
    }

    #[test]
    fn test_seeds_not_reinstalled_after_deletion() {
        let adapter = adapter();
        let mut store = SnippetStore::load(adapter.clone());
        for id in ["default-1", "default-2", "default-3", "default-4", "default-5", "default-6"] {
            assert!(store.delete(id).unwrap());
        }

        let reloaded = SnippetStore::load(adapter);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_seed_is_mutable() {
        let mut store = SnippetStore::load(adapter());
        let patch = SnippetPatch {
            title: Some("Dijkstra (Lazy)".to_string()),
            ..Default::default()
        };

        let updated = store.update("default-1", patch).unwrap().unwrap();
        assert_eq!(updated.title, "Dijkstra (Lazy)");
        assert!(updated.updated_at >= updated.created_at);
    }

    #[test]
    fn test_add_and_queries() {
        let mut store = SnippetStore::load(adapter());
        let added = store.add(draft("Fast IO", "CPP")).unwrap();
        assert!(Uuid::parse_str(&added.id).is_ok());

        assert_eq!(store.by_language("cpp").len(), 7);
        assert_eq!(store.by_category("图论").len(), 2);
        assert_eq!(store.search("shortest-path").len(), 2);
        assert_eq!(store.search("fast").len(), 1);
    }

    #[test]
    fn test_add_requires_code() {
        let mut store = SnippetStore::load(adapter());
        let mut empty = draft("Nothing", "cpp");
        empty.code = "   ".to_string();

        assert!(store.add(empty).is_err());
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_update_rejects_blank_code() {
        let mut store = SnippetStore::load(adapter());
        let patch = SnippetPatch {
            code: Some(String::new()),
            ..Default::default()
        };

        assert!(store.update("default-3", patch).is_err());
        assert!(!store.get("default-3").unwrap().code.is_empty());
    }

    #[test]
    fn test_reset_restores_seeds() {
        let mut store = SnippetStore::load(adapter());
        store.add(draft("Fast IO", "cpp")).unwrap();
        store.reset();
        assert_eq!(store.len(), 6);
    }
}
