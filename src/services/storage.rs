//! 持久化适配层
//! 统一本地存储（SQLite）与桌面宿主的外部 JSON 存储，并提供容器使用的同步适配器

use crate::db::LocalStore;
use crate::error::{AppError, AppResult};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub const PROBLEMS_KEY: &str = "problems";
pub const NOTES_KEY: &str = "notes";
pub const SNIPPETS_KEY: &str = "snippets";
pub const GOALS_KEY: &str = "goals";
pub const BADGES_KEY: &str = "badges";

/// 所有已知的持久化键
pub const KNOWN_KEYS: [&str; 5] = [PROBLEMS_KEY, NOTES_KEY, SNIPPETS_KEY, GOALS_KEY, BADGES_KEY];

/// 后台镜像写入任务句柄
pub type MirrorTask = JoinHandle<AppResult<()>>;

// ==================== 外部 JSON 存储 ====================

/// 桌面宿主的外部键值存储，整个文档保存为一个 JSON 文件
#[derive(Clone)]
pub struct BridgedStore {
    path: Arc<PathBuf>,
    document: Arc<Mutex<Map<String, Value>>>,
}

impl BridgedStore {
    /// 打开外部存储，文件不存在或损坏时以空文档开始
    pub async fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();

        let document = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    log::warn!(
                        "bridged store {} is corrupt, starting empty: {}",
                        path.display(),
                        e
                    );
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Arc::new(path),
            document: Arc::new(Mutex::new(document)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 声明的默认值
    pub fn defaults() -> Map<String, Value> {
        let mut defaults = Map::new();
        defaults.insert(PROBLEMS_KEY.to_string(), json!([]));
        defaults.insert(NOTES_KEY.to_string(), json!([]));
        defaults.insert(SNIPPETS_KEY.to_string(), json!([]));
        defaults.insert(
            GOALS_KEY.to_string(),
            json!({
                "dailyTarget": 3,
                "weeklyTarget": 15,
                "completedDays": [],
                "weeklyCompletions": 0
            }),
        );
        defaults.insert(
            BADGES_KEY.to_string(),
            json!({
                "unlockedBadges": [],
                "customBadges": [],
                "totalXP": 0,
                "level": 1
            }),
        );
        defaults
    }

    /// 读取键：已存值 > 默认值 > null
    pub async fn get(&self, key: &str) -> Value {
        if let Some(value) = self.get_stored(key).await {
            return value;
        }
        Self::defaults().remove(key).unwrap_or(Value::Null)
    }

    /// 仅返回显式写入过的值
    pub async fn get_stored(&self, key: &str) -> Option<Value> {
        self.document.lock().await.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let mut document = self.document.lock().await;
        document.insert(key.to_string(), value);
        self.write(&document).await
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let mut document = self.document.lock().await;
        if document.remove(key).is_none() {
            return Ok(());
        }
        self.write(&document).await
    }

    pub async fn clear(&self) -> AppResult<()> {
        let mut document = self.document.lock().await;
        document.clear();
        self.write(&document).await
    }

    /// 默认值叠加已存值
    pub async fn get_all(&self) -> Map<String, Value> {
        let mut all = Self::defaults();
        for (key, value) in self.document.lock().await.iter() {
            all.insert(key.clone(), value.clone());
        }
        all
    }

    /// 写临时文件后重命名，避免半写入的文档
    async fn write(&self, document: &Map<String, Value>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(document)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, self.path.as_path()).await?;

        Ok(())
    }
}

// ==================== 统一异步接口 ====================

/// 启动时选定一次的存储后端
#[derive(Clone)]
pub enum Storage {
    Local(LocalStore),
    Bridged(BridgedStore),
}

impl Storage {
    /// 存在桌面桥接时使用外部存储，否则退化为本地存储
    pub fn select(local: LocalStore, bridge: Option<BridgedStore>) -> Self {
        match bridge {
            Some(bridge) => Storage::Bridged(bridge),
            None => Storage::Local(local),
        }
    }

    pub fn is_bridged(&self) -> bool {
        matches!(self, Storage::Bridged(_))
    }

    /// 读取键，缺失或解析失败时返回调用方给出的默认值
    pub async fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self {
            Storage::Bridged(bridge) => {
                let value = bridge.get(key).await;
                if value.is_null() {
                    return default;
                }
                serde_json::from_value(value).unwrap_or(default)
            }
            Storage::Local(local) => match local.get_raw(key) {
                Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or(default),
                Ok(None) => default,
                Err(e) => {
                    log::warn!("local read of {} failed: {}", key, e);
                    default
                }
            },
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        match self {
            Storage::Bridged(bridge) => bridge.set(key, serde_json::to_value(value)?).await,
            Storage::Local(local) => local.set_raw(key, &serde_json::to_string(value)?),
        }
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        match self {
            Storage::Bridged(bridge) => bridge.delete(key).await,
            Storage::Local(local) => local.remove_raw(key),
        }
    }

    pub async fn clear(&self) -> AppResult<()> {
        match self {
            Storage::Bridged(bridge) => bridge.clear().await,
            Storage::Local(local) => local.clear_namespace().map(|_| ()),
        }
    }

    /// 导出全部数据；本地后端只返回已知键中可解析的值
    pub async fn get_all(&self) -> AppResult<Map<String, Value>> {
        match self {
            Storage::Bridged(bridge) => Ok(bridge.get_all().await),
            Storage::Local(local) => {
                let mut all = Map::new();
                for key in KNOWN_KEYS {
                    if let Some(raw) = local.get_raw(key)? {
                        if let Ok(value) = serde_json::from_str::<Value>(&raw) {
                            all.insert(key.to_string(), value);
                        }
                    }
                }
                Ok(all)
            }
        }
    }
}

// ==================== 容器同步适配器 ====================

/// 状态容器使用的两级适配器：本地同步读写，外部存储尽力镜像
#[derive(Clone)]
pub struct SyncAdapter {
    local: LocalStore,
    bridge: Option<BridgedStore>,
    // 镜像任务逐个执行，每次写入外部存储的都是执行时的本地值
    mirror_lock: Arc<Mutex<()>>,
}

impl SyncAdapter {
    pub fn new(local: LocalStore, bridge: Option<BridgedStore>) -> Self {
        Self {
            local,
            bridge,
            mirror_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn bridge(&self) -> Option<&BridgedStore> {
        self.bridge.as_ref()
    }

    /// 同步读取；未命中时触发后台回填，但本次调用始终返回 None
    pub fn get_item(&self, key: &str) -> Option<String> {
        match self.local.get_raw(key) {
            Ok(Some(raw)) => Some(raw),
            Ok(None) => {
                // 句柄交给运行时，本次调用不等待
                if self.backfill(key).is_none() {
                    log::debug!("{} not stored locally, nothing to backfill", key);
                }
                None
            }
            Err(e) => {
                log::warn!("local read of {} failed: {}", key, e);
                None
            }
        }
    }

    /// 同步写入本地，并把镜像写入外部存储的任务句柄返回给调用方
    pub fn set_item(&self, key: &str, raw: &str) -> AppResult<Option<MirrorTask>> {
        self.local.set_raw(key, raw)?;

        if self.bridge.is_none() {
            return Ok(None);
        }
        // 外部存储保存的是 JSON 值，无法解析的原文只保留在本地
        if let Err(e) = serde_json::from_str::<Value>(raw) {
            log::warn!("skipping mirror of {}, value is not JSON: {}", key, e);
            return Ok(None);
        }

        Ok(self.mirror("mirror", key))
    }

    pub fn remove_item(&self, key: &str) -> AppResult<Option<MirrorTask>> {
        self.local.remove_raw(key)?;

        if self.bridge.is_none() {
            return Ok(None);
        }
        Ok(self.mirror("remove", key))
    }

    /// 把本地当前值同步到外部存储：本地有值则写入，没有则删除
    ///
    /// 任务在镜像锁内重新读取本地值，较早的任务即使晚于较新的任务执行，
    /// 写入的也是最新值，外部存储不会回退到旧快照。
    fn mirror(&self, action: &'static str, key: &str) -> Option<MirrorTask> {
        let bridge = self.bridge.clone()?;
        let local = self.local.clone();
        let lock = self.mirror_lock.clone();
        let owned_key = key.to_string();

        self.spawn_mirror(action, key, async move {
            let _guard = lock.lock().await;
            match local.get_raw(&owned_key)? {
                Some(raw) => match serde_json::from_str::<Value>(&raw) {
                    Ok(value) => bridge.set(&owned_key, value).await,
                    Err(_) => {
                        log::debug!("local {} is not JSON, leaving bridged copy as is", owned_key);
                        Ok(())
                    }
                },
                None => bridge.delete(&owned_key).await,
            }
        })
    }

    /// 从外部存储回填本地缺失的键
    pub fn backfill(&self, key: &str) -> Option<MirrorTask> {
        let bridge = self.bridge.clone()?;
        let local = self.local.clone();
        let owned_key = key.to_string();

        self.spawn_mirror("backfill", key, async move {
            if let Some(value) = bridge.get_stored(&owned_key).await {
                if !value.is_null() && local.get_raw(&owned_key)?.is_none() {
                    local.set_raw(&owned_key, &serde_json::to_string(&value)?)?;
                    log::debug!("backfilled {} from bridged store", owned_key);
                }
            }
            Ok(())
        })
    }

    fn spawn_mirror<F>(&self, action: &'static str, key: &str, task: F) -> Option<MirrorTask>
    where
        F: Future<Output = AppResult<()>> + Send + 'static,
    {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::debug!("no async runtime, skipping {} of {}", action, key);
                return None;
            }
        };

        let key = key.to_string();
        Some(handle.spawn(async move {
            let result = task.await;
            if let Err(e) = &result {
                log::warn!("{} of {} to bridged store failed: {}", action, key, e);
            }
            result
        }))
    }

    // ==================== 启动与退出钩子 ====================

    /// 首次启动迁移：本地缺失且外部显式存有值时复制到本地，从不覆盖本地数据
    pub async fn migrate_from_bridge(&self) -> AppResult<Vec<String>> {
        let Some(bridge) = &self.bridge else {
            return Ok(Vec::new());
        };

        let mut migrated = Vec::new();
        for key in KNOWN_KEYS {
            if self.local.get_raw(key)?.is_some() {
                continue;
            }
            if let Some(value) = bridge.get_stored(key).await {
                if value.is_null() {
                    continue;
                }
                self.local.set_raw(key, &serde_json::to_string(&value)?)?;
                migrated.push(key.to_string());
            }
        }

        if !migrated.is_empty() {
            log::info!("migrated {:?} from bridged store", migrated);
        }
        Ok(migrated)
    }

    /// 退出时把本地所有已知键推送到外部存储
    pub async fn flush_to_bridge(&self) -> Vec<(String, AppResult<()>)> {
        let Some(bridge) = &self.bridge else {
            return Vec::new();
        };
        // 与镜像任务互斥，避免旧值覆盖较新的镜像
        let _guard = self.mirror_lock.lock().await;

        let mut pending = Vec::new();
        for key in KNOWN_KEYS {
            let raw = match self.local.get_raw(key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    pending.push(futures::future::Either::Left(async move {
                        (key.to_string(), Err(e))
                    }));
                    continue;
                }
            };
            let bridge = bridge.clone();
            pending.push(futures::future::Either::Right(async move {
                let result = match serde_json::from_str::<Value>(&raw) {
                    Ok(value) => bridge.set(key, value).await,
                    Err(e) => Err(AppError::from(e)),
                };
                (key.to_string(), result)
            }));
        }

        let results = join_all(pending).await;
        for (key, result) in &results {
            if let Err(e) = result {
                log::warn!("flush of {} to bridged store failed: {}", key, e);
            }
        }
        results
    }
}

// ==================== 容器快照读写 ====================

/// 读取容器快照，缺失或解析失败返回 None
pub fn load_snapshot<T: DeserializeOwned>(adapter: &SyncAdapter, key: &str) -> Option<T> {
    let raw = adapter.get_item(key)?;
    match serde_json::from_str(&raw) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            log::warn!("stored {} is unreadable, using defaults: {}", key, e);
            None
        }
    }
}

/// 保存容器快照；失败只记录日志并返回 false，内存中的集合仍以本次变更为准
pub fn persist_snapshot<T: Serialize>(adapter: &SyncAdapter, key: &str, snapshot: &T) -> bool {
    let result = serde_json::to_string(snapshot)
        .map_err(AppError::from)
        .and_then(|raw| adapter.set_item(key, &raw));
    match result {
        Ok(_mirror) => true,
        Err(e) => {
            log::warn!("persisting {} failed, keeping in-memory state: {}", key, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn bridged(dir: &tempfile::TempDir) -> BridgedStore {
        BridgedStore::open(dir.path().join("upsolve-store.json")).await.unwrap()
    }

    #[tokio::test]
    async fn test_bridged_store_defaults_and_persistence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = bridged(&dir).await;

        assert_eq!(store.get(PROBLEMS_KEY).await, json!([]));
        assert_eq!(store.get(GOALS_KEY).await["dailyTarget"], 3);
        assert_eq!(store.get("unknown").await, Value::Null);
        assert!(store.get_stored(PROBLEMS_KEY).await.is_none());

        store.set(NOTES_KEY, json!([{"id": "n1"}])).await.unwrap();

        let reopened = bridged(&dir).await;
        assert_eq!(reopened.get(NOTES_KEY).await, json!([{"id": "n1"}]));

        reopened.delete(NOTES_KEY).await.unwrap();
        assert_eq!(reopened.get(NOTES_KEY).await, json!([]));
    }

    #[tokio::test]
    async fn test_bridged_store_corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("upsolve-store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = BridgedStore::open(&path).await.unwrap();
        assert!(store.get_stored(PROBLEMS_KEY).await.is_none());
        assert_eq!(store.get_all().await.len(), KNOWN_KEYS.len());
    }

    #[tokio::test]
    async fn test_local_storage_parse_failure_yields_default() {
        let local = LocalStore::open_in_memory().unwrap();
        local.set_raw(PROBLEMS_KEY, "{broken").unwrap();

        let storage = Storage::select(local, None);
        assert!(!storage.is_bridged());

        let problems: Vec<String> = storage.get(PROBLEMS_KEY, vec!["fallback".to_string()]).await;
        assert_eq!(problems, vec!["fallback".to_string()]);

        // getAll 跳过无法解析的值
        let all = storage.get_all().await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_storage_contract_local_and_bridged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backends = vec![
            Storage::select(LocalStore::open_in_memory().unwrap(), None),
            Storage::select(LocalStore::open_in_memory().unwrap(), Some(bridged(&dir).await)),
        ];

        for storage in backends {
            storage.set(GOALS_KEY, &json!({"dailyTarget": 5})).await.unwrap();
            let goals: Value = storage.get(GOALS_KEY, Value::Null).await;
            assert_eq!(goals["dailyTarget"], 5);

            let all = storage.get_all().await.unwrap();
            assert_eq!(all[GOALS_KEY]["dailyTarget"], 5);

            storage.delete(GOALS_KEY).await.unwrap();
            storage.clear().await.unwrap();
            let missing: u32 = storage.get("nothing-here", 7).await;
            assert_eq!(missing, 7);
        }
    }

    #[tokio::test]
    async fn test_sync_adapter_mirrors_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bridge = bridged(&dir).await;
        let adapter = SyncAdapter::new(LocalStore::open_in_memory().unwrap(), Some(bridge.clone()));

        let mirror = adapter.set_item(PROBLEMS_KEY, r#"[{"id":"p1"}]"#).unwrap();
        mirror.expect("mirror task").await.unwrap().unwrap();

        assert_eq!(adapter.get_item(PROBLEMS_KEY).as_deref(), Some(r#"[{"id":"p1"}]"#));
        assert_eq!(bridge.get(PROBLEMS_KEY).await, json!([{"id": "p1"}]));

        let removal = adapter.remove_item(PROBLEMS_KEY).unwrap();
        removal.expect("remove task").await.unwrap().unwrap();
        assert!(bridge.get_stored(PROBLEMS_KEY).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mirrors_leave_bridge_at_latest_local_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bridge = bridged(&dir).await;
        let adapter = SyncAdapter::new(LocalStore::open_in_memory().unwrap(), Some(bridge.clone()));

        for round in 0..50 {
            let mut mirrors = Vec::new();
            for version in 0..20 {
                let raw = format!("[{}]", round * 100 + version);
                mirrors.push(adapter.set_item(PROBLEMS_KEY, &raw).unwrap().expect("mirror task"));
            }
            for result in join_all(mirrors).await {
                result.unwrap().unwrap();
            }

            let local: Value = serde_json::from_str(&adapter.get_item(PROBLEMS_KEY).unwrap()).unwrap();
            assert_eq!(local, json!([round * 100 + 19]));
            assert_eq!(bridge.get_stored(PROBLEMS_KEY).await, Some(local), "round {}", round);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_remove_after_pending_writes_clears_bridge() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bridge = bridged(&dir).await;
        let adapter = SyncAdapter::new(LocalStore::open_in_memory().unwrap(), Some(bridge.clone()));

        for round in 0..20 {
            let mut mirrors = Vec::new();
            for version in 0..10 {
                let raw = format!("[{}]", version);
                mirrors.push(adapter.set_item(NOTES_KEY, &raw).unwrap().expect("mirror task"));
            }
            mirrors.push(adapter.remove_item(NOTES_KEY).unwrap().expect("remove task"));
            for result in join_all(mirrors).await {
                result.unwrap().unwrap();
            }

            assert!(bridge.get_stored(NOTES_KEY).await.is_none(), "round {}", round);
        }
    }

    #[test]
    fn test_sync_adapter_without_runtime_still_writes_locally() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let bridge = runtime.block_on(BridgedStore::open(dir.path().join("store.json"))).unwrap();

        let adapter = SyncAdapter::new(LocalStore::open_in_memory().unwrap(), Some(bridge));
        let mirror = adapter.set_item(NOTES_KEY, "[]").unwrap();

        assert!(mirror.is_none());
        assert_eq!(adapter.get_item(NOTES_KEY).as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_get_item_miss_returns_none_and_backfills() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bridge = bridged(&dir).await;
        bridge.set(NOTES_KEY, json!([{"id": "n1"}])).await.unwrap();

        let adapter = SyncAdapter::new(LocalStore::open_in_memory().unwrap(), Some(bridge));
        assert_eq!(adapter.get_item(NOTES_KEY), None);

        adapter.backfill(NOTES_KEY).expect("backfill task").await.unwrap().unwrap();
        assert_eq!(adapter.get_item(NOTES_KEY).as_deref(), Some(r#"[{"id":"n1"}]"#));
    }

    #[tokio::test]
    async fn test_migrate_never_overwrites_local() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bridge = bridged(&dir).await;
        bridge.set(PROBLEMS_KEY, json!([{"id": "remote"}])).await.unwrap();
        bridge.set(NOTES_KEY, json!([{"id": "remote-note"}])).await.unwrap();

        let local = LocalStore::open_in_memory().unwrap();
        local.set_raw(PROBLEMS_KEY, r#"[{"id":"local"}]"#).unwrap();

        let adapter = SyncAdapter::new(local.clone(), Some(bridge));
        let migrated = adapter.migrate_from_bridge().await.unwrap();

        assert_eq!(migrated, vec![NOTES_KEY.to_string()]);
        assert_eq!(local.get_raw(PROBLEMS_KEY).unwrap().as_deref(), Some(r#"[{"id":"local"}]"#));
        // 外部存储的默认值不会被迁移
        assert!(local.get_raw(SNIPPETS_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flush_pushes_local_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bridge = bridged(&dir).await;
        let local = LocalStore::open_in_memory().unwrap();
        local.set_raw(GOALS_KEY, r#"{"dailyTarget":4}"#).unwrap();
        local.set_raw(BADGES_KEY, r#"{"totalXP":30}"#).unwrap();

        let adapter = SyncAdapter::new(local, Some(bridge.clone()));
        let results = adapter.flush_to_bridge().await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(bridge.get(GOALS_KEY).await["dailyTarget"], 4);
        assert_eq!(bridge.get(BADGES_KEY).await["totalXP"], 30);
    }

    #[tokio::test]
    async fn test_hooks_without_bridge_are_noops() {
        let adapter = SyncAdapter::new(LocalStore::open_in_memory().unwrap(), None);
        assert!(adapter.migrate_from_bridge().await.unwrap().is_empty());
        assert!(adapter.flush_to_bridge().await.is_empty());
        assert!(adapter.set_item(PROBLEMS_KEY, "[]").unwrap().is_none());
    }
}
