//! 备份导出与导入
//!
//! 备份保存的是每个键在本地存储中的原始 JSON 文本，导入即逐键还原，
//! 不做语义合并。导入后需要重启应用，容器才会重新加载。

use crate::db::LOCAL_PREFIX;
use crate::error::{AppError, AppResult};
use crate::services::storage::{
    SyncAdapter, BADGES_KEY, GOALS_KEY, KNOWN_KEYS, NOTES_KEY, PROBLEMS_KEY, SNIPPETS_KEY,
};
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const BACKUP_VERSION: &str = "1.0.0";

/// 备份文件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub data: BackupPayload,
}

/// 各键的原始文本，缺失的键为 null
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupPayload {
    pub problems: Option<String>,
    pub notes: Option<String>,
    pub snippets: Option<String>,
    pub goals: Option<String>,
    pub badges: Option<String>,
}

impl BackupPayload {
    pub fn get(&self, key: &str) -> Option<&str> {
        let slot = match key {
            PROBLEMS_KEY => &self.problems,
            NOTES_KEY => &self.notes,
            SNIPPETS_KEY => &self.snippets,
            GOALS_KEY => &self.goals,
            BADGES_KEY => &self.badges,
            _ => return None,
        };
        slot.as_deref()
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            PROBLEMS_KEY => Some(&mut self.problems),
            NOTES_KEY => Some(&mut self.notes),
            SNIPPETS_KEY => Some(&mut self.snippets),
            GOALS_KEY => Some(&mut self.goals),
            BADGES_KEY => Some(&mut self.badges),
            _ => None,
        }
    }
}

impl BackupData {
    /// 两空格缩进的 JSON
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// 导入结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub restored: Vec<String>,
    pub removed: Vec<String>,
}

/// 默认备份文件名
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("upsolve-backup-{}.json", date.format("%Y-%m-%d"))
}

/// 读取本地存储中所有已知键的原始文本
pub fn export_backup(adapter: &SyncAdapter) -> AppResult<BackupData> {
    export_backup_at(adapter, Utc::now())
}

pub fn export_backup_at(adapter: &SyncAdapter, now: DateTime<Utc>) -> AppResult<BackupData> {
    let mut payload = BackupPayload::default();
    for key in KNOWN_KEYS {
        if let Some(slot) = payload.slot_mut(key) {
            *slot = adapter.local().get_raw(key)?;
        }
    }

    Ok(BackupData {
        version: BACKUP_VERSION.to_string(),
        exported_at: now,
        data: payload,
    })
}

/// 解析并校验备份结构：只要求 version 与 data 存在，不检查各键内容
pub fn parse_backup(json: &str) -> AppResult<BackupPayload> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| AppError::InvalidBackup(format!("not a JSON document: {}", e)))?;

    let has_version = match root.get("version") {
        Some(Value::String(version)) => !version.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    };
    if !has_version {
        return Err(AppError::InvalidBackup("missing version".to_string()));
    }

    let data = match root.get("data") {
        Some(Value::Object(data)) => data,
        Some(Value::Null) | None => {
            return Err(AppError::InvalidBackup("missing data".to_string()));
        }
        Some(_) => return Err(AppError::InvalidBackup("data must be an object".to_string())),
    };

    let mut payload = BackupPayload::default();
    for key in KNOWN_KEYS {
        let raw = match data.get(key) {
            Some(Value::String(raw)) => Some(raw.clone()),
            Some(Value::Null) | None => None,
            Some(_) => {
                return Err(AppError::InvalidBackup(format!("{} must be a string or null", key)));
            }
        };
        if let Some(slot) = payload.slot_mut(key) {
            *slot = raw;
        }
    }
    Ok(payload)
}

/// 逐键还原：有值则覆盖，null 则删除；结构错误时不修改任何数据
pub async fn import_backup(adapter: &SyncAdapter, json: &str) -> AppResult<ImportSummary> {
    let payload = parse_backup(json)?;

    let mut summary = ImportSummary::default();
    let mut mirrors = Vec::new();
    for key in KNOWN_KEYS {
        let mirror = match payload.get(key) {
            Some(raw) => {
                summary.restored.push(key.to_string());
                adapter.set_item(key, raw)?
            }
            None => {
                summary.removed.push(key.to_string());
                adapter.remove_item(key)?
            }
        };
        mirrors.extend(mirror);
    }

    // 镜像失败已在任务内记录，这里只等待完成
    for joined in join_all(mirrors).await {
        if let Err(e) = joined {
            log::warn!("backup mirror task aborted: {}", e);
        }
    }

    log::info!(
        "backup imported: restored {:?}, removed {:?}",
        summary.restored,
        summary.removed
    );
    Ok(summary)
}

/// 本地存储占用的估算字节数（按 UTF-16 每字符 2 字节计）
pub fn storage_usage_bytes(adapter: &SyncAdapter) -> AppResult<u64> {
    let mut total = 0u64;
    let local = adapter.local();
    for key in local.keys()? {
        if !key.starts_with(LOCAL_PREFIX) {
            continue;
        }
        if let Some(raw) = local.get_item(&key)? {
            total += raw.encode_utf16().count() as u64 * 2;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LocalStore;
    use crate::services::storage::BridgedStore;

    fn adapter() -> SyncAdapter {
        SyncAdapter::new(LocalStore::open_in_memory().unwrap(), None)
    }

    fn seed(adapter: &SyncAdapter) {
        let local = adapter.local();
        local
            .set_raw(PROBLEMS_KEY, r#"[{"id":"p1","title":"Watermelon"}]"#)
            .unwrap();
        local.set_raw(NOTES_KEY, "[]").unwrap();
        local.set_raw(GOALS_KEY, r#"{"dailyTarget":5,"weeklyTarget":20}"#).unwrap();
        local.set_raw(BADGES_KEY, r#"{"unlockedBadges":["first-blood"],"totalXP":10}"#).unwrap();
    }

    #[test]
    fn test_backup_file_name() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(backup_file_name(date), "upsolve-backup-2026-03-07.json");
    }

    #[test]
    fn test_export_shape() {
        let adapter = adapter();
        seed(&adapter);

        let backup = export_backup(&adapter).unwrap();
        let value: Value = serde_json::from_str(&backup.to_json().unwrap()).unwrap();

        assert_eq!(value["version"], "1.0.0");
        assert!(value["exportedAt"].is_string());
        assert_eq!(value["data"]["notes"], "[]");
        assert!(value["data"]["snippets"].is_null());
    }

    #[tokio::test]
    async fn test_round_trip_restores_identical_values() {
        let source = adapter();
        seed(&source);
        let json = export_backup(&source).unwrap().to_json().unwrap();

        let target = adapter();
        let summary = import_backup(&target, &json).await.unwrap();
        assert_eq!(summary.removed, vec![SNIPPETS_KEY.to_string()]);

        for key in KNOWN_KEYS {
            assert_eq!(
                target.local().get_raw(key).unwrap(),
                source.local().get_raw(key).unwrap(),
                "key {}",
                key
            );
        }
    }

    #[tokio::test]
    async fn test_import_overwrites_and_removes() {
        let adapter = adapter();
        seed(&adapter);
        adapter.local().set_raw(SNIPPETS_KEY, "[]").unwrap();

        let json = r#"{"version":"1.0.0","data":{"problems":"[]","notes":null}}"#;
        import_backup(&adapter, json).await.unwrap();

        assert_eq!(adapter.local().get_raw(PROBLEMS_KEY).unwrap().as_deref(), Some("[]"));
        for key in [NOTES_KEY, SNIPPETS_KEY, GOALS_KEY, BADGES_KEY] {
            assert!(adapter.local().get_raw(key).unwrap().is_none(), "{}", key);
        }
    }

    #[tokio::test]
    async fn test_structural_errors_leave_state_untouched() {
        let adapter = adapter();
        seed(&adapter);
        let before = export_backup(&adapter).unwrap().data;

        for json in [
            "not json",
            r#"{"data":{}}"#,
            r#"{"version":"","data":{}}"#,
            r#"{"version":"1.0.0"}"#,
            r#"{"version":"1.0.0","data":null}"#,
            r#"{"version":"1.0.0","data":{"problems":[1,2]}}"#,
        ] {
            let result = import_backup(&adapter, json).await;
            assert!(matches!(result, Err(AppError::InvalidBackup(_))), "{}", json);
        }

        assert_eq!(export_backup(&adapter).unwrap().data, before);
    }

    #[tokio::test]
    async fn test_import_accepts_unparseable_content() {
        let adapter = adapter();
        let json = r#"{"version":"0.9","data":{"goals":"{broken"}}"#;

        import_backup(&adapter, json).await.unwrap();
        assert_eq!(adapter.local().get_raw(GOALS_KEY).unwrap().as_deref(), Some("{broken"));
    }

    #[tokio::test]
    async fn test_import_mirrors_to_bridge() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bridge = BridgedStore::open(dir.path().join("upsolve-store.json")).await.unwrap();
        let adapter = SyncAdapter::new(LocalStore::open_in_memory().unwrap(), Some(bridge.clone()));

        let json = r#"{"version":"1.0.0","data":{"goals":"{\"dailyTarget\":7}"}}"#;
        import_backup(&adapter, json).await.unwrap();

        assert_eq!(bridge.get(GOALS_KEY).await["dailyTarget"], 7);
        assert!(bridge.get_stored(PROBLEMS_KEY).await.is_none());
    }

    #[test]
    fn test_storage_usage_counts_utf16() {
        let adapter = adapter();
        adapter.local().set_raw(NOTES_KEY, "ab").unwrap();
        adapter.local().set_raw(GOALS_KEY, "图论").unwrap();
        // 非本应用命名空间的键不计入
        adapter.local().set_item("other-app", "ignored").unwrap();

        assert_eq!(storage_usage_bytes(&adapter).unwrap(), 8);
    }
}
