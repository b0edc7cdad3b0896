// 数据管理命令
// 备份导出/导入、清空数据与存储占用

use crate::services::{backup, AppServices, ImportSummary};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tauri::State;

/// 导出结果：建议文件名与备份内容
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupExport {
    pub file_name: String,
    pub content: String,
}

#[tauri::command]
pub async fn export_backup(state: State<'_, AppServices>) -> Result<BackupExport, String> {
    let data = backup::export_backup(state.adapter()).map_err(|e| e.to_string())?;

    Ok(BackupExport {
        file_name: backup::backup_file_name(data.exported_at.date_naive()),
        content: data.to_json().map_err(|e| e.to_string())?,
    })
}

/// 导入后需要重启应用才能生效
#[tauri::command]
pub async fn import_backup(
    content: String,
    state: State<'_, AppServices>,
) -> Result<ImportSummary, String> {
    backup::import_backup(state.adapter(), &content)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn clear_all_data(state: State<'_, AppServices>) -> Result<(), String> {
    state.clear_all_data().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_storage_usage(state: State<'_, AppServices>) -> Result<u64, String> {
    backup::storage_usage_bytes(state.adapter()).map_err(|e| e.to_string())
}

/// 当前后端中的全部数据（外部存储含默认值）
#[tauri::command]
pub async fn get_stored_data(state: State<'_, AppServices>) -> Result<Map<String, Value>, String> {
    state.storage().get_all().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn suggest_backup_file_name() -> String {
    backup::backup_file_name(Utc::now().date_naive())
}
