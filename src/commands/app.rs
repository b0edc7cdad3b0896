// 应用信息命令

use crate::config;
use crate::services::render_markdown as render;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub version: String,
    pub platform: String,
    pub arch: String,
}

#[tauri::command]
pub fn get_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[tauri::command]
pub fn get_app_info() -> AppInfo {
    AppInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        platform: config::get_platform().to_string(),
        arch: config::get_arch().to_string(),
    }
}

/// 预览未保存的 Markdown
#[tauri::command]
pub fn render_markdown(content: String) -> String {
    render(&content)
}
