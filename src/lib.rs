//! UpSolve 刷题记录引擎
//! 题目/笔记/代码片段容器、统计派生、成就系统与双后端持久化；
//! 桌面外壳（`desktop` 特性）只负责注册命令与生命周期钩子。

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

#[cfg(feature = "desktop")]
pub mod commands;

pub use config::{AppConfig, LogConfig};
pub use error::{AppError, AppResult};
pub use services::AppServices;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use tauri::Manager;

    let mut app_config = AppConfig::from_env();
    // 运行在桌面宿主中，外部存储始终可用
    app_config.desktop_bridge = true;

    tauri::Builder::default()
        .plugin(tauri_plugin_shell::init())
        .setup(move |app| {
            app_config.data_dir = app.path().app_data_dir()?;

            if let Err(e) = logging::init_logging(&app_config.log, &app_config.log_dir()) {
                eprintln!("logger init failed: {}", e);
            }
            log::info!(
                "starting UpSolve {} on {}/{}",
                env!("CARGO_PKG_VERSION"),
                config::get_platform(),
                config::get_arch()
            );

            let services = tauri::async_runtime::block_on(AppServices::bootstrap(&app_config))?;
            app.manage(services);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // 应用信息
            commands::app::get_app_version,
            commands::app::get_app_info,
            commands::app::render_markdown,
            // 题目
            commands::records::list_problems,
            commands::records::add_problem,
            commands::records::update_problem,
            commands::records::delete_problem,
            commands::records::search_problems,
            commands::records::get_problems_by_tag,
            commands::records::open_problem_link,
            // 笔记
            commands::records::list_notes,
            commands::records::add_note,
            commands::records::update_note,
            commands::records::delete_note,
            commands::records::search_notes,
            commands::records::render_note,
            // 代码片段
            commands::records::list_snippets,
            commands::records::add_snippet,
            commands::records::update_snippet,
            commands::records::delete_snippet,
            commands::records::search_snippets,
            // 统计与成就
            commands::progress::get_dashboard,
            commands::progress::get_heatmap,
            commands::progress::get_tag_histogram,
            commands::progress::get_weekly_chart,
            commands::progress::refresh_progress,
            commands::progress::get_goals,
            commands::progress::set_goal_targets,
            commands::progress::list_badges,
            commands::progress::add_custom_badge,
            commands::progress::delete_custom_badge,
            commands::progress::unlock_badge,
            // 数据管理
            commands::backup::export_backup,
            commands::backup::import_backup,
            commands::backup::clear_all_data,
            commands::backup::get_storage_usage,
            commands::backup::get_stored_data,
            commands::backup::suggest_backup_file_name,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let tauri::RunEvent::Exit = event {
                if let Some(services) = app.try_state::<AppServices>() {
                    tauri::async_runtime::block_on(services.shutdown());
                }
            }
        });
}
