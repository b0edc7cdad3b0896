// 日志初始化
// 使用 fern 分发 log 记录到标准输出与日志文件

use crate::config::LogConfig;
use crate::error::{AppError, AppResult};
use std::path::Path;

const LOG_FILE_NAME: &str = "upsolve.log";

/// 初始化全局日志，进程内只生效一次
pub fn init_logging(config: &LogConfig, log_dir: &Path) -> AppResult<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(config.level)
        // 依赖库的噪音日志
        .level_for("tao", log::LevelFilter::Warn)
        .level_for("wry", log::LevelFilter::Warn)
        .chain(std::io::stdout());

    if config.to_file {
        std::fs::create_dir_all(log_dir)?;
        dispatch = dispatch.chain(fern::log_file(log_dir.join(LOG_FILE_NAME))?);
    }

    dispatch
        .apply()
        .map_err(|e| AppError::Internal(format!("logger already initialized: {}", e)))
}
