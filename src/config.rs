// 运行时配置
// 数据目录、桌面桥接能力与日志级别，启动时确定一次

use log::LevelFilter;
use std::path::PathBuf;

const APP_DIR_NAME: &str = "upsolve";
const LOCAL_DB_FILE: &str = "upsolve.db";
const BRIDGE_STORE_FILE: &str = "upsolve-store.json";

/// 日志配置
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub to_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            to_file: true,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// 是否运行在桌面宿主中（外部 JSON 存储可用）
    pub desktop_bridge: bool,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            desktop_bridge: false,
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从进程环境变量读取配置
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// 从键值对读取配置，未知取值回落到默认值
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();

        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                "UPSOLVE_DATA_DIR" if !value.is_empty() => {
                    config.data_dir = PathBuf::from(value);
                }
                "UPSOLVE_DESKTOP_BRIDGE" => {
                    config.desktop_bridge = parse_flag(value).unwrap_or(false);
                }
                "UPSOLVE_LOG" => {
                    if let Ok(level) = value.parse::<LevelFilter>() {
                        config.log.level = level;
                    }
                }
                "UPSOLVE_LOG_FILE" => {
                    config.log.to_file = parse_flag(value).unwrap_or(true);
                }
                _ => {}
            }
        }

        config
    }

    /// 本地 SQLite 存储路径
    pub fn local_db_path(&self) -> PathBuf {
        self.data_dir.join(LOCAL_DB_FILE)
    }

    /// 外部 JSON 存储路径
    pub fn bridge_store_path(&self) -> PathBuf {
        self.data_dir.join(BRIDGE_STORE_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => {
            let mut path = PathBuf::from(home);
            path.push(".local/share");
            path.push(APP_DIR_NAME);
            path
        }
        None => PathBuf::from("data"),
    }
}

pub fn get_platform() -> &'static str {
    std::env::consts::OS
}

pub fn get_arch() -> &'static str {
    std::env::consts::ARCH
}
