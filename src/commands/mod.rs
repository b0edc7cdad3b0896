// Tauri 命令模块
// 提供供前端调用的命令接口，只做参数转换与错误字符串化
// 注册命令时使用完整模块路径（如 commands::records::add_problem）

pub mod app;
pub mod backup;
pub mod progress;
pub mod records;

pub use app::AppInfo;
pub use backup::BackupExport;
pub use progress::{BadgeOverview, BadgeView};
