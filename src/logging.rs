//! 日志系统配置
//!
//! 控制台输出 + 可选的日志文件（每次运行一个文件），启动时清理过期日志

use crate::config::LogConfig;
use chrono::{Local, NaiveDate};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{info, info_span, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "tweetantistorm.";
/// 日志文件扩展名
const LOG_FILE_SUFFIX: &str = ".log";
/// 时间戳格式
const TIMER_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 日志系统守卫
/// 必须保持存活，否则日志写入线程会终止
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// 生成本次运行的日志文件路径：`{log_dir}/tweetantistorm.YYYY-MM-DD-HHMMSS.log`
pub fn log_file_path(log_dir: &Path, started_at: &str) -> PathBuf {
    log_dir.join(format!("{}{}{}", LOG_FILE_PREFIX, started_at, LOG_FILE_SUFFIX))
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先于配置中的日志级别
pub fn init_logging(config: &LogConfig) -> LogGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // 日志写到 stderr，stdout 留给命令输出
    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new(TIMER_FORMAT.to_string()))
        .with_writer(std::io::stderr)
        .with_ansi(true);

    if !config.enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        return LogGuard { _file_guard: None };
    }

    let started_at = Local::now().format("%Y-%m-%d-%H%M%S").to_string();
    let path = log_file_path(&config.log_dir, &started_at);

    let file = fs::create_dir_all(&config.log_dir)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));

    let file = match file {
        Ok(file) => file,
        Err(e) => {
            eprintln!("创建日志文件失败: {:?}, 错误: {}，回退到仅控制台输出", path, e);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .init();
            return LogGuard { _file_guard: None };
        }
    };

    let (non_blocking, file_guard) = tracing_appender::non_blocking(file);

    // 文件输出层（不带 ANSI 颜色）
    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new(TIMER_FORMAT.to_string()))
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(
        "日志系统初始化完成: 文件={:?}, 保留天数={}, 级别={}",
        path, config.retention_days, config.level
    );

    cleanup_old_logs(&config.log_dir, config.retention_days, Local::now().date_naive());

    LogGuard {
        _file_guard: Some(file_guard),
    }
}

/// 创建一次抓取运行的日志上下文
///
/// 交给 ImageCache，缓存内的所有日志都挂在这个 span 下
pub fn scrape_run_span(output_dir: &Path) -> Span {
    let run_id = Local::now().format("%Y%m%d%H%M%S").to_string();
    info_span!("scrape_run", run = %run_id, output = %output_dir.display())
}

/// 清理过期日志文件，返回删除数量
fn cleanup_old_logs(log_dir: &Path, retention_days: u32, today: NaiveDate) -> usize {
    let retention = chrono::Duration::days(retention_days as i64);

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("读取日志目录失败: {:?}, 错误: {}", log_dir, e);
            return 0;
        }
    };

    let mut deleted_count = 0;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(file_date) = path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(extract_date_from_filename)
        else {
            continue;
        };

        if today.signed_duration_since(file_date) > retention {
            match fs::remove_file(&path) {
                Ok(()) => {
                    deleted_count += 1;
                    tracing::debug!("已删除过期日志文件: {:?}", path);
                }
                Err(e) => tracing::warn!("删除过期日志文件失败: {:?}, 错误: {}", path, e),
            }
        }
    }

    if deleted_count > 0 {
        info!("已清理 {} 个过期日志文件", deleted_count);
    }
    deleted_count
}

/// 从文件名中提取日期
///
/// `tweetantistorm.YYYY-MM-DD-HHMMSS.log` -> YYYY-MM-DD
fn extract_date_from_filename(filename: &str) -> Option<NaiveDate> {
    let name = filename
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_suffix(LOG_FILE_SUFFIX)?;
    let date = name.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_path() {
        let path = log_file_path(Path::new("logs"), "2026-01-02-030405");
        assert_eq!(
            path,
            PathBuf::from("logs/tweetantistorm.2026-01-02-030405.log")
        );
    }

    #[test]
    fn test_extract_date_from_filename() {
        assert_eq!(
            extract_date_from_filename("tweetantistorm.2026-01-02-030405.log"),
            NaiveDate::from_ymd_opt(2026, 1, 2)
        );
        assert_eq!(extract_date_from_filename("other.2026-01-02.log"), None);
        assert_eq!(extract_date_from_filename("tweetantistorm.garbage.log"), None);
    }

    #[test]
    fn test_cleanup_old_logs() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(log_file_path(dir, "2026-01-01-000000"), "old").unwrap();
        fs::write(log_file_path(dir, "2026-01-09-000000"), "new").unwrap();
        fs::write(dir.join("notes.txt"), "keep").unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        assert_eq!(cleanup_old_logs(dir, 7, today), 1);

        assert!(!log_file_path(dir, "2026-01-01-000000").exists());
        assert!(log_file_path(dir, "2026-01-09-000000").exists());
        assert!(dir.join("notes.txt").exists());
    }
}
