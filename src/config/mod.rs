// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cache::RestorePolicy;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 图片缓存配置
    #[serde(default)]
    pub cache: CacheConfig,
    /// HTTP 客户端配置
    #[serde(default)]
    pub http: HttpConfig,
    /// 链接预览配置
    #[serde(default)]
    pub link_preview: LinkPreviewConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 图片缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 输出目录（图片与缓存文档都放在这里）
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// 写入 HTML 时的图片路径前缀
    #[serde(default)]
    pub path_prefix: Option<String>,
    /// 缓存文档损坏时的处理方式：reset（默认）或 fail
    #[serde(default)]
    pub on_corrupt_state: RestorePolicy,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            path_prefix: None,
            on_corrupt_state: RestorePolicy::default(),
        }
    }
}

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 请求超时（秒），0 表示不限制
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 最大重定向次数
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_user_agent() -> String {
    format!("tweetantistorm/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_redirects() -> usize {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

/// 链接预览配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkPreviewConfig {
    /// 是否启用
    #[serde(default)]
    pub enabled: bool,
    /// 接口地址
    #[serde(default = "default_link_preview_endpoint")]
    pub endpoint: String,
    /// API Key（未配置时读取 LINKPREVIEW_API_KEY 环境变量）
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_link_preview_endpoint() -> String {
    "https://api.linkpreview.net/".to_string()
}

impl Default for LinkPreviewConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_link_preview_endpoint(),
            api_key: None,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;

        Ok(config)
    }

    /// 加载配置，文件不存在时使用默认值
    ///
    /// 文件存在但无法解析时返回错误
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("配置文件 {:?} 不存在，使用默认配置", path);
            return Ok(Self::default());
        }

        Self::load_from_file(path)
    }
}
