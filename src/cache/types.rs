//! 图片缓存相关类型定义

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::linkpreview::LinkPreview;

/// 缓存文件名（位于输出目录下）
pub const STATE_FILE_NAME: &str = "image-cache.json";

/// 同名文件消歧的最大尝试次数
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 1000;

/// 持久化的缓存状态
///
/// 对应磁盘上的 JSON 文档：
/// ```json
/// {
///   "mappings": { "https://cdn.example/img/pic.jpg": "pic.jpg" },
///   "used_filenames": ["pic.jpg"],
///   "link_previews": {}
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheState {
    /// 远程 URL -> 本地文件名
    #[serde(default)]
    pub mappings: HashMap<String, String>,
    /// 已分配的文件名（序列化为有序数组）
    #[serde(default)]
    pub used_filenames: BTreeSet<String>,
    /// 链接预览缓存，与 mappings 是独立的命名空间
    #[serde(default)]
    pub link_previews: HashMap<String, LinkPreview>,
}

impl CacheState {
    /// 校验并修复加载后的状态
    ///
    /// - mappings 中的文件名缺失于 used_filenames：补录，返回补录数量
    /// - 两个 URL 指向同一文件名：无法修复，返回 Err
    pub fn validate(&mut self) -> Result<usize, String> {
        let mut owners: HashMap<&str, &str> = HashMap::with_capacity(self.mappings.len());
        for (url, filename) in &self.mappings {
            if let Some(other) = owners.insert(filename.as_str(), url.as_str()) {
                return Err(format!(
                    "文件名 {} 同时映射到 {} 和 {}",
                    filename, other, url
                ));
            }
        }

        let missing: Vec<String> = self
            .mappings
            .values()
            .filter(|f| !self.used_filenames.contains(*f))
            .cloned()
            .collect();
        let repaired = missing.len();
        self.used_filenames.extend(missing);

        Ok(repaired)
    }

    /// 是否为空状态
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty() && self.used_filenames.is_empty() && self.link_previews.is_empty()
    }
}

/// 缓存文档损坏时的恢复策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestorePolicy {
    /// 记录警告并以空状态继续（默认）
    #[default]
    Reset,
    /// 直接报错，交给调用方处理
    Fail,
}

/// 图片缓存错误
#[derive(Debug, Error)]
pub enum CacheError {
    /// 下载失败：非成功状态码或响应体为空
    #[error("下载失败: {url} (HTTP {status})")]
    Download { url: String, status: u16 },

    /// 同名文件过多，无法分配唯一文件名
    #[error("无法为 {basename} 分配唯一文件名（已尝试 {attempts} 次）")]
    Allocation { basename: String, attempts: u32 },

    /// 缓存文档损坏（仅在 RestorePolicy::Fail 时返回）
    #[error("缓存文档损坏 {path:?}: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    /// 网络请求失败
    #[error("请求失败: {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 链接预览接口返回错误
    #[error("链接预览请求失败: {url} (HTTP {status})")]
    LinkPreview { url: String, status: u16 },

    /// 未配置链接预览接口
    #[error("未配置链接预览接口")]
    LinkPreviewUnavailable,

    /// 文件系统错误
    #[error("文件操作失败 {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON 序列化/反序列化错误
    #[error("JSON 处理失败: {0}")]
    Json(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

/// 缓存操作结果
pub type CacheResult<T> = std::result::Result<T, CacheError>;
