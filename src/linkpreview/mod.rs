//! 链接预览接口
//!
//! 请求格式：`{endpoint}?key={api_key}&q={url}`，返回 JSON：
//! ```json
//! { "title": "...", "description": "...", "image": "https://...", "url": "..." }
//! ```

pub mod types;

pub use types::LinkPreview;

use tracing::{debug, warn};

use crate::cache::{CacheError, CacheResult};
use crate::config::LinkPreviewConfig;
use crate::http::HttpFetcher;

/// API Key 环境变量名
pub const API_KEY_ENV: &str = "LINKPREVIEW_API_KEY";

/// 链接预览接口客户端
#[derive(Debug, Clone)]
pub struct LinkPreviewApi {
    endpoint: String,
    api_key: String,
}

impl LinkPreviewApi {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// 根据配置创建客户端
    ///
    /// 未启用或找不到 API Key（配置与环境变量均无）时返回 None
    pub fn from_config(config: &LinkPreviewConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()));

        match api_key {
            Some(key) => Some(Self::new(config.endpoint.clone(), key)),
            None => {
                warn!("已启用链接预览，但未配置 API Key（{}）", API_KEY_ENV);
                None
            }
        }
    }

    /// 构造请求地址
    pub fn request_url(&self, target: &str) -> String {
        format!(
            "{}?key={}&q={}",
            self.endpoint,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(target)
        )
    }

    /// 请求预览数据（不做本地化）
    pub fn fetch(&self, fetcher: &dyn HttpFetcher, target: &str) -> CacheResult<LinkPreview> {
        let resp = fetcher.get(&self.request_url(target))?;

        if !resp.is_success() {
            return Err(CacheError::LinkPreview {
                url: target.to_string(),
                status: resp.status,
            });
        }

        let preview: LinkPreview = serde_json::from_slice(&resp.body)?;
        debug!("链接预览: {} -> {:?}", target, preview.title);
        Ok(preview)
    }
}
