// tweetantistorm
// Thread reader 页面图片本地化：图片重写缓存核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// HTTP 抓取模块
pub mod http;

// 图片重写缓存模块
pub mod cache;

// 链接预览模块
pub mod linkpreview;

// 导出常用类型
pub use cache::{CacheError, CacheOptions, CacheState, ImageCache, RestorePolicy};
pub use config::AppConfig;
pub use http::{HttpFetcher, HttpResponse, ReqwestFetcher};
pub use linkpreview::{LinkPreview, LinkPreviewApi};
