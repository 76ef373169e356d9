// HTTP 抓取模块
//
// 图片下载和链接预览请求都通过 HttpFetcher 完成，
// 测试中可以替换为内存实现

pub mod client;

pub use client::ReqwestFetcher;

use crate::cache::CacheResult;

/// HTTP 响应
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// 状态码
    pub status: u16,
    /// 原始响应体
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 状态码是否为 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 阻塞式 HTTP GET
pub trait HttpFetcher {
    fn get(&self, url: &str) -> CacheResult<HttpResponse>;
}
