// 基于 reqwest blocking 客户端的 HttpFetcher 实现

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::debug;

use super::{HttpFetcher, HttpResponse};
use crate::cache::{CacheError, CacheResult};
use crate::config::HttpConfig;

/// reqwest 抓取器
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// 根据配置创建抓取器
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));

        // timeout_secs = 0 表示不设超时
        builder = if config.timeout_secs > 0 {
            builder.timeout(Duration::from_secs(config.timeout_secs))
        } else {
            builder.timeout(None)
        };

        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn get(&self, url: &str) -> CacheResult<HttpResponse> {
        let http_err = |source| CacheError::Http {
            url: url.to_string(),
            source,
        };

        let resp = self.client.get(url).send().map_err(http_err)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(http_err)?.to_vec();

        debug!("GET {} -> HTTP {} ({} 字节)", url, status, body.len());

        Ok(HttpResponse { status, body })
    }
}
