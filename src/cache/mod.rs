//! 图片重写缓存
//!
//! 负责将远程图片 URL 映射为输出目录下唯一命名的本地文件：
//! - 命中：直接返回已记录的文件名，不访问网络
//! - 未命中：分配唯一文件名 → 下载 → 写入文件 → 记录映射 → 持久化
//!
//! ## 文件结构
//!
//! ```text
//! {output_dir}/
//! ├── image-cache.json   # 缓存文档（mappings / used_filenames / link_previews）
//! ├── pic.jpg
//! └── 1_pic.jpg          # 与 pic.jpg 同名但来自不同 URL
//! ```
//!
//! 每次修改后立即整体写回文档（write-through），进程被杀最多丢失正在进行的一次下载。
//! 只支持单进程访问同一输出目录。

pub mod filename;
pub mod store;
pub mod types;

pub use types::{
    CacheError, CacheResult, CacheState, RestorePolicy, MAX_ALLOCATION_ATTEMPTS, STATE_FILE_NAME,
};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn, Span};

use crate::config::CacheConfig;
use crate::http::HttpFetcher;
use crate::linkpreview::{LinkPreview, LinkPreviewApi};
use store::LoadOutcome;

/// 缓存构造参数
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// 输出目录
    pub output_dir: PathBuf,
    /// 写入 HTML 时附加的路径前缀
    pub path_prefix: Option<String>,
    /// 文档损坏时的恢复策略
    pub restore_policy: RestorePolicy,
}

impl CacheOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            path_prefix: None,
            restore_policy: RestorePolicy::default(),
        }
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    pub fn with_restore_policy(mut self, policy: RestorePolicy) -> Self {
        self.restore_policy = policy;
        self
    }
}

impl From<&CacheConfig> for CacheOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            path_prefix: config.path_prefix.clone(),
            restore_policy: config.on_corrupt_state,
        }
    }
}

/// 图片重写缓存
pub struct ImageCache {
    output_dir: PathBuf,
    state_path: PathBuf,
    path_prefix: Option<String>,
    state: CacheState,
    fetcher: Box<dyn HttpFetcher>,
    link_preview: Option<LinkPreviewApi>,
    /// 本次抓取运行的日志上下文
    span: Span,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("output_dir", &self.output_dir)
            .field("path_prefix", &self.path_prefix)
            .field("mappings", &self.state.mappings.len())
            .field("link_preview", &self.link_preview.is_some())
            .finish()
    }
}

impl ImageCache {
    /// 创建缓存并从输出目录恢复状态
    ///
    /// 文档不存在时以空状态开始；文档损坏时按 `restore_policy` 处理
    pub fn restore(
        options: CacheOptions,
        fetcher: Box<dyn HttpFetcher>,
        span: Span,
    ) -> CacheResult<Self> {
        let _enter = span.enter();

        let output_dir = options.output_dir;
        fs::create_dir_all(&output_dir).map_err(|e| CacheError::io(&output_dir, e))?;
        let state_path = store::get_state_path(&output_dir);

        let state = match store::load_state(&state_path) {
            LoadOutcome::Missing => {
                info!("未找到缓存文档 {:?}，以空状态开始", state_path);
                CacheState::default()
            }
            LoadOutcome::Loaded(mut state) => match state.validate() {
                Ok(repaired) => {
                    if repaired > 0 {
                        warn!("缓存文档中有 {} 个文件名未登记，已补录", repaired);
                    }
                    info!(
                        "已恢复图片缓存: {} 条映射, {} 个链接预览",
                        state.mappings.len(),
                        state.link_previews.len()
                    );
                    state
                }
                Err(reason) => Self::on_corrupt(&state_path, reason, options.restore_policy)?,
            },
            LoadOutcome::Corrupt(reason) => {
                Self::on_corrupt(&state_path, reason, options.restore_policy)?
            }
        };

        drop(_enter);

        Ok(Self {
            output_dir,
            state_path,
            path_prefix: options.path_prefix,
            state,
            fetcher,
            link_preview: None,
            span,
        })
    }

    fn on_corrupt(path: &Path, reason: String, policy: RestorePolicy) -> CacheResult<CacheState> {
        match policy {
            RestorePolicy::Reset => {
                warn!("缓存文档 {:?} 无法使用（{}），丢弃并以空状态开始", path, reason);
                Ok(CacheState::default())
            }
            RestorePolicy::Fail => Err(CacheError::CorruptState {
                path: path.to_path_buf(),
                reason,
            }),
        }
    }

    /// 启用链接预览
    pub fn with_link_preview(mut self, api: Option<LinkPreviewApi>) -> Self {
        self.link_preview = api;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn state(&self) -> &CacheState {
        &self.state
    }

    /// 查询已缓存的本地文件名（不带前缀）
    pub fn lookup(&self, url: &str) -> Option<&str> {
        self.state.mappings.get(url).map(String::as_str)
    }

    /// 文件名是否已被占用
    ///
    /// 已登记、与缓存文档同名、或输出目录中已存在同名文件都视为占用
    fn is_taken(&self, name: &str) -> bool {
        if self.state.used_filenames.contains(name) {
            return true;
        }
        if name == STATE_FILE_NAME {
            return true;
        }
        self.output_dir.join(name).exists()
    }

    fn allocate_filename(&self, url: &str) -> CacheResult<String> {
        let basename = filename::basename_from_url(url);
        let chosen = filename::allocate(&basename, |candidate| self.is_taken(candidate))?;
        if chosen != basename {
            debug!("文件名 {} 已占用，改用 {}", basename, chosen);
        }
        Ok(chosen)
    }

    /// 为 URL 分配唯一文件名并登记
    pub fn remap(&mut self, url: &str) -> CacheResult<String> {
        let _enter = self.span.clone().entered();

        let chosen = self.allocate_filename(url)?;
        self.state.used_filenames.insert(chosen.clone());
        self.save()?;
        Ok(chosen)
    }

    /// 将远程图片 URL 重写为本地路径
    ///
    /// 命中缓存时不访问网络；未命中时下载并持久化。
    /// 两种情况返回值形式相同（带前缀的本地路径）
    pub fn rewrite_image_url(&mut self, url: &str) -> CacheResult<String> {
        let _enter = self.span.clone().entered();

        if let Some(existing) = self.state.mappings.get(url) {
            debug!("图片缓存命中: {} -> {}", url, existing);
            return Ok(filename::join_prefix(self.path_prefix.as_deref(), existing));
        }

        let chosen = self.allocate_filename(url)?;

        info!("下载图片: {} -> {}", url, chosen);
        let resp = self.fetcher.get(url)?;
        if !resp.is_success() || resp.body.is_empty() {
            warn!(
                "图片下载失败: {} (HTTP {}, {} 字节)",
                url,
                resp.status,
                resp.body.len()
            );
            return Err(CacheError::Download {
                url: url.to_string(),
                status: resp.status,
            });
        }

        let target = self.output_dir.join(&chosen);
        store::write_bytes(&target, &resp.body)?;

        self.state.used_filenames.insert(chosen.clone());
        self.state.mappings.insert(url.to_string(), chosen.clone());
        self.save()?;

        info!("已保存图片: {:?} ({} 字节)", target, resp.body.len());
        Ok(filename::join_prefix(self.path_prefix.as_deref(), &chosen))
    }

    /// 将完整状态写回缓存文档
    pub fn save(&self) -> CacheResult<()> {
        store::save_state(&self.state_path, &self.state)
    }

    /// 获取链接预览数据
    ///
    /// 按 URL 永久缓存；预览图会经过 [`rewrite_image_url`](Self::rewrite_image_url) 本地化。
    /// 文档中只保存不带前缀的文件名，返回时再拼接当前前缀
    pub fn fetch_linkpreview_data(&mut self, url: &str) -> CacheResult<LinkPreview> {
        let _enter = self.span.clone().entered();

        if let Some(cached) = self.state.link_previews.get(url) {
            debug!("链接预览缓存命中: {}", url);
            return Ok(self.with_prefixed_image(cached.clone()));
        }

        let api = self
            .link_preview
            .as_ref()
            .ok_or(CacheError::LinkPreviewUnavailable)?;

        info!("请求链接预览: {}", url);
        let mut preview = api.fetch(&*self.fetcher, url)?;

        if preview.has_image() {
            let remote_image = std::mem::take(&mut preview.image);
            self.rewrite_image_url(&remote_image)?;
            preview.image = self.lookup(&remote_image).unwrap_or_default().to_string();
        }

        self.state
            .link_previews
            .insert(url.to_string(), preview.clone());
        self.save()?;

        Ok(self.with_prefixed_image(preview))
    }

    fn with_prefixed_image(&self, mut preview: LinkPreview) -> LinkPreview {
        if preview.has_image() {
            preview.image = filename::join_prefix(self.path_prefix.as_deref(), &preview.image);
        }
        preview
    }
}
