use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tweetantistorm::{
    cache::{CacheError, CacheOptions, ImageCache},
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    http::ReqwestFetcher,
    linkpreview::LinkPreviewApi,
    logging,
};

/// Thread reader 图片本地化工具
#[derive(Parser)]
#[command(name = "tweetantistorm")]
#[command(about = "将 thread 图片下载到本地缓存并输出本地路径", version)]
struct Cli {
    /// 配置文件路径
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// 输出目录（覆盖配置）
    #[arg(long, env = "TWEETANTISTORM_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// 生成 HTML 时的图片路径前缀（覆盖配置）
    #[arg(long)]
    path_prefix: Option<String>,

    /// 日志级别（覆盖配置）
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 下载图片并输出本地路径
    Rewrite {
        /// 远程图片 URL
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// 获取链接预览（预览图会本地化）
    Preview {
        /// 页面 URL
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// 列出已缓存的 URL -> 文件映射
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)?;
    if let Some(dir) = cli.output_dir {
        config.cache.output_dir = dir;
    }
    if let Some(prefix) = cli.path_prefix {
        config.cache.path_prefix = Some(prefix);
    }
    if let Some(level) = cli.log_level {
        config.log.level = level;
    }

    let _log_guard = logging::init_logging(&config.log);

    let fetcher = ReqwestFetcher::new(&config.http)?;
    let span = logging::scrape_run_span(&config.cache.output_dir);
    let mut cache = ImageCache::restore(
        CacheOptions::from(&config.cache),
        Box::new(fetcher),
        span,
    )
    .with_context(|| format!("无法打开图片缓存 {:?}", config.cache.output_dir))?
    .with_link_preview(LinkPreviewApi::from_config(&config.link_preview));

    match cli.command {
        Commands::Rewrite { urls } => {
            let mut failed = 0;
            for url in &urls {
                match cache.rewrite_image_url(url) {
                    Ok(path) => println!("{}\t{}", url, path),
                    // 单个 URL 的失败不影响其它图片，文件系统等错误直接中止
                    Err(
                        e @ (CacheError::Download { .. }
                        | CacheError::Http { .. }
                        | CacheError::Allocation { .. }),
                    ) => {
                        error!("{}", e);
                        failed += 1;
                    }
                    Err(e) => return Err(e).context("图片缓存写入失败"),
                }
            }
            info!("完成: {} 成功, {} 失败", urls.len() - failed, failed);
            if failed > 0 {
                anyhow::bail!("{} 个图片下载失败", failed);
            }
        }
        Commands::Preview { urls } => {
            for url in &urls {
                let preview = cache
                    .fetch_linkpreview_data(url)
                    .with_context(|| format!("获取链接预览失败: {}", url))?;
                println!("{}", serde_json::to_string_pretty(&preview)?);
            }
        }
        Commands::List => {
            let mut entries: Vec<_> = cache.state().mappings.iter().collect();
            entries.sort();
            for (url, file) in entries {
                println!("{}\t{}", url, file);
            }
        }
    }

    Ok(())
}
