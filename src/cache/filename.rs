//! 本地文件名推导与唯一性分配

use reqwest::Url;

use super::types::{CacheError, CacheResult, MAX_ALLOCATION_ATTEMPTS};

/// URL 路径为空时使用的文件名
const FALLBACK_BASENAME: &str = "image";

/// 候选文件名的最大字节数
///
/// 常见文件系统单个文件名上限为 255 字节，需给 `{n}_` 前缀留出空间
pub const MAX_BASENAME_BYTES: usize = 200;

/// 截断时保留的最长扩展名（含 `.`）
const MAX_EXTENSION_BYTES: usize = 16;

/// 从 URL 推导候选文件名
///
/// 只取路径最后一段，丢弃查询串和片段，
/// 因此 `a.jpg?x=1` 与 `a.jpg?x=2` 得到同一个候选名
pub fn basename_from_url(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // 相对地址或非法 URL：手动去掉查询串和片段
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let last = path.rsplit('/').next().unwrap_or_default();
    let decoded = urlencoding::decode(last)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| last.to_string());

    sanitize(&decoded)
}

/// 去掉不能出现在文件名中的字符
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        FALLBACK_BASENAME.to_string()
    } else {
        truncate(trimmed)
    }
}

/// 超长文件名截断主干部分，保留扩展名，按字符边界切分
fn truncate(name: &str) -> String {
    if name.len() <= MAX_BASENAME_BYTES {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 && name.len() - idx <= MAX_EXTENSION_BYTES => name.split_at(idx),
        _ => (name, ""),
    };

    let mut end = MAX_BASENAME_BYTES - ext.len();
    while !stem.is_char_boundary(end) {
        end -= 1;
    }

    let stem = stem[..end].trim_end_matches(|c: char| c == '.' || c.is_whitespace());
    if stem.is_empty() {
        format!("{}{}", FALLBACK_BASENAME, ext)
    } else {
        format!("{}{}", stem, ext)
    }
}

/// 生成第 n 次重试的候选名：`{n}_{basename}`
pub fn numbered_candidate(n: u32, basename: &str) -> String {
    format!("{}_{}", n, basename)
}

/// 分配唯一文件名
///
/// 先尝试原始候选名，被占用时依次尝试 `1_x.jpg`、`2_x.jpg`……
/// 最多 [`MAX_ALLOCATION_ATTEMPTS`] 次
pub fn allocate<F>(basename: &str, is_taken: F) -> CacheResult<String>
where
    F: Fn(&str) -> bool,
{
    if !is_taken(basename) {
        return Ok(basename.to_string());
    }

    (1..=MAX_ALLOCATION_ATTEMPTS)
        .map(|n| numbered_candidate(n, basename))
        .find(|candidate| !is_taken(candidate))
        .ok_or_else(|| CacheError::Allocation {
            basename: basename.to_string(),
            attempts: MAX_ALLOCATION_ATTEMPTS,
        })
}

/// 将路径前缀与文件名拼接，用于写入生成的 HTML
pub fn join_prefix(prefix: Option<&str>, filename: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => {
            format!("{}/{}", p.trim_end_matches('/'), filename)
        }
        _ => filename.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_basename_from_url() {
        assert_eq!(basename_from_url("https://cdn.example/img/pic.jpg"), "pic.jpg");
        assert_eq!(
            basename_from_url("https://pbs.twimg.com/media/E1abc.jpg?format=jpg&name=large"),
            "E1abc.jpg"
        );
        assert_eq!(basename_from_url("https://a/x.png#frag"), "x.png");
    }

    #[test]
    fn test_basename_query_string_ignored() {
        assert_eq!(
            basename_from_url("https://a/x.jpg?v=1"),
            basename_from_url("https://a/x.jpg?v=2")
        );
    }

    #[test]
    fn test_basename_fallback_and_decode() {
        assert_eq!(basename_from_url("https://a/"), "image");
        assert_eq!(basename_from_url("https://a"), "image");
        assert_eq!(basename_from_url("https://a/my%20pic.jpg"), "my pic.jpg");
        assert_eq!(basename_from_url("https://a/..%2F..%2Fetc"), "_.._etc");
        assert_eq!(basename_from_url("img/local.gif?x=1"), "local.gif");
    }

    #[test]
    fn test_long_basename_truncated_with_extension() {
        let url = format!("https://a/{}.jpg", "x".repeat(260));
        let name = basename_from_url(&url);

        assert_eq!(name.len(), MAX_BASENAME_BYTES);
        assert!(name.ends_with(".jpg"));
        assert!(name.starts_with("xxxx"));
        // 加上重试前缀后仍在 255 字节以内
        assert!(numbered_candidate(MAX_ALLOCATION_ATTEMPTS, &name).len() <= 255);
    }

    #[test]
    fn test_long_basename_cut_on_char_boundary() {
        // 每个字符 3 字节，截断点落在字符中间
        let url = format!("https://a/{}.png", "图".repeat(100));
        let name = basename_from_url(&url);

        assert!(name.len() <= MAX_BASENAME_BYTES);
        assert!(name.ends_with(".png"));
        assert!(name.trim_end_matches(".png").chars().all(|c| c == '图'));
    }

    #[test]
    fn test_long_basename_without_extension() {
        let name = basename_from_url(&format!("https://a/{}", "y".repeat(300)));
        assert_eq!(name, "y".repeat(MAX_BASENAME_BYTES));

        // 过长的“扩展名”不保留
        let name = basename_from_url(&format!("https://a/a.{}", "z".repeat(300)));
        assert_eq!(name.len(), MAX_BASENAME_BYTES);
        assert!(name.starts_with("a.zzz"));
    }

    #[test]
    fn test_short_basename_untouched() {
        assert_eq!(basename_from_url("https://a/short.jpeg"), "short.jpeg");
    }

    #[test]
    fn test_numbered_candidate_interpolates() {
        assert_eq!(numbered_candidate(1, "pic.jpg"), "1_pic.jpg");
        assert_eq!(numbered_candidate(42, "pic.jpg"), "42_pic.jpg");
    }

    #[test]
    fn test_allocate_free_name() {
        let taken: HashSet<&str> = HashSet::new();
        assert_eq!(allocate("pic.jpg", |n| taken.contains(n)).unwrap(), "pic.jpg");
    }

    #[test]
    fn test_allocate_collisions() {
        let taken: HashSet<&str> = ["pic.jpg", "1_pic.jpg"].into_iter().collect();
        assert_eq!(
            allocate("pic.jpg", |n| taken.contains(n)).unwrap(),
            "2_pic.jpg"
        );
    }

    #[test]
    fn test_allocate_exhausted() {
        let err = allocate("pic.jpg", |_| true).unwrap_err();
        match err {
            CacheError::Allocation { basename, attempts } => {
                assert_eq!(basename, "pic.jpg");
                assert_eq!(attempts, MAX_ALLOCATION_ATTEMPTS);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_join_prefix() {
        assert_eq!(join_prefix(None, "a.jpg"), "a.jpg");
        assert_eq!(join_prefix(Some(""), "a.jpg"), "a.jpg");
        assert_eq!(join_prefix(Some("images"), "a.jpg"), "images/a.jpg");
        assert_eq!(join_prefix(Some("images/"), "a.jpg"), "images/a.jpg");
    }
}
