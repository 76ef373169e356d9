// 链接预览类型定义

use serde::{Deserialize, Serialize};

/// 链接预览元数据
///
/// 缓存后 `image` 保存的是本地化后的路径
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPreview {
    /// 页面标题
    #[serde(default)]
    pub title: String,
    /// 页面描述
    #[serde(default)]
    pub description: String,
    /// 预览图地址
    #[serde(default)]
    pub image: String,
    /// 规范化后的页面地址
    #[serde(default)]
    pub url: String,
}

impl LinkPreview {
    pub fn has_image(&self) -> bool {
        !self.image.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial_response() {
        let json = r#"{"title": "Hello", "url": "https://example.com"}"#;
        let preview: LinkPreview = serde_json::from_str(json).unwrap();
        assert_eq!(preview.title, "Hello");
        assert!(preview.description.is_empty());
        assert!(!preview.has_image());
    }
}
