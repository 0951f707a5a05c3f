//! イメージ参照とビルド結果

use serde::{Deserialize, Serialize};

/// 解決済みのイメージ名とタグ一覧
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// レジストリなしのイメージ名
    pub name: String,
    /// 完全修飾タグ（registry/name:tag）。レジストリ設定順
    pub tags: Vec<String>,
}

impl ImageReference {
    pub fn first(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }
}

/// 外部リンク
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub url: String,
}

/// パイプラインの最終結果
///
/// 成功か失敗のどちらかで、途中の状態を持たない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub external_urls: Vec<ExternalLink>,
}

impl BuildResult {
    pub fn success(external_urls: Vec<ExternalLink>) -> Self {
        Self {
            code: 0,
            message: None,
            external_urls,
        }
    }

    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        // 失敗は必ず非ゼロ
        let code = if code == 0 { 1 } else { code };
        Self {
            code,
            message: Some(message.into()),
            external_urls: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_is_never_zero() {
        let result = BuildResult::failure(0, "broken");
        assert_eq!(result.code, 1);
        assert!(!result.is_success());
        assert!(result.external_urls.is_empty());
    }
}
