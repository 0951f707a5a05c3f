//! レジストリ定義

use serde::{Deserialize, Serialize};

/// プッシュ先のコンテナレジストリ
///
/// YAML形式：
/// ```yaml
/// registries:
///   - url: registry.example.com/acme
///     display_url: https://registry.example.com/ui/acme
///     browse_path: "/tags/{tag}"
///     label: internal
///     username: ci
///     password: secret
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryTarget {
    /// プッシュ先URL（例: ghcr.io/owner）
    pub url: String,
    /// 人間向けの表示URL（プッシュURLの置き換え先）
    #[serde(default)]
    pub display_url: Option<String>,
    /// タグの代わりに付与するブラウズ用パス（`{tag}` を置換）
    #[serde(default)]
    pub browse_path: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// 認証不要のレジストリ（例: localhost:5000）
    #[serde(default)]
    pub anonymous: bool,
}

impl RegistryTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// 末尾の `/` を除いたプッシュURL
    pub fn push_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// ユーザー名とパスワードの両方が設定されている場合に返す
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    /// 外部リンクを生成できる設定があるか
    pub fn has_display(&self) -> bool {
        self.display_url.is_some() || self.browse_path.is_some()
    }

    /// このレジストリ向けのイメージタグかどうか
    pub fn owns(&self, image: &str) -> bool {
        image
            .strip_prefix(self.push_url())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}
