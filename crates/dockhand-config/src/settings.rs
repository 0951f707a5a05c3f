//! dockhand.yml の定義
//!
//! ```yaml
//! docker:
//!   build:
//!     builder: kaniko
//!     registries:
//!       - url: registry.example.com/acme
//!         username: ci
//!         password: secret
//!     tag_latest: true
//! cache:
//!   enabled: true
//!   path: /opt/data
//! deploy:
//!   lower_port: 9090
//!   success_patterns: ["Listening on"]
//! link:
//!   webhook_url: https://hooks.example.com/images
//! ```

use crate::error::{ConfigError, Result};
use dockhand_core::{BuildOptionsOverlay, CacheOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// dockhand.yml 全体
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockhandConfig {
    pub docker: DockerSection,
    /// ベースイメージキャッシュ（docker.build.cache が優先）
    pub cache: Option<CacheOptions>,
    pub deploy: DeploySettings,
    pub link: LinkSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerSection {
    pub build: BuildOptionsOverlay,
}

/// ブランチごとのローカルデプロイ設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    /// 割り当てるポートの下限
    pub lower_port: u16,
    /// エンドポイントのベースURL（`{base_url}:{port}`）
    pub base_url: String,
    /// コンテナ内のポート。未指定なら Dockerfile の EXPOSE を使う
    pub source_port: Option<u16>,
    /// 起動完了を判定する正規表現（先頭から順に評価）
    pub success_patterns: Vec<String>,
    pub max_containers: usize,
    /// 起動待ちのタイムアウト（秒）
    pub startup_timeout: Option<u64>,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            lower_port: 9090,
            base_url: "http://localhost".to_string(),
            source_port: None,
            success_patterns: vec![
                "(?i)listening on".to_string(),
                "(?i)started".to_string(),
            ],
            max_containers: 5,
            startup_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    pub webhook_url: Option<String>,
}

impl DockhandConfig {
    pub fn from_yaml_str(text: &str, path: &Path) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text, path)
    }

    /// ビルドオプションに重ねる overlay
    ///
    /// トップレベルの `cache` は `docker.build.cache` が無い場合だけ使う。
    pub fn build_overlay(&self) -> BuildOptionsOverlay {
        let mut overlay = self.docker.build.clone();
        if overlay.cache.is_none() {
            overlay.cache = self.cache.clone();
        }
        overlay
    }
}
