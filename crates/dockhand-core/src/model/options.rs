//! ビルドオプション定義とマージ

use super::registry::RegistryTarget;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// kaniko のデフォルト引数（カスタム引数が指定された場合は使わない）
pub const DEFAULT_KANIKO_ARGS: [&str; 2] = ["--snapshotMode=time", "--reproducible"];

/// キャッシュルートのデフォルト
pub const DEFAULT_CACHE_ROOT: &str = "/opt/data";

/// 使用するビルダー
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuilderKind {
    /// ローカルの docker デーモンでビルド
    #[default]
    Docker,
    /// デーモンレスの kaniko executor でビルド
    Kaniko,
}

impl std::str::FromStr for BuilderKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(BuilderKind::Docker),
            "kaniko" => Ok(BuilderKind::Kaniko),
            other => Err(CoreError::InvalidConfig(format!(
                "未知のビルダーです: {} (docker または kaniko を指定してください)",
                other
            ))),
        }
    }
}

/// Dockerfile の探し方
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DockerfileLocator {
    /// プロジェクトルートからの相対パス
    Path(PathBuf),
    /// プロジェクト内で唯一の `Dockerfile` を探す
    Discover,
}

impl Default for DockerfileLocator {
    fn default() -> Self {
        DockerfileLocator::Path(PathBuf::from("Dockerfile"))
    }
}

impl From<String> for DockerfileLocator {
    fn from(value: String) -> Self {
        if value == "discover" {
            DockerfileLocator::Discover
        } else {
            DockerfileLocator::Path(PathBuf::from(value))
        }
    }
}

impl From<DockerfileLocator> for String {
    fn from(value: DockerfileLocator) -> Self {
        match value {
            DockerfileLocator::Path(path) => path.display().to_string(),
            DockerfileLocator::Discover => "discover".to_string(),
        }
    }
}

/// ベースイメージキャッシュの設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl CacheOptions {
    /// 有効な場合のキャッシュルート
    pub fn root(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        Some(
            self.path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_ROOT)),
        )
    }
}

/// 完全に解決されたビルドオプション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub builder: BuilderKind,
    /// ビルダー固有の追加引数
    pub builder_args: Vec<String>,
    pub dockerfile: DockerfileLocator,
    /// ビルドコンテキスト（プロジェクトルートからの相対パス）
    pub context: Option<PathBuf>,
    /// 明示的なプッシュ指定。None の場合は認証情報と実行モードから判断する
    pub push: Option<bool>,
    pub registries: Vec<RegistryTarget>,
    /// インラインの認証設定（docker config.json の内容）
    pub auth_config: Option<String>,
    pub cache: CacheOptions,
    /// デフォルトブランチで latest タグを付与する
    pub tag_latest: bool,
    pub docker_binary: String,
    pub kaniko_binary: String,
    /// 実行ごとの認証ファイルを置くルート
    pub credentials_root: Option<PathBuf>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            builder: BuilderKind::Docker,
            builder_args: Vec::new(),
            dockerfile: DockerfileLocator::default(),
            context: None,
            push: None,
            registries: Vec::new(),
            auth_config: None,
            cache: CacheOptions::default(),
            tag_latest: false,
            docker_binary: "docker".to_string(),
            kaniko_binary: "/kaniko/executor".to_string(),
            credentials_root: None,
        }
    }
}

/// 部分的なビルドオプション
///
/// 値が `Some` のフィールドだけがマージ先を置き換える。
/// Vec は連結せず、丸ごと置き換える。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptionsOverlay {
    pub builder: Option<BuilderKind>,
    pub builder_args: Option<Vec<String>>,
    pub dockerfile: Option<DockerfileLocator>,
    pub context: Option<PathBuf>,
    pub push: Option<bool>,
    pub registries: Option<Vec<RegistryTarget>>,
    pub auth_config: Option<String>,
    pub cache: Option<CacheOptions>,
    pub tag_latest: Option<bool>,
    pub docker_binary: Option<String>,
    pub kaniko_binary: Option<String>,
    pub credentials_root: Option<PathBuf>,
}

impl BuildOptions {
    /// デフォルト ← 明示指定 ← 設定ファイル の順でマージ
    pub fn merged(explicit: &BuildOptionsOverlay, configured: &BuildOptionsOverlay) -> Self {
        let mut options = Self::default();
        options.apply(explicit);
        options.apply(configured);
        options
    }

    /// overlay の `Some` フィールドで上書き
    pub fn apply(&mut self, overlay: &BuildOptionsOverlay) {
        if let Some(builder) = overlay.builder {
            self.builder = builder;
        }
        if let Some(args) = &overlay.builder_args {
            self.builder_args = args.clone();
        }
        if let Some(dockerfile) = &overlay.dockerfile {
            self.dockerfile = dockerfile.clone();
        }
        if let Some(context) = &overlay.context {
            self.context = Some(context.clone());
        }
        if let Some(push) = overlay.push {
            self.push = Some(push);
        }
        if let Some(registries) = &overlay.registries {
            self.registries = registries.clone();
        }
        if let Some(auth) = &overlay.auth_config {
            self.auth_config = Some(auth.clone());
        }
        if let Some(cache) = &overlay.cache {
            self.cache = cache.clone();
        }
        if let Some(latest) = overlay.tag_latest {
            self.tag_latest = latest;
        }
        if let Some(bin) = &overlay.docker_binary {
            self.docker_binary = bin.clone();
        }
        if let Some(bin) = &overlay.kaniko_binary {
            self.kaniko_binary = bin.clone();
        }
        if let Some(root) = &overlay.credentials_root {
            self.credentials_root = Some(root.clone());
        }
    }

    /// プッシュに使える認証情報があるか
    pub fn has_usable_credentials(&self) -> bool {
        self.auth_config.is_some() || self.registries.iter().any(|r| r.credentials().is_some())
    }

    /// 使用前の検証
    ///
    /// プッシュ時は認証が必要な各レジストリについて username/password
    /// またはインライン認証設定のどちらかが必要。
    pub fn validate(&self, push_enabled: bool) -> Result<()> {
        if let Some(auth) = &self.auth_config {
            let doc: serde_json::Value = serde_json::from_str(auth).map_err(|e| {
                CoreError::InvalidConfig(format!("auth_config をJSONとして解釈できません: {}", e))
            })?;
            if !doc.is_object() {
                return Err(CoreError::InvalidConfig(
                    "auth_config は docker config.json 形式のオブジェクトである必要があります"
                        .to_string(),
                ));
            }
        }

        if !push_enabled {
            return Ok(());
        }

        for registry in &self.registries {
            if registry.anonymous || registry.credentials().is_some() || self.auth_config.is_some() {
                continue;
            }
            return Err(CoreError::InvalidConfig(format!(
                "レジストリ '{}' へのプッシュに必要な設定がありません。\
                 username と password、または auth_config を設定してください",
                registry.url
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_precedence() {
        let explicit = BuildOptionsOverlay {
            builder: Some(BuilderKind::Kaniko),
            push: Some(true),
            builder_args: Some(vec!["--cleanup".into()]),
            ..Default::default()
        };
        let configured = BuildOptionsOverlay {
            push: Some(false),
            tag_latest: Some(true),
            ..Default::default()
        };

        let options = BuildOptions::merged(&explicit, &configured);
        assert_eq!(options.builder, BuilderKind::Kaniko);
        // 設定ファイルの値が明示指定より優先される
        assert_eq!(options.push, Some(false));
        assert!(options.tag_latest);
        assert_eq!(options.builder_args, vec!["--cleanup".to_string()]);
        assert_eq!(options.docker_binary, "docker");
    }

    #[test]
    fn test_merge_replaces_vectors() {
        let explicit = BuildOptionsOverlay {
            registries: Some(vec![RegistryTarget::new("a.io"), RegistryTarget::new("b.io")]),
            ..Default::default()
        };
        let configured = BuildOptionsOverlay {
            registries: Some(vec![RegistryTarget::new("c.io")]),
            ..Default::default()
        };

        let options = BuildOptions::merged(&explicit, &configured);
        assert_eq!(options.registries, vec![RegistryTarget::new("c.io")]);
    }

    #[test]
    fn test_validate_push_requires_credentials() {
        let options = BuildOptions {
            registries: vec![RegistryTarget::new("registry.example.com")],
            ..Default::default()
        };
        assert!(options.validate(false).is_ok());
        assert!(matches!(
            options.validate(true),
            Err(CoreError::InvalidConfig(_))
        ));

        let anonymous = BuildOptions {
            registries: vec![RegistryTarget {
                anonymous: true,
                ..RegistryTarget::new("localhost:5000")
            }],
            ..Default::default()
        };
        assert!(anonymous.validate(true).is_ok());

        let inline = BuildOptions {
            auth_config: Some(r#"{"auths":{}}"#.into()),
            ..options
        };
        assert!(inline.validate(true).is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_auth_config() {
        let options = BuildOptions {
            auth_config: Some("not json".into()),
            ..Default::default()
        };
        assert!(options.validate(false).is_err());
    }

    #[test]
    fn test_dockerfile_locator_from_string() {
        assert_eq!(
            DockerfileLocator::from("discover".to_string()),
            DockerfileLocator::Discover
        );
        assert_eq!(
            DockerfileLocator::from("docker/Dockerfile.prod".to_string()),
            DockerfileLocator::Path(PathBuf::from("docker/Dockerfile.prod"))
        );
    }

    #[test]
    fn test_cache_root() {
        assert_eq!(CacheOptions::default().root(), None);
        let enabled = CacheOptions {
            enabled: true,
            path: None,
        };
        assert_eq!(enabled.root(), Some(PathBuf::from(DEFAULT_CACHE_ROOT)));
    }

    #[test]
    fn test_builder_kind_from_str() {
        assert_eq!("Kaniko".parse::<BuilderKind>().unwrap(), BuilderKind::Kaniko);
        assert!("buildah".parse::<BuilderKind>().is_err());
    }
}
