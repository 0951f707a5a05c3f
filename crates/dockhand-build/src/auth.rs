//! レジストリ認証情報の準備
//!
//! ビルドやプッシュの前に、選択されたビルダーが必要とする認証情報を用意します。
//!
//! レジストリごとにどれか一つだけを使う:
//! 1. username/password: docker は `docker login`、kaniko は config.json の auths エントリ
//! 2. 1 が無くインラインの auth_config がある: 実行ごとのディレクトリに config.json として書き出す
//! 3. どちらも無い: スキップ
//!
//! 書き出したディレクトリは `DOCKER_CONFIG` として以降のサブプロセスの環境に
//! だけ渡し、プロセス全体の環境変数は変更しない。

use crate::error::{BuildError, Result};
use base64::Engine;
use dockhand_core::{
    BuildOptions, BuilderKind, CommandSpec, ProcessRunner, RegistryTarget, RunId, RunLog,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Docker config.json の構造
#[derive(Debug, Default, Serialize, Deserialize)]
struct DockerConfig {
    /// 認証情報 (レジストリ -> AuthEntry)
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
    /// credsStore など、そのまま保持するその他のキー
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

/// 認証エントリ
#[derive(Debug, Default, Serialize, Deserialize)]
struct AuthEntry {
    /// Base64エンコードされた "username:password"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth: Option<String>,
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct State {
    done: HashSet<String>,
    config: Option<DockerConfig>,
    env: BTreeMap<String, String>,
}

/// 1回の実行分の認証情報を管理
pub struct CredentialMaterializer {
    runner: Arc<dyn ProcessRunner>,
    builder: BuilderKind,
    docker_binary: String,
    auth_config: Option<String>,
    run_dir: PathBuf,
    state: Mutex<State>,
}

impl CredentialMaterializer {
    pub fn new(runner: Arc<dyn ProcessRunner>, options: &BuildOptions, run_id: &RunId) -> Self {
        let root = options
            .credentials_root
            .clone()
            .unwrap_or_else(default_credentials_root);
        Self {
            runner,
            builder: options.builder,
            docker_binary: options.docker_binary.clone(),
            auth_config: options.auth_config.clone(),
            run_dir: root.join(run_id.as_str()),
            state: Mutex::new(State::default()),
        }
    }

    /// 実行ごとの認証ディレクトリ
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    fn docker_dir(&self) -> PathBuf {
        self.run_dir.join(".docker")
    }

    /// 以降のサブプロセスに渡す環境変数
    pub async fn env(&self) -> BTreeMap<String, String> {
        self.state.lock().await.env.clone()
    }

    /// すべてのレジストリの認証情報を用意
    pub async fn authenticate_all(
        &self,
        registries: &[RegistryTarget],
        log: &dyn RunLog,
    ) -> Result<()> {
        for registry in registries {
            self.ensure(registry, log).await?;
        }
        Ok(())
    }

    /// レジストリの認証情報を用意する（同じ実行内では一度だけ）
    pub async fn ensure(&self, registry: &RegistryTarget, log: &dyn RunLog) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.done.contains(registry.push_url()) {
            return Ok(());
        }

        match (registry.credentials(), &self.auth_config) {
            (Some((username, password)), _) => match self.builder {
                BuilderKind::Docker => {
                    self.login(registry, username, password, &state.env, log)
                        .await?;
                }
                BuilderKind::Kaniko => {
                    let key = registry_host(registry.push_url());
                    let encoded = base64::engine::general_purpose::STANDARD
                        .encode(format!("{}:{}", username, password));
                    let config = state.config.get_or_insert_with(DockerConfig::default);
                    config.auths.entry(key.clone()).or_default().auth = Some(encoded);
                    self.write_config(&mut state, registry).await?;
                    log.write(&format!("Prepared kaniko credentials for {}", key));
                }
            },
            // インライン設定は認証情報の無いレジストリにだけ使う
            (None, Some(raw)) => {
                if state.config.is_none() {
                    let config: DockerConfig =
                        serde_json::from_str(raw).map_err(|e| BuildError::AuthFailed {
                            registry: registry.url.clone(),
                            message: format!("Failed to parse auth_config: {}", e),
                        })?;
                    state.config = Some(config);
                    self.write_config(&mut state, registry).await?;
                }
                log.write(&format!(
                    "Using inline registry auth configuration for {}",
                    registry.push_url()
                ));
            }
            (None, None) => {
                log.write(&format!(
                    "No credentials configured for {}, skipping login",
                    registry.push_url()
                ));
            }
        }

        state.done.insert(registry.push_url().to_string());
        Ok(())
    }

    /// `docker login` を実行（コマンドラインはログに残さない）
    async fn login(
        &self,
        registry: &RegistryTarget,
        username: &str,
        password: &str,
        env: &BTreeMap<String, String>,
        log: &dyn RunLog,
    ) -> Result<()> {
        let mut args = vec![
            "login".to_string(),
            "--username".to_string(),
            username.to_string(),
            "--password".to_string(),
            password.to_string(),
        ];
        let target = registry.push_url();
        if target.chars().any(|c| !c.is_ascii_alphanumeric()) {
            args.push(target.to_string());
        }

        let spec = CommandSpec::new(&self.docker_binary)
            .args(args)
            .envs(env)
            .quiet();
        log.write(&format!("Logging in to {}", target));

        let output = self
            .runner
            .run(&spec, log)
            .await
            .map_err(|e| BuildError::AuthFailed {
                registry: target.to_string(),
                message: e.to_string(),
            })?;

        if !output.success() {
            return Err(BuildError::AuthFailed {
                registry: target.to_string(),
                message: format!("docker login exited with code {}", output.code),
            });
        }
        Ok(())
    }

    async fn write_config(&self, state: &mut State, registry: &RegistryTarget) -> Result<()> {
        let auth_failed = |message: String| BuildError::AuthFailed {
            registry: registry.url.clone(),
            message,
        };

        let dir = self.docker_dir();
        let body = serde_json::to_string_pretty(&state.config)
            .map_err(|e| auth_failed(format!("Failed to serialize config.json: {}", e)))?;

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            auth_failed(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        let path = dir.join("config.json");
        tokio::fs::write(&path, body).await.map_err(|e| {
            auth_failed(format!("Failed to write {}: {}", path.display(), e))
        })?;

        tracing::debug!("Wrote registry auth configuration to {}", path.display());
        state
            .env
            .insert("DOCKER_CONFIG".to_string(), dir.display().to_string());
        Ok(())
    }

    /// 実行ディレクトリを削除
    pub async fn cleanup(&self) {
        if !self.run_dir.exists() {
            return;
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.run_dir).await {
            tracing::warn!(
                "Failed to remove credentials directory {}: {}",
                self.run_dir.display(),
                e
            );
        }
    }
}

fn default_credentials_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("dockhand")
        .join("credentials")
}

/// レジストリURLからホスト部分を取り出す
///
/// # Examples
/// - `ghcr.io/org` -> `ghcr.io`
/// - `localhost:5000` -> `localhost:5000`
/// - `myuser` -> `https://index.docker.io/v1/`
pub fn registry_host(url: &str) -> String {
    let first = url.split('/').next().unwrap_or(url);
    if first.contains('.') || first.contains(':') || first == "localhost" {
        first.to_string()
    } else {
        "https://index.docker.io/v1/".to_string()
    }
}
