//! ブランチごとのローカルデプロイ
//!
//! (リポジトリ, ブランチ) ごとに安定したホストポートを割り当て、
//! そのポートで動くコンテナを差し替えながら `docker run` で起動する。
//! ポートの割り当て、上限チェック、登録は一つのロックの中で行い、
//! 起動完了の待機はロックの外で行う。

use crate::control::ContainerControl;
use crate::error::{ContainerError, Result};
use crate::port::{PortProbe, TcpPortProbe, find_free_port};
use crate::waiter::{Readiness, SuccessPatterns, watch_readiness};
use dockhand_core::{CommandSpec, ProcessRunner, RunLog, TracingLog};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// デプロイ設定
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub lower_port: u16,
    pub base_url: String,
    /// コンテナ内で待ち受けるポート
    pub source_port: u16,
    pub success_patterns: Vec<String>,
    pub max_containers: usize,
    pub startup_timeout: Option<Duration>,
    pub docker_binary: String,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            lower_port: 9090,
            base_url: "http://localhost".to_string(),
            source_port: 80,
            success_patterns: vec!["(?i)listening on".to_string(), "(?i)started".to_string()],
            max_containers: 5,
            startup_timeout: None,
            docker_binary: "docker".to_string(),
        }
    }
}

/// 起動したデプロイ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// `<base_url>:<port>`
    pub endpoint: String,
    pub port: u16,
    pub container_name: String,
}

#[derive(Debug, Default)]
struct DeploymentTable {
    /// "repo:branch" → ホストポート。割り当ては解放しない
    ports: HashMap<String, u16>,
    /// ホストポート → 動いているはずのコンテナ
    containers: BTreeMap<u16, Slot>,
    next_generation: u64,
}

/// 同じ名前で差し替えたコンテナを区別するため世代を持つ
#[derive(Debug, Clone)]
struct Slot {
    name: String,
    generation: u64,
}

pub struct BranchDeploymentManager {
    options: DeployOptions,
    patterns: SuccessPatterns,
    runner: Arc<dyn ProcessRunner>,
    control: Arc<dyn ContainerControl>,
    probe: Arc<dyn PortProbe>,
    log: Arc<dyn RunLog>,
    table: Mutex<DeploymentTable>,
}

impl BranchDeploymentManager {
    pub fn new(
        options: DeployOptions,
        runner: Arc<dyn ProcessRunner>,
        control: Arc<dyn ContainerControl>,
    ) -> Result<Self> {
        let patterns = SuccessPatterns::compile(&options.success_patterns)?;
        if patterns.is_empty() {
            tracing::warn!("No success patterns configured, deploys only end by exit or timeout");
        }
        Ok(Self {
            options,
            patterns,
            runner,
            control,
            probe: Arc::new(TcpPortProbe),
            log: Arc::new(TracingLog),
            table: Mutex::new(DeploymentTable::default()),
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn PortProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// コンテナ出力の書き込み先
    pub fn with_log(mut self, log: Arc<dyn RunLog>) -> Self {
        self.log = log;
        self
    }

    /// ブランチのコンテナを起動（既存があれば差し替え）し、起動完了を待つ
    pub async fn deploy(&self, repo: &str, branch: &str, image: &str) -> Result<Deployment> {
        let key = deployment_key(repo, branch);
        let name = container_name(repo, branch);

        let (port, generation, process) = {
            let mut table = self.table.lock().await;

            let port = match table.ports.get(&key) {
                Some(port) => *port,
                None => {
                    let allocated: HashSet<u16> = table.ports.values().copied().collect();
                    let port = find_free_port(self.options.lower_port, &allocated, &*self.probe)?;
                    table.ports.insert(key.clone(), port);
                    port
                }
            };

            if let Some(existing) = table.containers.get(&port).cloned() {
                tracing::info!("Replacing container {} on port {}", existing.name, port);
                self.control.remove(&existing.name).await?;
                table.containers.remove(&port);
            } else if table.containers.len() >= self.options.max_containers {
                return Err(ContainerError::CapacityExceeded {
                    key,
                    limit: self.options.max_containers,
                });
            }

            let spec = CommandSpec::new(&self.options.docker_binary).args([
                "run".to_string(),
                format!("-p{}:{}", port, self.options.source_port),
                format!("--name={}", name),
                image.to_string(),
            ]);
            self.log.write(&format!("Running '{}'", spec.display()));
            let process = self
                .runner
                .spawn(&spec)
                .map_err(|e| ContainerError::SpawnFailed {
                    container: name.clone(),
                    message: e.to_string(),
                })?;

            let generation = table.next_generation;
            table.next_generation += 1;
            table.containers.insert(
                port,
                Slot {
                    name: name.clone(),
                    generation,
                },
            );
            (port, generation, process)
        };

        tracing::info!("Started {} for {} on port {}", name, key, port);
        let readiness = watch_readiness(process, self.patterns.clone(), self.log.clone());
        let outcome = match self.options.startup_timeout {
            Some(limit) => match tokio::time::timeout(limit, readiness).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!("Container {} did not become ready in {:?}", name, limit);
                    return Err(ContainerError::DeployTimeout {
                        container: name,
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => readiness.await,
        };

        match outcome {
            Ok(Readiness::Ready) => {
                let endpoint = format!("{}:{}", self.options.base_url.trim_end_matches('/'), port);
                tracing::info!("Container {} is ready at {}", name, endpoint);
                Ok(Deployment {
                    endpoint,
                    port,
                    container_name: name,
                })
            }
            Ok(Readiness::Exited { stdout, stderr, .. }) => {
                self.discard(port, generation, &name).await;
                Err(ContainerError::DeployFailed {
                    container: name,
                    stdout,
                    stderr,
                })
            }
            Err(_) => {
                self.discard(port, generation, &name).await;
                Err(ContainerError::DeployFailed {
                    container: name,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
        }
    }

    /// 起動前に終了したコンテナを片付ける。差し替え済みなら何もしない
    async fn discard(&self, port: u16, generation: u64, name: &str) {
        let mut table = self.table.lock().await;
        if table.containers.get(&port).map(|slot| slot.generation) != Some(generation) {
            return;
        }
        table.containers.remove(&port);
        if let Err(e) = self.control.remove(name).await {
            tracing::warn!("Failed to remove exited container {}: {}", name, e);
        }
    }

    /// ブランチのコンテナを停止する。ポートの割り当ては残す
    pub async fn stop(&self, repo: &str, branch: &str) -> Result<bool> {
        let key = deployment_key(repo, branch);
        let mut table = self.table.lock().await;
        let Some(port) = table.ports.get(&key).copied() else {
            return Ok(false);
        };
        let Some(name) = table.containers.get(&port).map(|slot| slot.name.clone()) else {
            return Ok(false);
        };
        self.control.remove(&name).await?;
        table.containers.remove(&port);
        tracing::info!("Stopped {} on port {}", name, port);
        Ok(true)
    }

    pub async fn port_for(&self, repo: &str, branch: &str) -> Option<u16> {
        self.table
            .lock()
            .await
            .ports
            .get(&deployment_key(repo, branch))
            .copied()
    }

    /// ポート → コンテナ名のスナップショット
    pub async fn containers(&self) -> BTreeMap<u16, String> {
        self.table
            .lock()
            .await
            .containers
            .iter()
            .map(|(port, slot)| (*port, slot.name.clone()))
            .collect()
    }
}

fn deployment_key(repo: &str, branch: &str) -> String {
    format!("{}:{}", repo, branch)
}

/// `<repo>_<branch>` を Docker のコンテナ名に使える文字へ置き換える
///
/// 置き換えが起きた場合とリポジトリ名に `_` を含む場合は、
/// 別のブランチと同じ名前にならないよう "repo:branch" のハッシュを付ける。
pub fn container_name(repo: &str, branch: &str) -> String {
    let raw = format!("{}_{}", repo, branch);
    let mut name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    // 先頭は英数字でなければならない
    if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        name.insert(0, 'x');
    }
    if name != raw || repo.contains('_') {
        let digest = Sha256::digest(deployment_key(repo, branch).as_bytes());
        name.push('-');
        name.push_str(&hex::encode(&digest[..4]));
    }
    name
}
