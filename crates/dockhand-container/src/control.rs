//! コンテナの強制削除

use crate::error::{ContainerError, Result};
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::RemoveContainerOptions;
use dockhand_core::{CommandSpec, ProcessRunner, TracingLog};
use std::sync::Arc;

#[async_trait]
pub trait ContainerControl: Send + Sync {
    /// コンテナを強制削除する。存在しない場合は成功扱い
    async fn remove(&self, name: &str) -> Result<()>;
}

/// Docker API 経由の操作
pub struct DockerApi {
    docker: Docker,
}

impl DockerApi {
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerControl for DockerApi {
    async fn remove(&self, name: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(name, Some(options)).await {
            Ok(_) => {
                tracing::info!("Removed container {}", name);
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                tracing::debug!("Container {} does not exist", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// `docker rm -f` による操作（Docker API に接続できない環境向け）
pub struct DockerCli {
    runner: Arc<dyn ProcessRunner>,
    program: String,
}

impl DockerCli {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            program: "docker".to_string(),
        }
    }
}

#[async_trait]
impl ContainerControl for DockerCli {
    async fn remove(&self, name: &str) -> Result<()> {
        let spec = CommandSpec::new(&self.program).args(["rm", "-f", name]);
        let output = self.runner.run(&spec, &TracingLog).await?;
        if output.success() || output.stderr.contains("No such container") {
            tracing::info!("Removed container {}", name);
            return Ok(());
        }
        Err(ContainerError::DockerApiError(format!(
            "docker rm -f {} が失敗しました (exit {}): {}",
            name,
            output.code,
            output.stderr.trim()
        )))
    }
}

/// Docker API に接続できればそれを、できなければ CLI を使う
pub fn connect_or_cli(runner: Arc<dyn ProcessRunner>) -> Arc<dyn ContainerControl> {
    match DockerApi::connect() {
        Ok(api) => Arc::new(api),
        Err(e) => {
            tracing::warn!("Docker API unavailable ({}), falling back to docker CLI", e);
            Arc::new(DockerCli::new(runner))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_core::RecordingRunner;

    #[tokio::test]
    async fn test_cli_remove_command() {
        let runner = Arc::new(RecordingRunner::new());
        DockerCli::new(runner.clone()).remove("web_main").await.unwrap();
        assert_eq!(runner.commands(), vec!["docker rm -f web_main"]);
    }

    #[tokio::test]
    async fn test_cli_missing_container_is_ok() {
        let runner = Arc::new(RecordingRunner::new().stderr(
            "docker rm",
            1,
            "Error response from daemon: No such container: web_main\n",
        ));
        assert!(DockerCli::new(runner).remove("web_main").await.is_ok());
    }

    #[tokio::test]
    async fn test_cli_failure() {
        let runner = Arc::new(RecordingRunner::new().stderr("docker rm", 1, "permission denied\n"));
        let err = DockerCli::new(runner).remove("web_main").await.unwrap_err();
        assert!(matches!(err, ContainerError::DockerApiError(msg) if msg.contains("permission denied")));
    }
}
