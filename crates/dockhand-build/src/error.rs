use dockhand_core::{CoreError, ProcessOutput};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("Registry authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("Builder '{builder}' is not available: {message}")]
    BuilderUnavailable { builder: String, message: String },

    #[error("Build failed with exit code {}", .output.code)]
    BuildFailed { output: ProcessOutput },

    #[error("Push of {image} failed with exit code {}", .output.code)]
    PushFailed { image: String, output: ProcessOutput },

    #[error("イメージリンクの登録に失敗しました")]
    LinkPublishFailed,

    #[error("Invalid image tag: {tag}")]
    InvalidTag { tag: String },

    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error(transparent)]
    Core(CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for BuildError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfig(message) => BuildError::InvalidConfig(message),
            other => BuildError::Core(other),
        }
    }
}

impl BuildError {
    /// パイプライン結果に載せる終了コード（プロセス由来でなければ 1）
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::BuildFailed { output } | BuildError::PushFailed { output, .. }
                if output.code != 0 =>
            {
                output.code
            }
            _ => 1,
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::InvalidConfig(msg) => msg.clone(),
            BuildError::AuthFailed { registry, message } => {
                format!(
                    "レジストリ '{}' の認証に失敗しました: {}\n\
                     \n\
                     username/password または auth_config を確認してください。",
                    registry, message
                )
            }
            BuildError::BuilderUnavailable { builder, message } => {
                format!(
                    "ビルダー '{}' を実行できません: {}\n\
                     \n\
                     解決方法:\n\
                     1. docker がインストールされ、デーモンが起動しているか確認してください\n\
                     2. kaniko を使う場合は kaniko_binary のパスを確認してください",
                    builder, message
                )
            }
            BuildError::BuildFailed { .. } => {
                "Docker build failed\n\
                 \n\
                 Dockerfileの内容とビルドログを確認してください。"
                    .to_string()
            }
            BuildError::PushFailed { image, .. } => {
                format!("Docker push failed: {}", image)
            }
            BuildError::DockerfileNotFound(path) => {
                format!(
                    "Dockerfileが見つかりません: {}\n\
                     \n\
                     解決方法:\n\
                     1. Dockerfileのパスを確認してください\n\
                     2. dockhand.yml で明示的にパスを指定してください:\n\
                        docker.build.dockerfile: path/to/Dockerfile",
                    path.display()
                )
            }
            BuildError::ContextNotFound(path) => {
                format!(
                    "ビルドコンテキストが見つかりません: {}\n\
                     \n\
                     dockhand.yml で docker.build.context を確認してください。",
                    path.display()
                )
            }
            _ => format!("{}", self),
        }
    }

    /// 失敗したプロセスの出力
    pub fn output(&self) -> Option<&ProcessOutput> {
        match self {
            BuildError::BuildFailed { output } | BuildError::PushFailed { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_from_process() {
        let err = BuildError::BuildFailed {
            output: ProcessOutput {
                code: 2,
                ..Default::default()
            },
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(BuildError::LinkPublishFailed.exit_code(), 1);
    }

    #[test]
    fn test_core_invalid_config_maps_to_invalid_config() {
        let err: BuildError = CoreError::InvalidConfig("missing".into()).into();
        assert!(matches!(err, BuildError::InvalidConfig(_)));
        assert_eq!(err.user_message(), "missing");
    }
}
