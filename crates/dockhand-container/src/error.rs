use dockhand_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "{key} をデプロイできません: 同時に起動できるコンテナの上限（{limit}）に達しています\n\nヒント:\n  • 不要なブランチのコンテナを停止してください"
    )]
    CapacityExceeded { key: String, limit: usize },

    #[error("コンテナ '{container}' は起動完了前に終了しました")]
    DeployFailed {
        container: String,
        stdout: String,
        stderr: String,
    },

    #[error("コンテナ '{container}' の起動完了を{seconds}秒待機しましたがタイムアウトしました")]
    DeployTimeout { container: String, seconds: u64 },

    #[error("コンテナ '{container}' を起動できません: {message}")]
    SpawnFailed { container: String, message: String },

    #[error("ポート {from} 以上に空きポートがありません")]
    NoFreePort { from: u16 },

    #[error("起動判定の正規表現が不正です: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error(
        "Dockerに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • OrbStackまたはDocker Desktopがインストールされているか確認してください"
    )]
    DockerConnectionFailed(String),

    #[error("Docker APIエラー: {0}")]
    DockerApiError(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<bollard::errors::Error> for ContainerError {
    fn from(err: bollard::errors::Error) -> Self {
        let err_str = err.to_string();
        if err_str.contains("Connection refused") || err_str.contains("No such file or directory")
        {
            ContainerError::DockerConnectionFailed(err_str)
        } else {
            ContainerError::DockerApiError(err_str)
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
