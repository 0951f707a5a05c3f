use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: dockhand.local.yml, .dockhand.local.yml, dockhand.yml, .dockhand.yml\n\
        - ./.dockhand/ ディレクトリ\n\
        - ~/.config/dockhand/dockhand.yml\n\
        または DOCKHAND_CONFIG 環境変数で直接指定できます"
    )]
    ConfigFileNotFound,

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("設定ファイルの解析に失敗しました: {path}\n理由: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("プロジェクト設定の解析に失敗しました: {path}\n理由: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
