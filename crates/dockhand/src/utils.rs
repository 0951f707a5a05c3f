use colored::Colorize;
use dockhand_config::{ConfigError, DockhandConfig};
use dockhand_core::{DockerfileFacts, ProcessOutput};
use std::path::Path;

/// 設定ファイルを読み込み、使ったファイルを表示する
pub fn load_config() -> anyhow::Result<DockhandConfig> {
    match dockhand_config::find_config_file() {
        Ok(path) => {
            eprintln!("📄 設定ファイル: {}", path.display().to_string().cyan());
            Ok(DockhandConfig::from_path(&path)?)
        }
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("No dockhand.yml found, using defaults");
            Ok(DockhandConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// 失敗したサブプロセスの出力を表示
pub fn print_output(output: &ProcessOutput) {
    for (label, text) in [("stdout", &output.stdout), ("stderr", &output.stderr)] {
        if text.trim().is_empty() {
            continue;
        }
        eprintln!("{}", format!("--- {} ---", label).dimmed());
        eprintln!("{}", text.trim_end());
    }
}

/// コンテナ内のポートを決める
///
/// 明示指定 → 設定ファイル → Dockerfile の最初の EXPOSE の順。
pub fn resolve_source_port(
    explicit: Option<u16>,
    configured: Option<u16>,
    project_root: &Path,
) -> anyhow::Result<u16> {
    if let Some(port) = explicit.or(configured) {
        return Ok(port);
    }

    let dockerfile = project_root.join("Dockerfile");
    if dockerfile.is_file() {
        let text = std::fs::read_to_string(&dockerfile)?;
        if let Some(port) = DockerfileFacts::parse(&text).first_port() {
            tracing::debug!("Using EXPOSE {} from {}", port, dockerfile.display());
            return Ok(port);
        }
    }

    Err(anyhow::anyhow!(
        "コンテナのポートが分かりません\n\nヒント:\n  • --source-port を指定してください\n  • dockhand.yml の deploy.source_port を設定してください\n  • Dockerfile に EXPOSE を追加してください"
    ))
}
