pub mod error;
pub mod project;
pub mod settings;

pub use error::*;
pub use project::*;
pub use settings::*;

use std::path::PathBuf;

/// 設定ファイルを直接指定する環境変数
pub const CONFIG_ENV: &str = "DOCKHAND_CONFIG";

const CANDIDATES: [&str; 4] = [
    "dockhand.local.yml",
    ".dockhand.local.yml",
    "dockhand.yml",
    ".dockhand.yml",
];

/// dockhand.yml を探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 DOCKHAND_CONFIG (直接パス指定)
/// 2. カレントディレクトリ: dockhand.local.yml, .dockhand.local.yml, dockhand.yml, .dockhand.yml
/// 3. ./.dockhand/ ディレクトリ内: 同様の順序
/// 4. ~/.config/dockhand/dockhand.yml (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points to a missing file: {}", CONFIG_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;

    if let Some(path) = CANDIDATES
        .iter()
        .map(|name| current_dir.join(name))
        .find(|p| p.exists())
    {
        return Ok(path);
    }

    let local_dir = current_dir.join(".dockhand");
    if local_dir.is_dir()
        && let Some(path) = CANDIDATES
            .iter()
            .map(|name| local_dir.join(name))
            .find(|p| p.exists())
    {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("dockhand").join("dockhand.yml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// 設定を読み込む。設定ファイルが無ければデフォルト
pub fn load() -> Result<DockhandConfig> {
    match find_config_file() {
        Ok(path) => {
            tracing::debug!("Loading configuration from {}", path.display());
            DockhandConfig::from_path(&path)
        }
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("No configuration file found, using defaults");
            Ok(DockhandConfig::default())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn in_dir<T>(dir: &std::path::Path, f: impl FnOnce() -> T) -> T {
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_ENV, f);
        std::env::set_current_dir(original_dir).unwrap();
        result
    }

    #[test]
    #[serial]
    fn test_find_config_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("dockhand.yml"), "{}").unwrap();

        let found = in_dir(temp_dir.path(), find_config_file).unwrap();
        assert!(found.ends_with("dockhand.yml"));
    }

    #[test]
    #[serial]
    fn test_local_file_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("dockhand.yml"), "{}").unwrap();
        fs::write(temp_dir.path().join(".dockhand.local.yml"), "{}").unwrap();

        let found = in_dir(temp_dir.path(), find_config_file).unwrap();
        assert!(found.ends_with(".dockhand.local.yml"));
    }

    #[test]
    #[serial]
    fn test_find_config_in_dockhand_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let local_dir = temp_dir.path().join(".dockhand");
        fs::create_dir(&local_dir).unwrap();
        fs::write(local_dir.join("dockhand.yml"), "{}").unwrap();

        let found = in_dir(temp_dir.path(), find_config_file).unwrap();
        assert!(found.ends_with(".dockhand/dockhand.yml"));
    }

    #[test]
    #[serial]
    fn test_env_var_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let custom = temp_dir.path().join("custom.yml");
        fs::write(&custom, "deploy:\n  lower_port: 7100\n").unwrap();
        fs::write(temp_dir.path().join("dockhand.yml"), "{}").unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp_dir.path()).unwrap();
        let config = temp_env::with_var(CONFIG_ENV, Some(custom.as_os_str()), load);
        std::env::set_current_dir(original_dir).unwrap();

        assert_eq!(config.unwrap().deploy.lower_port, 7100);
    }

    #[test]
    #[serial]
    fn test_missing_config_yields_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();

        // グローバル設定がある環境では検索結果が変わるため load の結果だけを見る
        let config = in_dir(temp_dir.path(), load);
        assert!(config.is_ok());
    }
}
